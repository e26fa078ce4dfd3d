//! State-change notifications for any number of UI views.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::mix::{LayerKind, MixLevels};

/// Why a track set stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    Restarted,
    Exclusive,
    Finished,
    Deleted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    IntensityChanged { value: f32, from_sync: bool },
    /// A fade asked visual intensity displays to refresh.
    IntensityDisplay { value: f32 },
    CustomMixChanged { enabled: bool, volumes: MixLevels },
    MasterVolumeChanged { value: f32 },
    TrackStarted { sound_id: String },
    TrackStopped { sound_id: String, reason: StopReason },
    DriftCorrected { sound_id: String, layer: LayerKind, drift: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// Fan-out of [`EngineEvent`]s to subscribed listeners.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
}

impl EventBus {
    pub fn subscribe(&self, listener: impl Fn(&EngineEvent) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Deliver `event` to every listener. The listener list is copied first
    /// so listeners may subscribe or unsubscribe while being called.
    pub fn emit(&self, event: EngineEvent) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }
}
