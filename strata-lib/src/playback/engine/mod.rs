//! The adaptive playback engine.
//!
//! `AdaptiveEngine` is created once per application and cloned wherever it
//! is needed; every clone shares the same state. All mutations go through
//! the engine's locks, so event handlers, the drift monitor and fades never
//! mutate state at the same time. Layer loading runs on worker threads
//! outside those locks.

mod dispatch;
mod drift;
mod fading;
mod intensity;
mod lifecycle;
mod preload;
mod settings;
mod state;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::container::library::{Library, PlaylistConfig};
use crate::container::settings::EngineSettings;
use crate::host::HostBridge;
use crate::playback::combat::CombatPolicy;
use crate::playback::events::{EngineEvent, EventBus, SubscriptionId};
use crate::playback::layer::LayerLoader;
use crate::playback::track_set::TrackSet;

pub use dispatch::{Dispatch, HostEvent};
pub use drift::DriftTick;
pub use lifecycle::{StartOutcome, StartRequest};
pub use preload::{PreloadFailure, PreloadReport};
pub use state::{EngineSnapshot, EngineTuning};

use drift::DriftMonitor;
use state::MixCore;

#[derive(Clone)]
pub struct AdaptiveEngine {
    library: Arc<Mutex<Library>>,
    settings: Arc<Mutex<EngineSettings>>,
    tuning: Arc<Mutex<EngineTuning>>,
    tracks: Arc<Mutex<HashMap<String, TrackSet>>>,
    loading: Arc<Mutex<HashSet<String>>>,
    mix: Arc<Mutex<MixCore>>,
    combat: Arc<Mutex<CombatPolicy>>,
    drift_monitor: Arc<Mutex<Option<DriftMonitor>>>,
    start_sequence: Arc<AtomicU64>,
    loader: Arc<dyn LayerLoader>,
    host: Arc<dyn HostBridge>,
    events: Arc<EventBus>,
}

impl AdaptiveEngine {
    /// Create an engine from persisted settings.
    pub fn new(
        settings: EngineSettings,
        loader: Arc<dyn LayerLoader>,
        host: Arc<dyn HostBridge>,
    ) -> Self {
        let settings = settings.sanitized();
        let mix = MixCore::new(settings.mix_state());
        Self {
            library: Arc::new(Mutex::new(Library::default())),
            settings: Arc::new(Mutex::new(settings)),
            tuning: Arc::new(Mutex::new(EngineTuning::default())),
            tracks: Arc::new(Mutex::new(HashMap::new())),
            loading: Arc::new(Mutex::new(HashSet::new())),
            mix: Arc::new(Mutex::new(mix)),
            combat: Arc::new(Mutex::new(CombatPolicy::new())),
            drift_monitor: Arc::new(Mutex::new(None)),
            start_sequence: Arc::new(AtomicU64::new(0)),
            loader,
            host,
            events: Arc::new(EventBus::default()),
        }
    }

    /// Create an engine and load a playlist library in one go.
    pub fn with_library(
        settings: EngineSettings,
        playlists: Vec<PlaylistConfig>,
        loader: Arc<dyn LayerLoader>,
        host: Arc<dyn HostBridge>,
    ) -> Self {
        let engine = Self::new(settings, loader, host);
        *engine.library.lock() = Library::new(playlists);
        engine
    }

    /// Snapshot of the playlist library.
    pub fn library(&self) -> Library {
        self.library.lock().clone()
    }

    /// Current persisted settings, with every change made so far folded in.
    pub fn settings(&self) -> EngineSettings {
        self.settings.lock().clone()
    }

    /// Register a listener for engine events.
    pub fn subscribe(
        &self,
        listener: impl Fn(&EngineEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Display snapshot of counts, intensity and volumes.
    pub fn get_state(&self) -> EngineSnapshot {
        let (mix, fading) = {
            let core = self.mix.lock();
            (core.state, core.active_fade.is_some())
        };
        let mut playing: Vec<String> = self.tracks.lock().keys().cloned().collect();
        playing.sort();
        let loading = self.loading.lock().len();
        let drift_monitor_running = self.drift_monitor.lock().is_some();
        let combat = self.combat.lock();

        EngineSnapshot {
            intensity: mix.intensity,
            master_volume: mix.master_volume,
            custom_mix_enabled: mix.custom_mix_enabled,
            custom_volumes: mix.custom_volumes,
            curve: crate::mix::calculate_mix(mix.intensity),
            active_tracks: playing.len(),
            loading_tracks: loading,
            playing,
            drift_monitor_running,
            fading,
            combat_encounters: combat.active_encounters(),
            pre_combat_intensity: combat.pre_combat_intensity(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use super::AdaptiveEngine;
    use crate::container::library::{PlaybackMode, PlaylistConfig, SoundConfig};
    use crate::container::settings::EngineSettings;
    use crate::test_data::{MockLoader, RecordingHost};

    pub struct Fixture {
        pub engine: AdaptiveEngine,
        pub loader: Arc<MockLoader>,
        pub host: Arc<RecordingHost>,
    }

    /// "battle" is exclusive and adaptive, "ambience" is simultaneous and
    /// adaptive, "plain" is a regular playlist.
    pub fn playlists() -> Vec<PlaylistConfig> {
        vec![
            PlaylistConfig::new("battle", PlaybackMode::Sequential, true)
                .with_sound(
                    SoundConfig::new("drums", "drums_high.ogg")
                        .with_layers(Some("drums_mid.ogg"), Some("drums_low.ogg")),
                )
                .with_sound(
                    SoundConfig::new("brass", "brass_high.ogg").with_layers(Some("brass_mid.ogg"), None),
                )
                .with_sound(SoundConfig::new("solo", "solo_high.ogg")),
            PlaylistConfig::new("ambience", PlaybackMode::Simultaneous, true)
                .with_sound(SoundConfig::new("rain", "rain_high.ogg").with_layers(None, Some("rain_low.ogg")))
                .with_sound(SoundConfig::new("wind", "wind_high.ogg").with_layers(Some("wind_mid.ogg"), None)),
            PlaylistConfig::new("plain", PlaybackMode::Sequential, false)
                .with_sound(SoundConfig::new("tavern", "tavern.ogg").with_layers(Some("tavern_mid.ogg"), None)),
        ]
    }

    pub fn fixture_with(loader: MockLoader, host: RecordingHost, settings: EngineSettings) -> Fixture {
        let loader = Arc::new(loader);
        let host = Arc::new(host);
        let engine = AdaptiveEngine::with_library(settings, playlists(), loader.clone(), host.clone());
        engine.set_combat_fade(Duration::ZERO);
        engine.set_drift_interval(Duration::from_secs(3600));
        Fixture {
            engine,
            loader,
            host,
        }
    }

    pub fn fixture() -> Fixture {
        fixture_with(
            MockLoader::new(),
            RecordingHost::authoritative(),
            EngineSettings::default(),
        )
    }
}
