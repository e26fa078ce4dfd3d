//! In-memory collaborators for exercising the engine without audio output.
//!
//! [`MockLoader`] hands out [`MockLayer`]s whose clocks only move when a test
//! moves them, and keeps a [`MockHandle`] to every layer it created.
//! [`RecordingHost`] records everything the engine asks of its host.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::container::settings::SettingChange;
use crate::error::LayerError;
use crate::host::{HostBridge, HostError, Notice};
use crate::playback::layer::{LayerLoader, PlayOptions, SoundLayer};

#[derive(Debug, Default)]
struct MockLayerState {
    time: f64,
    volume: f32,
    playing: bool,
    play_count: usize,
    stop_count: usize,
    last_play: Option<PlayOptions>,
    fail_next_play: bool,
}

/// Test-side view of a [`MockLayer`].
#[derive(Debug, Clone)]
pub struct MockHandle {
    path: String,
    duration: f64,
    state: Arc<Mutex<MockLayerState>>,
}

impl MockHandle {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn time(&self) -> f64 {
        self.state.lock().time
    }

    pub fn set_time(&self, time: f64) {
        self.state.lock().time = time;
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn play_count(&self) -> usize {
        self.state.lock().play_count
    }

    pub fn stop_count(&self) -> usize {
        self.state.lock().stop_count
    }

    pub fn last_play(&self) -> Option<PlayOptions> {
        self.state.lock().last_play
    }

    /// Make the next `play` call fail.
    pub fn fail_next_play(&self) {
        self.state.lock().fail_next_play = true;
    }

    /// Flip the layer to not-playing without going through `stop`.
    pub fn force_stopped(&self) {
        self.state.lock().playing = false;
    }
}

/// A [`SoundLayer`] with a manually driven clock.
#[derive(Debug)]
pub struct MockLayer {
    handle: MockHandle,
}

impl MockLayer {
    pub fn new(path: impl Into<String>, duration: f64) -> (Self, MockHandle) {
        let handle = MockHandle {
            path: path.into(),
            duration,
            state: Arc::new(Mutex::new(MockLayerState::default())),
        };
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl SoundLayer for MockLayer {
    fn play(&mut self, options: PlayOptions) -> Result<(), LayerError> {
        let mut state = self.handle.state.lock();
        if state.fail_next_play {
            state.fail_next_play = false;
            return Err(LayerError::Playback(format!(
                "mock refused to play {}",
                self.handle.path
            )));
        }
        state.time = options.offset;
        state.volume = options.volume;
        state.playing = true;
        state.play_count += 1;
        state.last_play = Some(options);
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.handle.state.lock();
        state.playing = false;
        state.stop_count += 1;
    }

    fn current_time(&self) -> f64 {
        self.handle.time()
    }

    fn duration(&self) -> f64 {
        self.handle.duration
    }

    fn volume(&self) -> f32 {
        self.handle.volume()
    }

    fn set_volume(&mut self, volume: f32) {
        self.handle.state.lock().volume = volume;
    }

    fn is_playing(&self) -> bool {
        self.handle.is_playing()
    }
}

/// Loader producing [`MockLayer`]s.
#[derive(Debug, Default)]
pub struct MockLoader {
    delay: Mutex<Duration>,
    duration: Mutex<f64>,
    failing: Mutex<HashSet<String>>,
    handles: Mutex<HashMap<String, Vec<MockHandle>>>,
    loads: Mutex<usize>,
    preloads: Mutex<Vec<String>>,
    evicted: Mutex<Vec<String>>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self {
            duration: Mutex::new(120.0),
            ..Self::default()
        }
    }

    /// Sleep this long inside every `load`.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock() = delay;
        self
    }

    /// Duration reported by every layer created from now on.
    pub fn with_duration(self, duration: f64) -> Self {
        *self.duration.lock() = duration;
        self
    }

    pub fn fail_path(&self, path: &str) {
        self.failing.lock().insert(path.to_string());
    }

    /// Most recently created layer for `path`.
    pub fn handle(&self, path: &str) -> Option<MockHandle> {
        self.handles
            .lock()
            .get(path)
            .and_then(|handles| handles.last().cloned())
    }

    /// Every layer created for `path`, oldest first.
    pub fn handles(&self, path: &str) -> Vec<MockHandle> {
        self.handles.lock().get(path).cloned().unwrap_or_default()
    }

    pub fn load_count(&self) -> usize {
        *self.loads.lock()
    }

    pub fn preloaded(&self) -> Vec<String> {
        self.preloads.lock().clone()
    }

    pub fn evicted(&self) -> Vec<String> {
        self.evicted.lock().clone()
    }
}

impl LayerLoader for MockLoader {
    fn load(&self, path: &str) -> Result<Box<dyn SoundLayer>, LayerError> {
        *self.loads.lock() += 1;
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        if self.failing.lock().contains(path) {
            return Err(LayerError::Decode {
                path: path.to_string(),
                reason: "mock decode failure".to_string(),
            });
        }
        let (layer, handle) = MockLayer::new(path, *self.duration.lock());
        self.handles
            .lock()
            .entry(path.to_string())
            .or_default()
            .push(handle);
        Ok(Box::new(layer))
    }

    fn preload(&self, path: &str) -> Result<(), LayerError> {
        if self.failing.lock().contains(path) {
            return Err(LayerError::Decode {
                path: path.to_string(),
                reason: "mock decode failure".to_string(),
            });
        }
        self.preloads.lock().push(path.to_string());
        Ok(())
    }

    fn evict(&self, path: &str) {
        self.evicted.lock().push(path.to_string());
    }
}

#[derive(Debug, Default)]
struct HostRecord {
    persisted: Vec<SettingChange>,
    stopped: Vec<String>,
    notices: Vec<Notice>,
}

/// Host that records every call.
#[derive(Debug, Default)]
pub struct RecordingHost {
    authoritative: bool,
    fail_stop_writes: bool,
    record: Mutex<HostRecord>,
}

impl RecordingHost {
    pub fn authoritative() -> Self {
        Self {
            authoritative: true,
            ..Self::default()
        }
    }

    pub fn observer() -> Self {
        Self::default()
    }

    /// Make every `mark_sound_stopped` call fail.
    pub fn failing_stop_writes(mut self) -> Self {
        self.fail_stop_writes = true;
        self
    }

    pub fn persisted(&self) -> Vec<SettingChange> {
        self.record.lock().persisted.clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.record.lock().stopped.clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.record.lock().notices.clone()
    }
}

impl HostBridge for RecordingHost {
    fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    fn persist(&self, change: SettingChange) -> Result<(), HostError> {
        self.record.lock().persisted.push(change);
        Ok(())
    }

    fn mark_sound_stopped(&self, sound_id: &str) -> Result<(), HostError> {
        self.record.lock().stopped.push(sound_id.to_string());
        if self.fail_stop_writes {
            return Err(HostError::Missing(sound_id.to_string()));
        }
        Ok(())
    }

    fn notify(&self, notice: Notice) {
        self.record.lock().notices.push(notice);
    }
}
