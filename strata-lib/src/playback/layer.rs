//! The sound-layer primitive the engine drives.
//!
//! A layer is one decoded audio source that can be played from an offset,
//! stopped, and have its volume changed while playing. Loading happens
//! through a [`LayerLoader`], which the engine calls from worker threads.

use crate::error::LayerError;

/// Options for starting a layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayOptions {
    pub volume: f32,
    pub looping: bool,
    /// Start position in seconds.
    pub offset: f64,
}

impl PlayOptions {
    /// Silent start at `offset`.
    pub fn muted(looping: bool, offset: f64) -> Self {
        Self {
            volume: 0.0,
            looping,
            offset: offset.max(0.0),
        }
    }
}

/// A loaded, playable audio layer.
pub trait SoundLayer: Send {
    /// Start (or restart) playback with the given options.
    fn play(&mut self, options: PlayOptions) -> Result<(), LayerError>;

    /// Stop playback. Stopping a stopped layer is a no-op.
    fn stop(&mut self);

    /// Elapsed playback position in seconds.
    fn current_time(&self) -> f64;

    /// Total duration in seconds, `0.0` when unknown.
    fn duration(&self) -> f64;

    fn volume(&self) -> f32;

    fn set_volume(&mut self, volume: f32);

    fn is_playing(&self) -> bool;
}

/// Produces ready-to-play layers from source paths.
pub trait LayerLoader: Send + Sync {
    /// Load and decode `path`. Returns once the layer is ready to play.
    fn load(&self, path: &str) -> Result<Box<dyn SoundLayer>, LayerError>;

    /// Warm any cache for `path` without keeping a handle.
    fn preload(&self, path: &str) -> Result<(), LayerError> {
        self.load(path).map(|_| ())
    }

    /// Drop anything cached for `path`. Layers already handed out keep
    /// playing.
    fn evict(&self, _path: &str) {}
}
