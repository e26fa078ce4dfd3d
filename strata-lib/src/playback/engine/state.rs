use std::time::Duration;

use serde::Serialize;

use crate::mix::{MixLevels, MixState};
use crate::playback::fade::Fade;

/// Runtime timing knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineTuning {
    /// Period of the drift monitor.
    pub drift_interval: Duration,
    /// Seconds a secondary layer may drift before it is realigned.
    pub drift_threshold: f64,
    /// Seconds before the primary's end at which a non-looping set finishes.
    pub end_window: f64,
    pub fade_tick: Duration,
    /// Upper bound on loading all layers of one sound.
    pub load_timeout: Duration,
    pub combat_fade: Duration,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            drift_interval: Duration::from_secs(1),
            drift_threshold: 0.1,
            end_window: 0.2,
            fade_tick: Duration::from_millis(16),
            load_timeout: Duration::from_secs(30),
            combat_fade: Duration::from_secs(2),
        }
    }
}

/// Global mix plus the bookkeeping of the fade currently driving it.
///
/// A fade step only lands while its generation is still current, so any
/// intensity write cancels the fade by bumping the generation.
#[derive(Debug, Clone)]
pub(crate) struct MixCore {
    pub state: MixState,
    pub fade_generation: u64,
    pub active_fade: Option<Fade>,
}

impl MixCore {
    pub fn new(state: MixState) -> Self {
        Self {
            state,
            fade_generation: 0,
            active_fade: None,
        }
    }

    /// Invalidate any running fade and return the new generation.
    pub fn cancel_fade(&mut self) -> u64 {
        self.fade_generation = self.fade_generation.wrapping_add(1);
        self.active_fade = None;
        self.fade_generation
    }
}

/// Display snapshot returned by [`super::AdaptiveEngine::get_state`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub intensity: f32,
    pub master_volume: f32,
    pub custom_mix_enabled: bool,
    pub custom_volumes: MixLevels,
    /// Three-layer curve at the current intensity.
    pub curve: MixLevels,
    pub active_tracks: usize,
    pub loading_tracks: usize,
    /// Sound ids with a registered track set, sorted.
    pub playing: Vec<String>,
    pub drift_monitor_running: bool,
    pub fading: bool,
    pub combat_encounters: usize,
    pub pre_combat_intensity: Option<f32>,
}
