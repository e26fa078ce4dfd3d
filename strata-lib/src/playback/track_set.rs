//! Runtime record for one playing adaptive sound.

use log::{debug, warn};

use crate::error::LayerError;
use crate::mix::{LayerKind, LayerSlots, MixLevels, MixState};
use crate::playback::layer::{PlayOptions, SoundLayer};

/// Lifecycle state of a track set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Loading,
    Playing,
    Stopped,
}

/// One secondary layer realigned to the primary during a drift check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftCorrection {
    pub layer: LayerKind,
    pub drift: f64,
}

/// Result of inspecting a track set on a drift-monitor tick.
#[derive(Debug, Clone, PartialEq)]
pub enum DriftOutcome {
    /// Primary is not playing; nothing was checked.
    Idle,
    /// Non-looping primary reached its end.
    Finished,
    /// Secondaries were checked; any realigned ones are listed.
    Checked(Vec<DriftCorrection>),
}

/// Up to three synchronized layers of a single sound.
pub struct TrackSet {
    sound_id: String,
    container_id: String,
    base_volume: f32,
    looping: bool,
    sequence: u64,
    state: TrackState,
    layers: LayerSlots<Box<dyn SoundLayer>>,
}

impl TrackSet {
    pub fn new(
        sound_id: impl Into<String>,
        container_id: impl Into<String>,
        base_volume: f32,
        looping: bool,
        sequence: u64,
        layers: LayerSlots<Box<dyn SoundLayer>>,
    ) -> Self {
        Self {
            sound_id: sound_id.into(),
            container_id: container_id.into(),
            base_volume: crate::mix::clamp_unit(base_volume),
            looping,
            sequence,
            state: TrackState::Loading,
            layers,
        }
    }

    pub fn sound_id(&self) -> &str {
        &self.sound_id
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Start order of this set; larger means started later.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn kinds(&self) -> Vec<LayerKind> {
        self.layers.kinds()
    }

    /// Primary layer for drift purposes: first present of Low, Mid, High.
    pub fn primary_kind(&self) -> Option<LayerKind> {
        self.layers.kinds().first().copied()
    }

    /// Final per-layer volumes: curve-or-custom × master × base volume.
    pub fn target_levels(&self, mix: &MixState) -> MixLevels {
        let levels = mix.levels_for(&self.kinds());
        let mut scaled = MixLevels::default();
        for kind in self.kinds() {
            scaled.set(kind, crate::mix::clamp_unit(levels.get(kind) * self.base_volume));
        }
        scaled
    }

    /// Write the current mix to every present layer.
    pub fn apply_mix(&mut self, mix: &MixState) {
        let levels = self.target_levels(mix);
        for kind in LayerKind::PRIORITY {
            if let Some(layer) = self.layers.get_mut(kind) {
                layer.set_volume(levels.get(kind));
            }
        }
    }

    /// Start every layer muted at zero, then apply the mix.
    ///
    /// On failure, every layer already started is stopped again.
    pub fn begin_playback(&mut self, mix: &MixState) -> Result<(), LayerError> {
        let options = PlayOptions::muted(self.looping, 0.0);
        for kind in self.kinds() {
            let Some(layer) = self.layers.get_mut(kind) else {
                continue;
            };
            if let Err(err) = layer.play(options) {
                self.stop_all();
                return Err(err);
            }
        }
        self.apply_mix(mix);
        self.state = TrackState::Playing;
        self.warn_on_length_mismatch();
        Ok(())
    }

    fn warn_on_length_mismatch(&self) {
        let Some(high) = self.layers.get(LayerKind::High) else {
            return;
        };
        let reference = high.duration();
        for (kind, layer) in self.layers.iter() {
            let duration = layer.duration();
            if reference > 0.0 && duration > 0.0 && (duration - reference).abs() > 0.5 {
                warn!(
                    "{}: {} layer is {:.2}s but high layer is {:.2}s; end detection follows the primary layer",
                    self.sound_id, kind, duration, reference
                );
            }
        }
    }

    /// Stop every present layer.
    pub fn stop_all(&mut self) {
        for kind in LayerKind::PRIORITY {
            if let Some(layer) = self.layers.get_mut(kind) {
                layer.stop();
            }
        }
        self.state = TrackState::Stopped;
    }

    /// Current volume of each present layer as reported by the handle.
    pub fn layer_volumes(&self) -> Vec<(LayerKind, f32)> {
        self.layers
            .iter()
            .map(|(kind, layer)| (kind, layer.volume()))
            .collect()
    }

    /// Measure phase offset against the primary and realign secondaries.
    ///
    /// A secondary further than `threshold` seconds from the primary is
    /// restarted muted at the primary's position and remixed immediately.
    /// A non-looping primary within `end_window` seconds of its end reports
    /// [`DriftOutcome::Finished`] without touching any layer.
    pub fn check_drift(
        &mut self,
        mix: &MixState,
        threshold: f64,
        end_window: f64,
    ) -> Result<DriftOutcome, LayerError> {
        let Some(primary_kind) = self.primary_kind() else {
            return Ok(DriftOutcome::Idle);
        };
        let (primary_time, primary_duration) = match self.layers.get(primary_kind) {
            Some(primary) if primary.is_playing() => (primary.current_time(), primary.duration()),
            // A non-looping primary that stopped on its own ran out between ticks.
            Some(_) if !self.looping && self.state == TrackState::Playing => {
                debug!("{}: primary layer ended between checks", self.sound_id);
                return Ok(DriftOutcome::Finished);
            }
            Some(_) => return Ok(DriftOutcome::Idle),
            None => return Err(LayerError::Stale),
        };

        if !self.looping && primary_duration > 0.0 && primary_time >= primary_duration - end_window {
            debug!("{}: primary layer reached its end", self.sound_id);
            return Ok(DriftOutcome::Finished);
        }

        let levels = self.target_levels(mix);
        let looping = self.looping;
        let mut corrections = Vec::new();
        for kind in LayerKind::PRIORITY {
            if kind == primary_kind {
                continue;
            }
            let Some(layer) = self.layers.get_mut(kind) else {
                continue;
            };
            let drift = (layer.current_time() - primary_time).abs();
            if drift <= threshold {
                continue;
            }

            layer.stop();
            layer.play(PlayOptions::muted(looping, primary_time))?;
            layer.set_volume(levels.get(kind));
            corrections.push(DriftCorrection { layer: kind, drift });
        }

        Ok(DriftOutcome::Checked(corrections))
    }
}

impl std::fmt::Debug for TrackSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackSet")
            .field("sound_id", &self.sound_id)
            .field("container_id", &self.container_id)
            .field("base_volume", &self.base_volume)
            .field("looping", &self.looping)
            .field("sequence", &self.sequence)
            .field("state", &self.state)
            .field("layers", &self.kinds())
            .finish()
    }
}
