use log::{debug, warn};

use super::state::MixCore;
use super::AdaptiveEngine;
use crate::container::settings::SettingChange;
use crate::mix::{clamp_unit, LayerKind, MixLevels, MixState};
use crate::playback::events::EngineEvent;

impl AdaptiveEngine {
    /// Set the global intensity, cancelling any running fade.
    ///
    /// `from_sync` marks a value that arrived from another client or from
    /// internal bookkeeping: it neither counts as a manual change during
    /// combat nor gets persisted again.
    pub fn set_global_intensity(&self, value: f32, from_sync: bool) -> f32 {
        let value = clamp_unit(value);
        self.update_mix(|core| {
            core.cancel_fade();
            core.state.intensity = value;
            true
        });
        if !from_sync {
            self.combat.lock().note_manual_change();
        }
        self.record_setting(SettingChange::Intensity(value), from_sync);
        self.events.emit(EngineEvent::IntensityChanged { value, from_sync });
        value
    }

    /// Master volume is local to this client and always persisted.
    pub fn set_master_volume(&self, value: f32) -> f32 {
        let value = clamp_unit(value);
        self.update_mix(|core| {
            core.state.master_volume = value;
            true
        });
        self.record_setting(SettingChange::MasterVolume(value), false);
        self.events.emit(EngineEvent::MasterVolumeChanged { value });
        value
    }

    pub fn set_custom_mix_enabled(&self, enabled: bool, from_sync: bool) {
        let state = self.update_mix(|core| {
            core.state.custom_mix_enabled = enabled;
            true
        });
        self.record_setting(SettingChange::CustomMixEnabled(enabled), from_sync);
        if let Some(state) = state {
            self.events.emit(EngineEvent::CustomMixChanged {
                enabled,
                volumes: state.custom_volumes,
            });
        }
    }

    pub fn set_custom_volume(&self, layer: LayerKind, value: f32, from_sync: bool) -> f32 {
        let value = clamp_unit(value);
        let state = self.update_mix(|core| {
            core.state.custom_volumes.set(layer, value);
            true
        });
        self.record_setting(SettingChange::CustomVolume(layer, value), from_sync);
        if let Some(state) = state {
            self.events.emit(EngineEvent::CustomMixChanged {
                enabled: state.custom_mix_enabled,
                volumes: state.custom_volumes,
            });
        }
        value
    }

    /// Three-layer curve volumes at `intensity`.
    pub fn calculate_mix(&self, intensity: f32) -> MixLevels {
        crate::mix::calculate_mix(intensity)
    }

    pub fn intensity(&self) -> f32 {
        self.mix.lock().state.intensity
    }

    pub fn mix_state(&self) -> MixState {
        self.mix.lock().state
    }

    /// Volumes the engine targets for each present layer of a playing sound.
    pub fn effective_volumes(&self, sound_id: &str) -> Option<MixLevels> {
        let state = self.mix.lock().state;
        self.tracks
            .lock()
            .get(sound_id)
            .map(|set| set.target_levels(&state))
    }

    /// Volumes read back from the layer handles of a playing sound.
    pub fn layer_volumes(&self, sound_id: &str) -> Option<Vec<(LayerKind, f32)>> {
        self.tracks.lock().get(sound_id).map(|set| set.layer_volumes())
    }

    /// Mutate the mix and push the result to every track set.
    ///
    /// The mix lock is held while the track sets are remixed, so a set
    /// registering concurrently never starts with a stale mix. Returns
    /// `None` when `update` declined the change.
    pub(super) fn update_mix(&self, update: impl FnOnce(&mut MixCore) -> bool) -> Option<MixState> {
        let mut core = self.mix.lock();
        if !update(&mut core) {
            return None;
        }
        let state = core.state;
        let mut tracks = self.tracks.lock();
        for set in tracks.values_mut() {
            set.apply_mix(&state);
        }
        Some(state)
    }

    /// Fold a change into the settings record and persist it when allowed.
    pub(super) fn record_setting(&self, change: SettingChange, from_sync: bool) {
        self.settings.lock().apply(&change);
        if from_sync {
            return;
        }
        if change.is_shared() && !self.host.is_authoritative() {
            debug!("not authoritative; keeping {:?} local", change);
            return;
        }
        if let Err(err) = self.host.persist(change) {
            warn!("failed to persist {:?}: {}", change, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use crate::container::library::{LayerPaths, PlaybackMode};
    use crate::container::settings::{EngineSettings, SettingChange};
    use crate::mix::{LayerKind, MixLevels};
    use crate::playback::engine::test_support::{fixture, fixture_with};
    use crate::playback::engine::StartRequest;
    use crate::test_data::{MockLoader, RecordingHost};

    #[test]
    fn intensity_is_clamped_and_remixes_playing_sets() {
        let fx = fixture();
        fx.engine.play_sound("brass").unwrap();
        assert_eq!(fx.engine.set_global_intensity(1.5, false), 1.0);

        let high = fx.loader.handle("brass_high.ogg").unwrap();
        let mid = fx.loader.handle("brass_mid.ogg").unwrap();
        // Base volume 0.5 from the sound's default volume.
        assert_abs_diff_eq!(high.volume(), 0.5);
        assert_abs_diff_eq!(mid.volume(), 0.0);
        fx.engine.stop_all();
    }

    #[test]
    fn master_volume_scales_curve_volume() {
        let fx = fixture();
        fx.engine.play_sound("drums").unwrap();
        fx.engine.set_global_intensity(0.375, false);
        fx.engine.set_master_volume(0.5);

        // At 0.375 the mid layer sits at 1.0 on the curve and low at 0.5.
        let levels = fx.engine.effective_volumes("drums").unwrap();
        assert_abs_diff_eq!(levels.mid, 0.25, epsilon = 1e-6);

        let request = StartRequest::new(
            "wind",
            "ambience",
            LayerPaths::new("wind_high.ogg", Some("wind_mid.ogg".into()), None),
        )
        .mode(PlaybackMode::Simultaneous);
        fx.engine.start(request).unwrap();
        fx.engine.set_global_intensity(0.8, false);
        let levels = fx.engine.effective_volumes("wind").unwrap();
        assert_abs_diff_eq!(levels.high, 0.4, epsilon = 1e-6);
        let high = fx.loader.handle("wind_high.ogg").unwrap();
        assert_abs_diff_eq!(high.volume(), 0.4, epsilon = 1e-6);
        fx.engine.stop_all();
    }

    #[test]
    fn layer_volumes_read_back_scaled_handles() {
        let fx = fixture();
        fx.engine.play_sound("drums").unwrap();
        fx.engine.set_global_intensity(0.375, false);
        fx.engine.set_master_volume(0.5);

        let volumes = fx.engine.layer_volumes("drums").unwrap();
        let kinds: Vec<LayerKind> = volumes.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(kinds, vec![LayerKind::Low, LayerKind::Mid, LayerKind::High]);

        let expected = fx.engine.effective_volumes("drums").unwrap();
        for (kind, volume) in &volumes {
            assert_abs_diff_eq!(*volume, expected.get(*kind), epsilon = 1e-6);
        }
        assert_abs_diff_eq!(volumes[1].1, 0.25, epsilon = 1e-6);

        assert!(fx.engine.stop("drums", false));
        assert!(fx.engine.layer_volumes("drums").is_none());
    }

    #[test]
    fn custom_mix_ignores_intensity_on_handles() {
        let fx = fixture();
        fx.engine.play_sound("drums").unwrap();
        fx.engine.set_custom_volume(LayerKind::High, 1.0, false);
        fx.engine.set_custom_volume(LayerKind::Mid, 0.3, false);
        fx.engine.set_custom_volume(LayerKind::Low, 0.0, false);
        fx.engine.set_custom_mix_enabled(true, false);

        for intensity in [0.0, 0.4, 0.9] {
            fx.engine.set_global_intensity(intensity, false);
            let levels = fx.engine.effective_volumes("drums").unwrap();
            // Scaled by the sound's base volume of 0.5.
            assert_eq!(levels, MixLevels::new(0.0, 0.15, 0.5));
        }
        fx.engine.stop_all();
    }

    #[test]
    fn observer_keeps_shared_settings_local() {
        let fx = fixture_with(
            MockLoader::new(),
            RecordingHost::observer(),
            EngineSettings::default(),
        );
        fx.engine.set_global_intensity(0.7, false);
        fx.engine.set_custom_mix_enabled(true, false);
        fx.engine.set_master_volume(0.6);

        assert_eq!(fx.host.persisted(), vec![SettingChange::MasterVolume(0.6)]);
        let settings = fx.engine.settings();
        assert_eq!(settings.current_intensity, Some(0.7));
        assert!(settings.custom_mix_enabled);
    }

    #[test]
    fn sync_writes_are_not_persisted() {
        let fx = fixture();
        fx.engine.set_global_intensity(0.2, true);
        fx.engine.set_custom_volume(LayerKind::Low, 0.4, true);
        assert!(fx.host.persisted().is_empty());
        fx.engine.set_global_intensity(0.3, false);
        assert_eq!(fx.host.persisted(), vec![SettingChange::Intensity(0.3)]);
    }

    #[test]
    fn calculate_mix_matches_curve() {
        let fx = fixture();
        assert_eq!(fx.engine.calculate_mix(0.5), MixLevels::new(1.0, 1.0, 0.0));
    }
}
