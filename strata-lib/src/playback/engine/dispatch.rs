//! The single entry point for host notifications.
//!
//! Every playback request passes through [`AdaptiveEngine::handle_event`],
//! which decides whether this engine owns the sound or the host should fall
//! back to its native single-track path.

use std::collections::HashSet;

use log::{debug, info, warn};

use super::{AdaptiveEngine, StartRequest};
use crate::container::library::{PlaylistConfig, SoundConfig};
use crate::container::settings::SettingChange;
use crate::error::{EngineError, EngineResult};
use crate::host::Notice;
use crate::playback::combat::CombatEnd;
use crate::playback::events::StopReason;

/// Notification from the host application.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    PlayRequested {
        sound_id: String,
        /// Whether a user pressed play, as opposed to a resumed session.
        user_initiated: bool,
    },
    StopRequested {
        sound_id: String,
    },
    SoundDeleted {
        sound_id: String,
    },
    PlaylistDeleted {
        playlist_id: String,
    },
    /// A sound was added, possibly as a copy of another sound.
    SoundCreated {
        playlist_id: String,
        sound: SoundConfig,
    },
    SoundUpdated {
        playlist_id: String,
        sound: SoundConfig,
    },
    PlaylistUpdated(PlaylistConfig),
    CombatStarted {
        combat_id: String,
    },
    CombatEnded {
        combat_id: String,
    },
    /// A shared setting changed on another client.
    SettingChanged(SettingChange),
}

/// Who handles a host event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The engine owns it; the host's default handling must not run.
    Handled,
    /// Not an adaptive sound; the host should use its native path.
    Passthrough,
}

impl AdaptiveEngine {
    /// React to a host notification.
    ///
    /// Play requests block until every layer has loaded.
    pub fn handle_event(&self, event: HostEvent) -> Dispatch {
        match event {
            HostEvent::PlayRequested {
                sound_id,
                user_initiated,
            } => self.handle_play(&sound_id, user_initiated),
            HostEvent::StopRequested { sound_id } => {
                if self.stop(&sound_id, true) {
                    Dispatch::Handled
                } else {
                    Dispatch::Passthrough
                }
            }
            HostEvent::SoundDeleted { sound_id } => {
                let removed: Vec<SoundConfig> =
                    self.library.lock().remove_sound(&sound_id).into_iter().collect();
                let stopped = self.stop_with_reason(&sound_id, StopReason::Deleted, true);
                self.release_layers(&removed);
                if stopped {
                    Dispatch::Handled
                } else {
                    Dispatch::Passthrough
                }
            }
            HostEvent::PlaylistDeleted { playlist_id } => {
                for sound_id in self.sounds_in_container(&playlist_id, "") {
                    self.stop_with_reason(&sound_id, StopReason::Deleted, true);
                }
                let removed = self.library.lock().remove_playlist(&playlist_id);
                if let Some(playlist) = removed {
                    self.release_layers(&playlist.sounds);
                }
                Dispatch::Handled
            }
            HostEvent::SoundCreated { playlist_id, sound } => {
                self.handle_sound_created(&playlist_id, sound)
            }
            HostEvent::SoundUpdated { playlist_id, sound } => {
                self.library.lock().upsert_sound(&playlist_id, sound);
                Dispatch::Handled
            }
            HostEvent::PlaylistUpdated(playlist) => {
                let playlist_id = playlist.id.clone();
                let adaptive = playlist.is_adaptive;
                self.library.lock().upsert_playlist(playlist);
                if !adaptive {
                    let stopped = self.stop_playlist(&playlist_id);
                    if stopped > 0 {
                        info!(
                            "playlist {} is no longer adaptive; stopped {} sounds",
                            playlist_id, stopped
                        );
                    }
                }
                Dispatch::Handled
            }
            HostEvent::CombatStarted { combat_id } => {
                self.combat_started(&combat_id);
                Dispatch::Handled
            }
            HostEvent::CombatEnded { combat_id } => {
                self.combat_ended(&combat_id);
                Dispatch::Handled
            }
            HostEvent::SettingChanged(change) => {
                self.apply_remote_setting(change);
                Dispatch::Handled
            }
        }
    }

    fn handle_play(&self, sound_id: &str, user_initiated: bool) -> Dispatch {
        let request = {
            let library = self.library.lock();
            let Some((playlist, sound)) = library.find_sound(sound_id) else {
                return Dispatch::Passthrough;
            };
            if !playlist.is_adaptive {
                return Dispatch::Passthrough;
            }
            if !sound.has_alternate_layers() {
                warn!(
                    "sound {} in adaptive playlist {} has no mid or low layer",
                    sound.name, playlist.name
                );
                return Dispatch::Passthrough;
            }
            StartRequest::for_sound(playlist, sound)
        };

        if let Err(err) = self.start(request) {
            if user_initiated {
                self.host
                    .notify(Notice::error(format!("Could not play {}: {}", sound_id, err)));
            }
            if let Err(err) = self.host.mark_sound_stopped(sound_id) {
                warn!("could not mark sound {} as stopped: {}", sound_id, err);
            }
        }
        Dispatch::Handled
    }

    fn handle_sound_created(&self, playlist_id: &str, mut sound: SoundConfig) -> Dispatch {
        let adaptive_playlist = self
            .library
            .lock()
            .playlist(playlist_id)
            .map_or(false, |playlist| playlist.is_adaptive);

        if adaptive_playlist && sound.playing && sound.has_alternate_layers() {
            debug!("sound {} was created playing; clearing the flag", sound.id);
            sound.playing = false;
            if let Err(err) = self.host.mark_sound_stopped(&sound.id) {
                warn!("could not mark copied sound {} as stopped: {}", sound.id, err);
            }
        }
        self.library.lock().upsert_sound(playlist_id, sound);
        Dispatch::Handled
    }

    /// Evict cached layers of deleted sounds that no remaining sound uses.
    fn release_layers(&self, removed: &[SoundConfig]) {
        let unused: Vec<String> = {
            let library = self.library.lock();
            let in_use: HashSet<String> = library
                .playlists()
                .iter()
                .flat_map(|playlist| playlist.sounds.iter())
                .flat_map(SoundConfig::layer_files)
                .collect();
            removed
                .iter()
                .flat_map(SoundConfig::layer_files)
                .filter(|path| !in_use.contains(path))
                .collect()
        };
        for path in unused {
            self.loader.evict(&path);
        }
    }

    fn combat_started(&self, combat_id: &str) {
        let (enabled, target) = {
            let settings = self.settings.lock();
            (settings.auto_combat_intensity, settings.combat_intensity)
        };
        let current = self.intensity();
        if !self.combat.lock().encounter_started(combat_id, current, enabled) {
            debug!("combat {} started; automatic intensity is off", combat_id);
            return;
        }
        info!("combat {} started; fading intensity to {:.2}", combat_id, target);
        let duration = self.tuning.lock().combat_fade;
        self.fade_to(target, duration, true);
    }

    fn combat_ended(&self, combat_id: &str) {
        let decision = self.combat.lock().encounter_ended(combat_id);
        match decision {
            CombatEnd::StillActive => debug!("combat {} ended; another is still active", combat_id),
            CombatEnd::Keep => debug!("combat {} ended; keeping current intensity", combat_id),
            CombatEnd::Restore(previous) => {
                info!("combat {} ended; restoring intensity {:.2}", combat_id, previous);
                let duration = self.tuning.lock().combat_fade;
                self.fade_to(previous, duration, true);
            }
        }
    }

    fn apply_remote_setting(&self, change: SettingChange) {
        match change {
            SettingChange::Intensity(value) => {
                self.set_global_intensity(value, true);
            }
            SettingChange::CustomMixEnabled(enabled) => self.set_custom_mix_enabled(enabled, true),
            SettingChange::CustomVolume(layer, value) => {
                self.set_custom_volume(layer, value, true);
            }
            SettingChange::MasterVolume(_) => {
                debug!("ignoring remote master volume; it is local to each client")
            }
        }
    }

    /// Fill a sound's empty Mid/Low paths from sibling `Intensity N` files.
    ///
    /// `exists` decides whether a candidate path is present. Returns whether
    /// any path was filled in.
    pub fn auto_detect_sound(
        &self,
        sound_id: &str,
        exists: impl Fn(&str) -> bool,
    ) -> EngineResult<bool> {
        let detected = {
            let mut library = self.library.lock();
            let Some(sound) = library.sound_mut(sound_id) else {
                return Err(EngineError::UnknownSound(sound_id.to_string()));
            };
            if !sound.auto_detect_layers(exists) {
                return Ok(false);
            }
            sound.clone()
        };
        info!(
            "detected layers for {}: mid={:?} low={:?}",
            detected.name, detected.mid_intensity_path, detected.low_intensity_path
        );
        self.host.notify(Notice::info(format!(
            "Detected intensity layers for {}",
            detected.name
        )));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::container::library::PlaybackMode;
    use crate::container::settings::EngineSettings;
    use crate::host::NoticeLevel;
    use crate::mix::LayerKind;
    use crate::playback::engine::test_support::{fixture, fixture_with};
    use crate::test_data::{MockLoader, RecordingHost};

    fn play(sound_id: &str, user_initiated: bool) -> HostEvent {
        HostEvent::PlayRequested {
            sound_id: sound_id.to_string(),
            user_initiated,
        }
    }

    fn combat(started: bool, id: &str) -> HostEvent {
        if started {
            HostEvent::CombatStarted {
                combat_id: id.to_string(),
            }
        } else {
            HostEvent::CombatEnded {
                combat_id: id.to_string(),
            }
        }
    }

    #[test]
    fn adaptive_sound_is_handled() {
        let fx = fixture();
        assert_eq!(fx.engine.handle_event(play("drums", true)), Dispatch::Handled);
        assert!(fx.engine.is_playing("drums"));
        fx.engine.stop_all();
    }

    #[test]
    fn non_adaptive_sounds_pass_through() {
        let fx = fixture();
        assert_eq!(fx.engine.handle_event(play("tavern", true)), Dispatch::Passthrough);
        assert_eq!(fx.engine.handle_event(play("solo", true)), Dispatch::Passthrough);
        assert_eq!(fx.engine.handle_event(play("missing", true)), Dispatch::Passthrough);
        assert_eq!(fx.loader.load_count(), 0);
    }

    #[test]
    fn user_play_failure_is_surfaced() {
        let fx = fixture();
        fx.loader.fail_path("drums_low.ogg");
        assert_eq!(fx.engine.handle_event(play("drums", true)), Dispatch::Handled);
        let notices = fx.host.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert_eq!(fx.host.stopped(), vec!["drums".to_string()]);
    }

    #[test]
    fn background_play_failure_is_quiet() {
        let fx = fixture();
        fx.loader.fail_path("drums_low.ogg");
        fx.engine.handle_event(play("drums", false));
        assert!(fx.host.notices().is_empty());
        assert!(!fx.engine.is_playing("drums"));
    }

    #[test]
    fn stop_request_skips_host_write() {
        let fx = fixture();
        fx.engine.handle_event(play("drums", true));
        let stop = HostEvent::StopRequested {
            sound_id: "drums".to_string(),
        };
        assert_eq!(fx.engine.handle_event(stop.clone()), Dispatch::Handled);
        assert_eq!(fx.engine.handle_event(stop), Dispatch::Passthrough);
        assert!(fx.host.stopped().is_empty());
    }

    #[test]
    fn deleting_sound_or_playlist_stops_playback() {
        let fx = fixture();
        fx.engine.handle_event(play("drums", true));
        fx.engine.handle_event(play("rain", true));
        fx.engine.handle_event(HostEvent::SoundDeleted {
            sound_id: "drums".to_string(),
        });
        fx.engine.handle_event(HostEvent::PlaylistDeleted {
            playlist_id: "ambience".to_string(),
        });

        assert_eq!(fx.engine.get_state().active_tracks, 0);
        let library = fx.engine.library();
        assert!(library.find_sound("drums").is_none());
        assert!(library.playlist("ambience").is_none());
        assert!(fx.host.stopped().is_empty());
    }

    #[test]
    fn deleted_layers_leave_the_loader_cache() {
        let fx = fixture();
        fx.engine.handle_event(HostEvent::SoundCreated {
            playlist_id: "ambience".to_string(),
            sound: SoundConfig::new("storm", "rain_high.ogg").with_layers(Some("storm_mid.ogg"), None),
        });
        fx.engine.handle_event(HostEvent::SoundDeleted {
            sound_id: "drums".to_string(),
        });
        let mut evicted = fx.loader.evicted();
        evicted.sort();
        assert_eq!(evicted, vec!["drums_high.ogg", "drums_low.ogg", "drums_mid.ogg"]);

        fx.engine.handle_event(HostEvent::PlaylistDeleted {
            playlist_id: "ambience".to_string(),
        });
        let evicted = fx.loader.evicted();
        assert!(evicted.contains(&"rain_high.ogg".to_string()));
        assert!(evicted.contains(&"storm_mid.ogg".to_string()));
        assert!(evicted.contains(&"wind_mid.ogg".to_string()));
    }

    #[test]
    fn shared_layer_stays_cached_while_in_use() {
        let fx = fixture();
        fx.engine.handle_event(HostEvent::SoundCreated {
            playlist_id: "ambience".to_string(),
            sound: SoundConfig::new("drizzle", "drizzle_high.ogg").with_layers(None, Some("rain_low.ogg")),
        });
        fx.engine.handle_event(HostEvent::SoundDeleted {
            sound_id: "rain".to_string(),
        });
        assert_eq!(fx.loader.evicted(), vec!["rain_high.ogg".to_string()]);
    }

    #[test]
    fn copy_of_playing_sound_is_forced_stopped() {
        let fx = fixture();
        let mut copy = SoundConfig::new("drums-copy", "drums_high.ogg")
            .with_layers(Some("drums_mid.ogg"), None);
        copy.playing = true;
        fx.engine.handle_event(HostEvent::SoundCreated {
            playlist_id: "battle".to_string(),
            sound: copy,
        });

        assert_eq!(fx.host.stopped(), vec!["drums-copy".to_string()]);
        let library = fx.engine.library();
        let (_, stored) = library.find_sound("drums-copy").unwrap();
        assert!(!stored.playing);
        assert!(!fx.engine.is_playing("drums-copy"));
    }

    #[test]
    fn playlist_losing_adaptive_flag_stops_its_sounds() {
        let fx = fixture();
        fx.engine.handle_event(play("rain", true));
        let mut playlist = fx.engine.library().playlist("ambience").unwrap().clone();
        playlist.is_adaptive = false;
        playlist.mode = PlaybackMode::Simultaneous;
        fx.engine.handle_event(HostEvent::PlaylistUpdated(playlist));
        assert!(!fx.engine.is_playing("rain"));
        assert_eq!(fx.host.stopped(), vec!["rain".to_string()]);
    }

    #[test]
    fn overlapping_combats_restore_after_last_one() {
        let fx = fixture();
        fx.engine.set_global_intensity(0.3, false);

        fx.engine.handle_event(combat(true, "a"));
        assert_abs_diff_eq!(fx.engine.intensity(), 1.0);
        fx.engine.handle_event(combat(true, "b"));
        fx.engine.handle_event(combat(false, "a"));
        assert_abs_diff_eq!(fx.engine.intensity(), 1.0);
        assert_eq!(fx.engine.get_state().pre_combat_intensity, Some(0.3));

        fx.engine.handle_event(combat(false, "b"));
        assert_abs_diff_eq!(fx.engine.intensity(), 0.3);
        assert_eq!(fx.engine.get_state().pre_combat_intensity, None);
    }

    #[test]
    fn manual_change_during_combat_is_kept() {
        let fx = fixture();
        fx.engine.set_global_intensity(0.3, false);
        fx.engine.handle_event(combat(true, "a"));
        fx.engine.set_global_intensity(0.6, false);
        fx.engine.handle_event(combat(false, "a"));
        assert_abs_diff_eq!(fx.engine.intensity(), 0.6);
    }

    #[test]
    fn disabled_auto_combat_leaves_intensity() {
        let settings = EngineSettings {
            auto_combat_intensity: false,
            ..EngineSettings::default()
        };
        let fx = fixture_with(MockLoader::new(), RecordingHost::authoritative(), settings);
        fx.engine.handle_event(combat(true, "a"));
        assert_abs_diff_eq!(fx.engine.intensity(), 0.5);
        assert_eq!(fx.engine.get_state().combat_encounters, 1);
    }

    #[test]
    fn combat_fade_runs_over_configured_duration() {
        let fx = fixture();
        fx.engine.set_combat_fade(Duration::from_millis(200));
        fx.engine.handle_event(combat(true, "a"));
        assert!(fx.engine.get_state().fading);
        std::thread::sleep(Duration::from_millis(500));
        assert_abs_diff_eq!(fx.engine.intensity(), 1.0);
    }

    #[test]
    fn remote_settings_apply_without_persisting() {
        let fx = fixture();
        fx.engine
            .handle_event(HostEvent::SettingChanged(SettingChange::Intensity(0.9)));
        fx.engine.handle_event(HostEvent::SettingChanged(SettingChange::CustomVolume(
            LayerKind::Mid,
            0.2,
        )));
        fx.engine
            .handle_event(HostEvent::SettingChanged(SettingChange::MasterVolume(0.1)));

        let state = fx.engine.mix_state();
        assert_abs_diff_eq!(state.intensity, 0.9);
        assert_abs_diff_eq!(state.custom_volumes.mid, 0.2);
        assert_abs_diff_eq!(state.master_volume, 1.0);
        assert!(fx.host.persisted().is_empty());
    }

    #[test]
    fn auto_detect_fills_layers_and_notifies() {
        let fx = fixture();
        fx.engine.handle_event(HostEvent::SoundCreated {
            playlist_id: "battle".to_string(),
            sound: SoundConfig::new("march", "music/March Intensity 3.ogg"),
        });
        let exists = |path: &str| path.ends_with("Intensity 1.ogg") || path.ends_with("Intensity 2.ogg");
        assert!(fx.engine.auto_detect_sound("march", exists).unwrap());

        let library = fx.engine.library();
        let (_, sound) = library.find_sound("march").unwrap();
        assert_eq!(
            sound.mid_intensity_path.as_deref(),
            Some("music/March Intensity 2.ogg")
        );
        assert_eq!(
            sound.low_intensity_path.as_deref(),
            Some("music/March Intensity 1.ogg")
        );
        assert_eq!(fx.host.notices()[0].level, NoticeLevel::Info);
        assert!(matches!(
            fx.engine.auto_detect_sound("missing", |_| true),
            Err(EngineError::UnknownSound(_))
        ));
    }
}
