use log::{info, warn};

use super::AdaptiveEngine;
use crate::error::{EngineError, EngineResult};
use crate::host::Notice;

/// One layer that could not be preloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct PreloadFailure {
    pub sound_id: String,
    pub path: String,
    pub reason: String,
}

/// Summary of a preload run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreloadReport {
    pub sounds: usize,
    pub layers: usize,
    pub failures: Vec<PreloadFailure>,
}

impl PreloadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn merge(&mut self, other: PreloadReport) {
        self.sounds += other.sounds;
        self.layers += other.layers;
        self.failures.extend(other.failures);
    }
}

impl AdaptiveEngine {
    /// Warm the loader cache for every adaptive sound in adaptive playlists.
    pub fn preload_all(&self) -> PreloadReport {
        let sound_ids = self.library.lock().adaptive_sound_ids();
        self.host.notify(Notice::info(format!(
            "Preloading {} adaptive sounds",
            sound_ids.len()
        )));
        let mut report = PreloadReport::default();
        for sound_id in sound_ids {
            report.merge(self.preload_layers(&sound_id));
        }
        self.announce(&report);
        report
    }

    pub fn preload_playlist(&self, playlist_id: &str) -> EngineResult<PreloadReport> {
        let sound_ids: Vec<String> = {
            let library = self.library.lock();
            let Some(playlist) = library.playlist(playlist_id) else {
                return Err(EngineError::UnknownPlaylist(playlist_id.to_string()));
            };
            playlist
                .sounds
                .iter()
                .filter(|sound| sound.has_alternate_layers())
                .map(|sound| sound.id.clone())
                .collect()
        };
        let mut report = PreloadReport::default();
        for sound_id in sound_ids {
            report.merge(self.preload_layers(&sound_id));
        }
        self.announce(&report);
        Ok(report)
    }

    pub fn preload_sound(&self, sound_id: &str) -> EngineResult<PreloadReport> {
        if self.library.lock().find_sound(sound_id).is_none() {
            return Err(EngineError::UnknownSound(sound_id.to_string()));
        }
        let report = self.preload_layers(sound_id);
        self.announce(&report);
        Ok(report)
    }

    fn preload_layers(&self, sound_id: &str) -> PreloadReport {
        let paths = match self.library.lock().find_sound(sound_id) {
            Some((_, sound)) => sound.layer_paths().slots(),
            None => return PreloadReport::default(),
        };

        let mut report = PreloadReport {
            sounds: 1,
            ..PreloadReport::default()
        };
        for (kind, path) in paths.iter() {
            match self.loader.preload(path) {
                Ok(()) => report.layers += 1,
                Err(err) => {
                    warn!("failed to preload {} layer of {}: {}", kind, sound_id, err);
                    report.failures.push(PreloadFailure {
                        sound_id: sound_id.to_string(),
                        path: path.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        report
    }

    fn announce(&self, report: &PreloadReport) {
        info!(
            "preloaded {} layers of {} sounds ({} failed)",
            report.layers,
            report.sounds,
            report.failures.len()
        );
        if report.is_clean() {
            self.host.notify(Notice::info(format!(
                "Preloaded {} layers",
                report.layers
            )));
        } else {
            self.host.notify(Notice::warning(format!(
                "Preloaded {} layers; {} failed",
                report.layers,
                report.failures.len()
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NoticeLevel;
    use crate::playback::engine::test_support::fixture;

    #[test]
    fn preload_all_visits_adaptive_sounds_only() {
        let fx = fixture();
        let report = fx.engine.preload_all();
        // drums (3), brass (2), rain (2), wind (2); tavern's playlist is not adaptive.
        assert_eq!(report.sounds, 4);
        assert_eq!(report.layers, 9);
        assert!(report.is_clean());
        assert!(!fx.loader.preloaded().contains(&"tavern.ogg".to_string()));
        assert!(!fx.loader.preloaded().contains(&"solo_high.ogg".to_string()));
        assert_eq!(fx.host.notices().len(), 2);
    }

    #[test]
    fn failures_are_collected_and_reported() {
        let fx = fixture();
        fx.loader.fail_path("rain_low.ogg");
        let report = fx.engine.preload_playlist("ambience").unwrap();
        assert_eq!(report.sounds, 2);
        assert_eq!(report.layers, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, "rain_low.ogg");
        assert_eq!(fx.host.notices()[0].level, NoticeLevel::Warning);
    }

    #[test]
    fn unknown_targets_are_errors() {
        let fx = fixture();
        assert!(matches!(
            fx.engine.preload_playlist("nope"),
            Err(EngineError::UnknownPlaylist(_))
        ));
        assert!(matches!(
            fx.engine.preload_sound("nope"),
            Err(EngineError::UnknownSound(_))
        ));
        assert_eq!(fx.engine.preload_sound("brass").unwrap().layers, 2);
    }
}
