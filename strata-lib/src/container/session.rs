//! Session files: persisted settings plus the playlist library.

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::container::library::{Library, PlaylistConfig};
use crate::container::settings::EngineSettings;
use crate::error::EngineResult;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub settings: EngineSettings,
    #[serde(default)]
    pub playlists: Vec<PlaylistConfig>,
}

impl Session {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let mut session: Session = serde_json::from_str(json)?;
        session.settings = session.settings.sanitized();
        Ok(session)
    }

    pub fn from_path(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        debug!("reading session {}", path.display());
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn to_path(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn library(&self) -> Library {
        Library::new(self.playlists.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::library::{PlaybackMode, SoundConfig};

    #[test]
    fn session_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let session = Session {
            settings: EngineSettings {
                combat_intensity: 0.8,
                ..EngineSettings::default()
            },
            playlists: vec![PlaylistConfig::new("p", PlaybackMode::Shuffle, true)
                .with_sound(SoundConfig::new("s", "s.ogg").with_layers(Some("m.ogg"), None))],
        };
        session.to_path(&path).unwrap();
        assert_eq!(Session::from_path(&path).unwrap(), session);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(Session::from_json("{ nope").is_err());
    }

    #[test]
    fn mode_names_are_snake_case() {
        let session = Session::from_json(
            r#"{"playlists":[{"id":"p","mode":"simultaneous","is_adaptive":true}]}"#,
        )
        .unwrap();
        assert_eq!(session.playlists[0].mode, PlaybackMode::Simultaneous);
        assert!(session.library().playlist("p").is_some());
    }
}
