use log::warn;
use serde::{Deserialize, Serialize};

use crate::container::detect::detect_layers;
use crate::mix::{LayerKind, LayerSlots};

/// How a playlist plays its sounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    #[default]
    Sequential,
    Shuffle,
    Simultaneous,
    Disabled,
}

impl PlaybackMode {
    /// Whether only one sound of the playlist may play at a time.
    pub fn is_exclusive(&self) -> bool {
        !matches!(self, PlaybackMode::Simultaneous)
    }
}

/// Source paths for each layer of a sound. High is the sound's base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerPaths {
    pub high: String,
    pub mid: Option<String>,
    pub low: Option<String>,
}

impl LayerPaths {
    pub fn new(high: impl Into<String>, mid: Option<String>, low: Option<String>) -> Self {
        Self {
            high: high.into(),
            mid: non_empty(mid),
            low: non_empty(low),
        }
    }

    /// True when at least one alternate (Mid or Low) path is configured.
    pub fn is_adaptive(&self) -> bool {
        self.mid.is_some() || self.low.is_some()
    }

    /// Present paths keyed by layer.
    pub fn slots(&self) -> LayerSlots<String> {
        let mut slots = LayerSlots::default();
        if !self.high.trim().is_empty() {
            slots.set(LayerKind::High, self.high.clone());
        }
        if let Some(mid) = &self.mid {
            slots.set(LayerKind::Mid, mid.clone());
        }
        if let Some(low) = &self.low {
            slots.set(LayerKind::Low, low.clone());
        }
        slots
    }
}

fn non_empty(path: Option<String>) -> Option<String> {
    path.filter(|path| !path.trim().is_empty())
}

fn default_volume() -> f32 {
    0.5
}

/// One logical sound inside a playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub mid_intensity_path: Option<String>,
    #[serde(default)]
    pub low_intensity_path: Option<String>,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub repeat: bool,
    #[serde(default)]
    pub playing: bool,
}

impl SoundConfig {
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            path: path.into(),
            mid_intensity_path: None,
            low_intensity_path: None,
            volume: default_volume(),
            repeat: false,
            playing: false,
        }
    }

    pub fn with_layers(mut self, mid: Option<&str>, low: Option<&str>) -> Self {
        self.mid_intensity_path = mid.map(str::to_string);
        self.low_intensity_path = low.map(str::to_string);
        self
    }

    pub fn layer_paths(&self) -> LayerPaths {
        LayerPaths::new(
            self.path.clone(),
            self.mid_intensity_path.clone(),
            self.low_intensity_path.clone(),
        )
    }

    /// Every configured layer file, Low first.
    pub fn layer_files(&self) -> Vec<String> {
        self.layer_paths()
            .slots()
            .iter()
            .map(|(_, path)| path.clone())
            .collect()
    }

    pub fn has_alternate_layers(&self) -> bool {
        self.layer_paths().is_adaptive()
    }

    /// Fill empty Mid/Low paths from sibling `Intensity N` files.
    ///
    /// Returns `true` when at least one path was filled in.
    pub fn auto_detect_layers(&mut self, exists: impl Fn(&str) -> bool) -> bool {
        let Some(detected) = detect_layers(&self.path, exists) else {
            return false;
        };

        let mut filled = false;
        if self.mid_intensity_path.as_deref().map_or(true, str::is_empty) {
            if let Some(mid) = detected.mid {
                self.mid_intensity_path = Some(mid);
                filled = true;
            }
        }
        if self.low_intensity_path.as_deref().map_or(true, str::is_empty) {
            if let Some(low) = detected.low {
                self.low_intensity_path = Some(low);
                filled = true;
            }
        }
        if filled && detected.high != self.path {
            self.path = detected.high;
        }
        filled
    }
}

/// A collection of sounds with a shared playback mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mode: PlaybackMode,
    #[serde(default)]
    pub is_adaptive: bool,
    #[serde(default)]
    pub sounds: Vec<SoundConfig>,
}

impl PlaylistConfig {
    pub fn new(id: impl Into<String>, mode: PlaybackMode, is_adaptive: bool) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            mode,
            is_adaptive,
            sounds: Vec::new(),
        }
    }

    pub fn with_sound(mut self, sound: SoundConfig) -> Self {
        self.sounds.push(sound);
        self
    }

    pub fn sound(&self, sound_id: &str) -> Option<&SoundConfig> {
        self.sounds.iter().find(|sound| sound.id == sound_id)
    }
}

/// Every playlist the engine knows about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Library {
    playlists: Vec<PlaylistConfig>,
}

impl Library {
    pub fn new(playlists: Vec<PlaylistConfig>) -> Self {
        Self { playlists }
    }

    pub fn playlists(&self) -> &[PlaylistConfig] {
        &self.playlists
    }

    pub fn playlist(&self, playlist_id: &str) -> Option<&PlaylistConfig> {
        self.playlists.iter().find(|playlist| playlist.id == playlist_id)
    }

    /// Find a sound along with the playlist that owns it.
    pub fn find_sound(&self, sound_id: &str) -> Option<(&PlaylistConfig, &SoundConfig)> {
        self.playlists.iter().find_map(|playlist| {
            playlist
                .sound(sound_id)
                .map(|sound| (playlist, sound))
        })
    }

    pub fn upsert_playlist(&mut self, playlist: PlaylistConfig) {
        match self.playlists.iter_mut().find(|p| p.id == playlist.id) {
            Some(existing) => *existing = playlist,
            None => self.playlists.push(playlist),
        }
    }

    pub fn remove_playlist(&mut self, playlist_id: &str) -> Option<PlaylistConfig> {
        let index = self.playlists.iter().position(|p| p.id == playlist_id)?;
        Some(self.playlists.remove(index))
    }

    /// Insert or replace a sound inside an existing playlist.
    pub fn upsert_sound(&mut self, playlist_id: &str, sound: SoundConfig) -> bool {
        let Some(playlist) = self.playlists.iter_mut().find(|p| p.id == playlist_id) else {
            warn!("cannot store sound {} in unknown playlist {}", sound.id, playlist_id);
            return false;
        };
        match playlist.sounds.iter_mut().find(|s| s.id == sound.id) {
            Some(existing) => *existing = sound,
            None => playlist.sounds.push(sound),
        }
        true
    }

    pub fn remove_sound(&mut self, sound_id: &str) -> Option<SoundConfig> {
        self.playlists.iter_mut().find_map(|playlist| {
            let index = playlist.sounds.iter().position(|s| s.id == sound_id)?;
            Some(playlist.sounds.remove(index))
        })
    }

    /// Mutable access to a sound, used when auto-detecting layers.
    pub fn sound_mut(&mut self, sound_id: &str) -> Option<&mut SoundConfig> {
        self.playlists
            .iter_mut()
            .find_map(|playlist| playlist.sounds.iter_mut().find(|s| s.id == sound_id))
    }

    /// Sound ids of every adaptive sound in adaptive playlists.
    pub fn adaptive_sound_ids(&self) -> Vec<String> {
        self.playlists
            .iter()
            .filter(|playlist| playlist.is_adaptive)
            .flat_map(|playlist| playlist.sounds.iter())
            .filter(|sound| sound.has_alternate_layers())
            .map(|sound| sound.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> Library {
        Library::new(vec![
            PlaylistConfig::new("battle", PlaybackMode::Sequential, true)
                .with_sound(SoundConfig::new("drums", "drums_high.ogg").with_layers(
                    Some("drums_mid.ogg"),
                    Some(""),
                ))
                .with_sound(SoundConfig::new("plain", "plain.ogg")),
            PlaylistConfig::new("ambience", PlaybackMode::Simultaneous, false)
                .with_sound(SoundConfig::new("rain", "rain.ogg").with_layers(Some("rain_mid.ogg"), None)),
        ])
    }

    #[test]
    fn empty_paths_are_treated_as_missing() {
        let library = library();
        let (_, sound) = library.find_sound("drums").unwrap();
        let paths = sound.layer_paths();
        assert_eq!(paths.low, None);
        assert_eq!(paths.slots().kinds(), vec![LayerKind::Mid, LayerKind::High]);
    }

    #[test]
    fn adaptive_ids_require_adaptive_playlist_and_alternates() {
        assert_eq!(library().adaptive_sound_ids(), vec!["drums".to_string()]);
    }

    #[test]
    fn upsert_and_remove_sounds() {
        let mut library = library();
        assert!(library.upsert_sound("battle", SoundConfig::new("horns", "horns.ogg")));
        assert!(!library.upsert_sound("missing", SoundConfig::new("x", "x.ogg")));
        assert_eq!(library.playlist("battle").unwrap().sounds.len(), 3);
        assert!(library.remove_sound("plain").is_some());
        assert!(library.find_sound("plain").is_none());
        assert!(library.remove_playlist("ambience").is_some());
        assert!(library.find_sound("rain").is_none());
    }

    #[test]
    fn sound_config_deserializes_with_defaults() {
        let sound: SoundConfig =
            serde_json::from_str(r#"{"id":"a","path":"a.ogg","low_intensity_path":"a1.ogg"}"#)
                .unwrap();
        assert_eq!(sound.volume, 0.5);
        assert!(!sound.repeat);
        assert!(sound.has_alternate_layers());
    }

    #[test]
    fn only_simultaneous_playlists_are_non_exclusive() {
        assert!(PlaybackMode::Sequential.is_exclusive());
        assert!(PlaybackMode::Shuffle.is_exclusive());
        assert!(!PlaybackMode::Simultaneous.is_exclusive());
    }
}
