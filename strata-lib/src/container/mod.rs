//! Typed configuration records: playlists, sounds, persisted settings and
//! session files.

pub mod detect;
pub mod info;
pub mod library;
pub mod session;
pub mod settings;

pub use detect::detect_layers;
pub use library::{LayerPaths, Library, PlaybackMode, PlaylistConfig, SoundConfig};
pub use session::Session;
pub use settings::{EngineSettings, SettingChange};
