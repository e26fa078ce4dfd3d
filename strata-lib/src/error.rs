//! Error types shared across the engine.

use thiserror::Error;

use crate::mix::LayerKind;

/// Failure reported by a single sound layer or its loader.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("failed to open layer {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode layer {path}: {reason}")]
    Decode { path: String, reason: String },
    #[error("playback error: {0}")]
    Playback(String),
    #[error("layer handle is no longer valid")]
    Stale,
}

/// Errors surfaced by [`crate::AdaptiveEngine`] operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to load {layer} layer for sound {sound_id}: {source}")]
    Load {
        sound_id: String,
        layer: LayerKind,
        #[source]
        source: LayerError,
    },
    #[error("layer load for sound {sound_id} did not finish within {timeout_ms}ms")]
    LoadTimeout { sound_id: String, timeout_ms: u128 },
    #[error("layer loader for sound {0} exited without a result")]
    LoaderExited(String),
    #[error("failed to start playback of sound {sound_id}: {source}")]
    Start {
        sound_id: String,
        #[source]
        source: LayerError,
    },
    #[error("unknown sound: {0}")]
    UnknownSound(String),
    #[error("unknown playlist: {0}")]
    UnknownPlaylist(String),
    #[error("session io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
