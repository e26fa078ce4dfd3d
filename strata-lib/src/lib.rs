//! # Strata Adaptive Playback Library
//!
//! Multi-layer playback engine for adaptive music. A sound is stored as up to
//! three synchronized layers (Low / Mid / High intensity) whose volumes are
//! continuously mixed from a single global intensity value.
//!
//! The engine owns playback lifecycle, exclusivity within playlists,
//! periodic drift correction between layers, eased intensity fades and the
//! combat intensity policy. Everything host-specific (persistence, UI,
//! decoding) sits behind the [`host::HostBridge`] and
//! [`playback::layer::LayerLoader`] traits.

pub mod container;
pub mod diagnostics;
pub mod error;
pub mod host;
pub mod mix;
pub mod playback;
pub mod test_data;

pub use error::{EngineError, EngineResult, LayerError};
pub use mix::{calculate_mix, LayerKind, MixLevels, MixState};
pub use playback::engine::AdaptiveEngine;
