//! Playback: layer primitives, track sets, policies and the engine.

#[cfg(feature = "rodio-backend")]
pub mod backend;
pub mod combat;
pub mod engine;
pub mod events;
pub mod fade;
pub mod layer;
pub mod track_set;
