//! Diagnostics helpers for UI consumers.

pub mod reporter;

pub use reporter::Reporter;
