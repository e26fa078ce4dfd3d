//! Audio output through `rodio`.

mod output;

pub use output::{open_default_output, RodioLayer, RodioLoader};
