//! Eased intensity fades.

use std::time::Duration;

/// Quadratic ease-in-out over `progress` in `[0, 1]`.
pub fn ease_in_out(progress: f32) -> f32 {
    let p = progress.clamp(0.0, 1.0);
    if p < 0.5 {
        2.0 * p * p
    } else {
        1.0 - 2.0 * (1.0 - p) * (1.0 - p)
    }
}

/// A fade of the global intensity from `start` to `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fade {
    pub start: f32,
    pub target: f32,
    pub duration: Duration,
}

impl Fade {
    pub fn new(start: f32, target: f32, duration: Duration) -> Self {
        Self {
            start,
            target,
            duration,
        }
    }

    /// Linear progress after `elapsed`, clamped to `[0, 1]`.
    pub fn progress(&self, elapsed: Duration) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0) as f32
    }

    /// Intensity after `elapsed`.
    pub fn value_at(&self, elapsed: Duration) -> f32 {
        let progress = self.progress(elapsed);
        if progress >= 1.0 {
            return self.target;
        }
        self.start + (self.target - self.start) * ease_in_out(progress)
    }

    pub fn is_complete(&self, elapsed: Duration) -> bool {
        self.progress(elapsed) >= 1.0
    }
}
