use std::time::Duration;

use super::{AdaptiveEngine, EngineTuning};

impl AdaptiveEngine {
    pub fn tuning(&self) -> EngineTuning {
        *self.tuning.lock()
    }

    pub fn set_tuning(&self, tuning: EngineTuning) {
        *self.tuning.lock() = tuning;
    }

    /// Takes effect from the next monitor tick.
    pub fn set_drift_interval(&self, interval: Duration) {
        self.tuning.lock().drift_interval = interval.max(Duration::from_millis(1));
    }

    pub fn set_drift_threshold(&self, seconds: f64) {
        self.tuning.lock().drift_threshold = seconds.max(0.0);
    }

    pub fn set_end_window(&self, seconds: f64) {
        self.tuning.lock().end_window = seconds.max(0.0);
    }

    pub fn set_fade_tick(&self, tick: Duration) {
        self.tuning.lock().fade_tick = tick.max(Duration::from_millis(1));
    }

    pub fn set_load_timeout(&self, timeout: Duration) {
        self.tuning.lock().load_timeout = timeout;
    }

    pub fn set_combat_fade(&self, duration: Duration) {
        self.tuning.lock().combat_fade = duration;
    }

    pub fn set_combat_intensity(&self, value: f32) {
        self.settings.lock().combat_intensity = crate::mix::clamp_unit(value);
    }

    pub fn set_auto_combat_intensity(&self, enabled: bool) {
        self.settings.lock().auto_combat_intensity = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::fixture;
    use std::time::Duration;

    #[test]
    fn tuning_setters_reject_degenerate_values() {
        let fx = fixture();
        fx.engine.set_drift_interval(Duration::ZERO);
        fx.engine.set_drift_threshold(-1.0);
        fx.engine.set_fade_tick(Duration::ZERO);
        let tuning = fx.engine.tuning();
        assert_eq!(tuning.drift_interval, Duration::from_millis(1));
        assert_eq!(tuning.drift_threshold, 0.0);
        assert_eq!(tuning.fade_tick, Duration::from_millis(1));
    }

    #[test]
    fn combat_intensity_is_clamped() {
        let fx = fixture();
        fx.engine.set_combat_intensity(2.0);
        assert_eq!(fx.engine.settings().combat_intensity, 1.0);
    }
}
