use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use super::AdaptiveEngine;
use crate::container::settings::SettingChange;
use crate::mix::clamp_unit;
use crate::playback::events::EngineEvent;
use crate::playback::fade::Fade;

impl AdaptiveEngine {
    /// Ease the global intensity to `target` over `duration`.
    ///
    /// Replaces any fade already running. Steps land on the fade tick and
    /// are neither persisted nor counted as manual changes; the final value
    /// is persisted once. With `update_display`, an
    /// [`EngineEvent::IntensityDisplay`] is emitted on completion.
    pub fn fade_to(&self, target: f32, duration: Duration, update_display: bool) {
        let target = clamp_unit(target);
        let (generation, fade) = {
            let mut core = self.mix.lock();
            let generation = core.cancel_fade();
            let fade = Fade::new(core.state.intensity, target, duration);
            core.active_fade = Some(fade);
            (generation, fade)
        };
        debug!(
            "fading intensity {:.2} -> {:.2} over {}ms",
            fade.start,
            fade.target,
            duration.as_millis()
        );

        if duration.is_zero() {
            if self.apply_fade_step(generation, target) {
                self.finish_fade(generation, target, update_display);
            }
            return;
        }

        let tick = self.tuning.lock().fade_tick;
        let engine = self.clone();
        thread::spawn(move || {
            let began = Instant::now();
            loop {
                thread::sleep(tick);
                let elapsed = began.elapsed();
                if !engine.apply_fade_step(generation, fade.value_at(elapsed)) {
                    debug!("fade {} cancelled", generation);
                    return;
                }
                if fade.is_complete(elapsed) {
                    engine.finish_fade(generation, fade.target, update_display);
                    return;
                }
            }
        });
    }

    /// Cancel a running fade, leaving intensity where it is.
    pub fn cancel_fade(&self) {
        self.mix.lock().cancel_fade();
    }

    /// Write one fade step. Returns `false` once the fade was superseded.
    fn apply_fade_step(&self, generation: u64, value: f32) -> bool {
        let applied = self
            .update_mix(|core| {
                if core.fade_generation != generation {
                    return false;
                }
                core.state.intensity = value;
                true
            })
            .is_some();
        if applied {
            self.events.emit(EngineEvent::IntensityChanged {
                value,
                from_sync: true,
            });
        }
        applied
    }

    fn finish_fade(&self, generation: u64, target: f32, update_display: bool) {
        {
            let mut core = self.mix.lock();
            if core.fade_generation != generation {
                return;
            }
            core.active_fade = None;
        }
        self.record_setting(SettingChange::Intensity(target), false);
        if update_display {
            self.events.emit(EngineEvent::IntensityDisplay { value: target });
        }
    }
}
