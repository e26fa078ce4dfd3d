//! Periodic realignment of secondary layers and end-of-track detection.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;

use log::{debug, error, warn};

use super::AdaptiveEngine;
use crate::playback::events::{EngineEvent, StopReason};
use crate::playback::track_set::{DriftCorrection, DriftOutcome};

/// Handle to the running monitor thread. Dropping it stops the thread.
pub(super) struct DriftMonitor {
    _stop: Sender<()>,
}

/// What one monitor tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriftTick {
    pub corrections: Vec<(String, DriftCorrection)>,
    /// Non-looping sounds that reached their end and were stopped.
    pub finished: Vec<String>,
    /// Sounds whose check failed; they stay registered.
    pub failed: Vec<String>,
}

impl AdaptiveEngine {
    /// Run one drift check over every active track set.
    ///
    /// A failing set is logged and skipped; the remaining sets are still
    /// checked.
    pub fn check_drift(&self) -> DriftTick {
        let tuning = *self.tuning.lock();
        let mut tick = DriftTick::default();
        {
            let core = self.mix.lock();
            let mut tracks = self.tracks.lock();
            for (sound_id, set) in tracks.iter_mut() {
                let checked = panic::catch_unwind(AssertUnwindSafe(|| {
                    set.check_drift(&core.state, tuning.drift_threshold, tuning.end_window)
                }));
                match checked {
                    Ok(Ok(DriftOutcome::Idle)) => {}
                    Ok(Ok(DriftOutcome::Finished)) => tick.finished.push(sound_id.clone()),
                    Ok(Ok(DriftOutcome::Checked(corrections))) => {
                        for correction in corrections {
                            warn!(
                                "{}: {} layer drifted {:.3}s; resynced",
                                sound_id, correction.layer, correction.drift
                            );
                            tick.corrections.push((sound_id.clone(), correction));
                        }
                    }
                    Ok(Err(err)) => {
                        warn!("drift check for {} failed: {}", sound_id, err);
                        tick.failed.push(sound_id.clone());
                    }
                    Err(_) => {
                        error!("drift check for {} panicked", sound_id);
                        tick.failed.push(sound_id.clone());
                    }
                }
            }
        }

        for sound_id in &tick.finished {
            self.stop_with_reason(sound_id, StopReason::Finished, false);
        }
        for (sound_id, correction) in &tick.corrections {
            self.events.emit(EngineEvent::DriftCorrected {
                sound_id: sound_id.clone(),
                layer: correction.layer,
                drift: correction.drift,
            });
        }
        tick
    }

    /// Start the monitor unless it is running or nothing is playing.
    pub(super) fn ensure_drift_monitor(&self) {
        let mut slot = self.drift_monitor.lock();
        if slot.is_some() || self.tracks.lock().is_empty() {
            return;
        }

        let (stop, stopped) = mpsc::channel::<()>();
        let engine = self.clone();
        thread::spawn(move || loop {
            let interval = engine.tuning.lock().drift_interval;
            match stopped.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    engine.check_drift();
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    debug!("drift monitor exited");
                    return;
                }
            }
        });
        *slot = Some(DriftMonitor { _stop: stop });
        debug!("drift monitor started");
    }

    /// Stop the monitor once no track set remains.
    pub(super) fn halt_drift_monitor_if_idle(&self) {
        let mut slot = self.drift_monitor.lock();
        if !self.tracks.lock().is_empty() {
            return;
        }
        if slot.take().is_some() {
            debug!("drift monitor halted");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use approx::assert_abs_diff_eq;
    use parking_lot::Mutex;

    use crate::container::library::{LayerPaths, PlaybackMode};
    use crate::container::settings::EngineSettings;
    use crate::mix::LayerKind;
    use crate::playback::engine::test_support::{fixture, fixture_with};
    use crate::playback::engine::StartRequest;
    use crate::playback::events::{EngineEvent, StopReason};
    use crate::test_data::{MockLoader, RecordingHost};

    #[test]
    fn secondary_drift_is_corrected_without_touching_primary() {
        let fx = fixture();
        fx.engine.play_sound("drums").unwrap();
        let low = fx.loader.handle("drums_low.ogg").unwrap();
        let mid = fx.loader.handle("drums_mid.ogg").unwrap();
        let high = fx.loader.handle("drums_high.ogg").unwrap();
        low.set_time(10.0);
        mid.set_time(10.15);
        high.set_time(10.02);

        let tick = fx.engine.check_drift();
        assert_eq!(tick.corrections.len(), 1);
        assert_eq!(tick.corrections[0].0, "drums");
        assert_eq!(tick.corrections[0].1.layer, LayerKind::Mid);

        assert_abs_diff_eq!(mid.time(), low.time());
        assert_eq!(low.play_count(), 1);
        assert_eq!(low.stop_count(), 0);
        assert_eq!(high.play_count(), 1);
        assert_eq!(mid.play_count(), 2);
        let expected = fx.engine.effective_volumes("drums").unwrap();
        assert_abs_diff_eq!(mid.volume(), expected.mid);
        fx.engine.stop_all();
    }

    #[test]
    fn finished_sound_is_stopped_and_monitor_halts() {
        let fx = fixture_with(
            MockLoader::new().with_duration(30.0),
            RecordingHost::authoritative(),
            EngineSettings::default(),
        );
        let reasons = Arc::new(Mutex::new(Vec::new()));
        let sink = reasons.clone();
        fx.engine.subscribe(move |event| {
            if let EngineEvent::TrackStopped { reason, .. } = event {
                sink.lock().push(*reason);
            }
        });

        fx.engine.play_sound("drums").unwrap();
        fx.loader.handle("drums_low.ogg").unwrap().set_time(29.9);
        let tick = fx.engine.check_drift();

        assert_eq!(tick.finished, vec!["drums".to_string()]);
        assert!(!fx.engine.is_playing("drums"));
        assert!(!fx.engine.get_state().drift_monitor_running);
        assert_eq!(fx.host.stopped(), vec!["drums".to_string()]);
        assert_eq!(*reasons.lock(), vec![StopReason::Finished]);
    }

    #[test]
    fn sound_ending_between_ticks_is_stopped() {
        let fx = fixture_with(
            MockLoader::new().with_duration(30.0),
            RecordingHost::authoritative(),
            EngineSettings::default(),
        );
        fx.engine.play_sound("drums").unwrap();
        let low = fx.loader.handle("drums_low.ogg").unwrap();
        low.set_time(29.5);
        assert!(fx.engine.check_drift().finished.is_empty());

        low.set_time(30.0);
        low.force_stopped();
        let tick = fx.engine.check_drift();

        assert_eq!(tick.finished, vec!["drums".to_string()]);
        assert!(!fx.engine.is_playing("drums"));
        assert!(!fx.engine.get_state().drift_monitor_running);
        assert_eq!(fx.host.stopped(), vec!["drums".to_string()]);
    }

    #[test]
    fn failing_set_does_not_stop_other_checks() {
        let fx = fixture();
        fx.engine.play_sound("rain").unwrap();
        fx.engine.play_sound("wind").unwrap();

        let rain_high = fx.loader.handle("rain_high.ogg").unwrap();
        fx.loader.handle("rain_low.ogg").unwrap().set_time(5.0);
        rain_high.set_time(6.0);
        rain_high.fail_next_play();
        fx.loader.handle("wind_mid.ogg").unwrap().set_time(3.0);
        fx.loader.handle("wind_high.ogg").unwrap().set_time(3.5);

        let tick = fx.engine.check_drift();
        assert_eq!(tick.failed, vec!["rain".to_string()]);
        assert_eq!(tick.corrections.len(), 1);
        assert_eq!(tick.corrections[0].0, "wind");
        assert!(fx.engine.is_playing("rain"));
        fx.engine.stop_all();
    }

    #[test]
    fn monitor_thread_corrects_on_its_own() {
        let fx = fixture();
        fx.engine.set_drift_interval(Duration::from_millis(20));
        let request = StartRequest::new(
            "wind",
            "ambience",
            LayerPaths::new("wind_high.ogg", Some("wind_mid.ogg".into()), None),
        )
        .looping(true)
        .mode(PlaybackMode::Simultaneous);
        fx.engine.start(request).unwrap();
        fx.loader.handle("wind_mid.ogg").unwrap().set_time(40.0);
        let high = fx.loader.handle("wind_high.ogg").unwrap();
        high.set_time(41.0);

        for _ in 0..100 {
            if high.play_count() > 1 && (high.time() - 40.0).abs() < 1e-9 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_abs_diff_eq!(high.time(), 40.0);
        fx.engine.stop_all();
        assert!(!fx.engine.get_state().drift_monitor_running);
    }
}
