//! Periodic engine state reporter for UI updates.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

use parking_lot::Mutex;

use crate::playback::engine::{AdaptiveEngine, EngineSnapshot};

type ReportFn = dyn Fn(EngineSnapshot) + Send;

/// Background reporter that polls [`AdaptiveEngine::get_state`] at fixed
/// intervals and calls back only when the snapshot changed.
#[derive(Clone)]
pub struct Reporter {
    engine: AdaptiveEngine,
    report: Arc<Mutex<ReportFn>>,
    interval: Duration,
    finish: Arc<AtomicBool>,
    thread_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Reporter {
    pub fn new(
        engine: AdaptiveEngine,
        report: impl Fn(EngineSnapshot) + Send + 'static,
        interval: Duration,
    ) -> Self {
        Self {
            engine,
            report: Arc::new(Mutex::new(report)),
            interval,
            finish: Arc::new(AtomicBool::new(false)),
            thread_handle: Arc::new(Mutex::new(None)),
        }
    }

    fn run(&self) {
        let mut last_report: Option<EngineSnapshot> = None;

        loop {
            let report = self.engine.get_state();
            if last_report.as_ref() != Some(&report) {
                (*self.report.lock())(report.clone());
                last_report = Some(report);
            }

            if self.finish.load(Ordering::Relaxed) {
                break;
            }

            std::thread::sleep(self.interval);
        }
    }

    /// Start the background reporting thread.
    pub fn start(&self) {
        self.stop();
        self.finish.store(false, Ordering::Relaxed);
        let this = self.clone();
        let handle = std::thread::spawn(move || this.run());
        *self.thread_handle.lock() = Some(handle);
    }

    /// Stop the background reporting thread.
    pub fn stop(&self) {
        self.finish.store(true, Ordering::Relaxed);
        let handle = self.thread_handle.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == std::thread::current().id() {
                log::warn!("reporter stop called from reporter thread; skipping join");
            } else if handle.join().is_err() {
                log::warn!("reporter thread panicked during join");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::settings::EngineSettings;
    use crate::host::LocalHost;
    use crate::test_data::MockLoader;

    #[test]
    fn reports_only_changed_snapshots() {
        let engine = AdaptiveEngine::new(
            EngineSettings::default(),
            Arc::new(MockLoader::new()),
            Arc::new(LocalHost),
        );
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = Reporter::new(
            engine.clone(),
            move |snapshot| sink.lock().push(snapshot.intensity),
            Duration::from_millis(5),
        );

        reporter.start();
        std::thread::sleep(Duration::from_millis(40));
        engine.set_global_intensity(0.9, false);
        std::thread::sleep(Duration::from_millis(40));
        reporter.stop();

        assert_eq!(*seen.lock(), vec![0.5, 0.9]);
    }
}
