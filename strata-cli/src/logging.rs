//! Log capture for the terminal UI.
//!
//! Records land in a bounded ring that the Logs pane tails. Engine crates
//! follow `RUST_LOG`; decoder and audio backend crates are capped at warn so
//! their chatter does not bury engine messages.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};

use log::{debug, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;

const LOG_CAPACITY: usize = 500;
const OWN_CRATES: [&str; 2] = ["strata", "strata_lib"];
const FOREIGN_CEILING: LevelFilter = LevelFilter::Warn;

/// Shared ring of formatted log lines, oldest first.
#[derive(Clone, Default)]
pub struct LogBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl LogBuffer {
    pub fn push(&self, line: String) {
        let mut lines = self.lines.lock();
        if lines.len() >= LOG_CAPACITY {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LevelPolicy {
    own: LevelFilter,
    foreign: LevelFilter,
}

impl LevelPolicy {
    fn from_env(value: Option<&str>) -> Self {
        let own = value
            .and_then(|value| LevelFilter::from_str(value.trim()).ok())
            .unwrap_or(LevelFilter::Info);
        Self {
            own,
            foreign: own.min(FOREIGN_CEILING),
        }
    }

    fn allows(&self, metadata: &Metadata) -> bool {
        let limit = if is_own_target(metadata.target()) {
            self.own
        } else {
            self.foreign
        };
        metadata.level() <= limit
    }
}

fn is_own_target(target: &str) -> bool {
    let root = target.split("::").next().unwrap_or(target);
    OWN_CRATES.contains(&root)
}

/// `[WARN] drift: message`, keeping only the last module segment.
fn format_record(record: &Record) -> String {
    let target = record.target();
    let module = target.rsplit("::").next().unwrap_or(target);
    format!("[{}] {}: {}", record.level(), module, record.args())
}

struct RingLogger {
    policy: LevelPolicy,
    buffer: LogBuffer,
    echo_stderr: bool,
}

impl Log for RingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.policy.allows(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format_record(record);
        if self.echo_stderr {
            eprintln!("{}", line);
        }
        self.buffer.push(line);
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<RingLogger> = OnceLock::new();

/// Install the ring logger once and return its buffer.
///
/// `STRATA_LOG_STDERR=1` also echoes each line to stderr, which is useful
/// with `--quiet`.
pub fn init() -> LogBuffer {
    let logger = LOGGER.get_or_init(|| RingLogger {
        policy: LevelPolicy::from_env(std::env::var("RUST_LOG").ok().as_deref()),
        buffer: LogBuffer::default(),
        echo_stderr: std::env::var("STRATA_LOG_STDERR")
            .map(|value| value != "0")
            .unwrap_or(false),
    });
    if log::set_logger(logger).is_ok() {
        log::set_max_level(logger.policy.own);
    }
    logger.buffer.clone()
}

/// Routes raw stderr (ALSA and decoder warnings) into the log buffer until
/// dropped.
pub struct StderrCaptureGuard {
    original_fd: RawFd,
    stderr_fd: RawFd,
    reader: Option<JoinHandle<()>>,
}

impl StderrCaptureGuard {
    fn install(buffer: LogBuffer) -> io::Result<Self> {
        let stderr_fd = io::stderr().as_raw_fd();
        let (read_fd, write_fd) = open_pipe()?;
        let pipe_reader = unsafe { File::from_raw_fd(read_fd) };

        let original_fd = unsafe { libc::dup(stderr_fd) };
        if original_fd < 0 {
            let err = io::Error::last_os_error();
            close_fds(&[write_fd]);
            return Err(err);
        }
        if unsafe { libc::dup2(write_fd, stderr_fd) } < 0 {
            let err = io::Error::last_os_error();
            close_fds(&[write_fd, original_fd]);
            return Err(err);
        }
        // stderr now holds the only write end.
        close_fds(&[write_fd]);

        let spawned = thread::Builder::new()
            .name("strata-stderr".to_string())
            .spawn(move || forward_lines(pipe_reader, &buffer));
        match spawned {
            Ok(reader) => Ok(Self {
                original_fd,
                stderr_fd,
                reader: Some(reader),
            }),
            Err(err) => {
                restore_fd(original_fd, stderr_fd);
                Err(err)
            }
        }
    }
}

impl Drop for StderrCaptureGuard {
    fn drop(&mut self) {
        restore_fd(self.original_fd, self.stderr_fd);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

pub fn capture_stderr(buffer: LogBuffer) -> Option<StderrCaptureGuard> {
    match StderrCaptureGuard::install(buffer) {
        Ok(guard) => Some(guard),
        Err(err) => {
            debug!("stderr capture unavailable: {}", err);
            None
        }
    }
}

fn open_pipe() -> io::Result<(RawFd, RawFd)> {
    let mut fds = [0; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok((fds[0], fds[1]))
}

fn close_fds(fds: &[RawFd]) {
    for fd in fds {
        unsafe {
            libc::close(*fd);
        }
    }
}

/// Point `target` back at `original` and release the saved copy.
fn restore_fd(original: RawFd, target: RawFd) {
    unsafe {
        libc::dup2(original, target);
        libc::close(original);
    }
}

fn forward_lines(source: impl io::Read, buffer: &LogBuffer) {
    let mut reader = BufReader::new(source);
    let mut bytes = Vec::new();
    loop {
        bytes.clear();
        match reader.read_until(b'\n', &mut bytes) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = String::from_utf8_lossy(&bytes);
        let trimmed = line.trim_end();
        if !trimmed.is_empty() {
            buffer.push(format!("[STDERR] {}", trimmed));
        }
    }
}
