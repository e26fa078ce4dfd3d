use std::{
    io,
    sync::Arc,
    thread::sleep,
    time::Duration,
};

use clap::ArgMatches;
use crossterm::{
    cursor, execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{error, info, warn};
use parking_lot::Mutex;
use ratatui::{backend::CrosstermBackend, Terminal};
use strata_lib::container::Session;
use strata_lib::diagnostics::Reporter;
use strata_lib::error::EngineResult;
use strata_lib::playback::backend::open_default_output;
use strata_lib::playback::engine::EngineSnapshot;
use strata_lib::AdaptiveEngine;

use crate::controls::{self, ControlState, SoundEntry};
use crate::host::SessionHost;
use crate::logging::{self, LogBuffer};
use crate::{cli, ui};

pub fn run(args: &ArgMatches, log_buffer: LogBuffer) -> EngineResult<i32> {
    match args.subcommand() {
        Some(("mix", sub)) => return cli::commands::run_mix(sub),
        Some(("detect", sub)) => return cli::commands::run_detect(sub),
        Some(("inspect", sub)) => {
            let path = sub.get_one::<String>("INPUT").map(String::as_str).unwrap_or_default();
            return cli::inspect::run_inspect(path);
        }
        Some(("create", sub)) => {
            if let Some(("session-json", _)) = sub.subcommand() {
                return cli::commands::run_create_session();
            }
            error!("unknown create target");
            return Ok(-1);
        }
        _ => {}
    }

    let Some(file_path) = args.get_one::<String>("INPUT").cloned() else {
        error!("no session file given");
        return Ok(-1);
    };
    let quiet = args.get_flag("quiet");
    let start_intensity = match args.get_one::<String>("intensity") {
        Some(raw) => match raw.parse::<f32>() {
            Ok(value) => Some(value),
            Err(_) => {
                error!("invalid intensity: {}", raw);
                return Ok(-1);
            }
        },
        None => None,
    };

    info!("Starting Strata with {}", file_path);
    let session = Session::from_path(&file_path)?;
    let sounds = playable_sounds(&session);

    let (_stream, loader) = match open_default_output() {
        Ok(output) => output,
        Err(err) => {
            error!("failed to open audio output: {}", err);
            return Ok(-1);
        }
    };
    let host = Arc::new(SessionHost::new(&file_path, session.clone()));
    let engine = AdaptiveEngine::with_library(
        session.settings.clone(),
        session.playlists.clone(),
        Arc::new(loader),
        host.clone(),
    );

    if let Some(value) = start_intensity {
        engine.set_global_intensity(value, false);
    }
    if args.get_flag("preload") {
        let report = engine.preload_all();
        if !report.is_clean() {
            warn!("{} layers failed to preload", report.failures.len());
        }
    }
    if let Some(sound_id) = args.get_one::<String>("play") {
        if let Err(err) = engine.play_sound(sound_id) {
            error!("failed to play {}: {}", sound_id, err);
        }
    }

    let latest: Arc<Mutex<EngineSnapshot>> = Arc::new(Mutex::new(engine.get_state()));
    let sink = latest.clone();
    let reporter = Reporter::new(
        engine.clone(),
        move |snapshot| *sink.lock() = snapshot,
        Duration::from_millis(100),
    );
    reporter.start();

    if quiet {
        while !engine.get_state().playing.is_empty() {
            sleep(Duration::from_millis(250));
        }
    } else {
        run_tui(&engine, &host, &latest, sounds, &log_buffer, &file_path);
    }

    engine.stop_all();
    reporter.stop();
    Ok(0)
}

fn run_tui(
    engine: &AdaptiveEngine,
    host: &SessionHost,
    latest: &Mutex<EngineSnapshot>,
    sounds: Vec<SoundEntry>,
    log_buffer: &LogBuffer,
    title: &str,
) {
    let _raw_mode = RawModeGuard::enable().ok();
    let _stderr = logging::capture_stderr(log_buffer.clone());
    let mut stdout = io::stdout();
    let _ = execute!(stdout, EnterAlternateScreen, cursor::Hide);
    let mut terminal = match Terminal::new(CrosstermBackend::new(stdout)) {
        Ok(terminal) => terminal,
        Err(err) => {
            error!("failed to open terminal: {}", err);
            return;
        }
    };

    let mut state = ControlState::new(sounds);
    loop {
        let snapshot = latest.lock().clone();
        let notice = host.last_notice();
        let status = controls::status_text(&snapshot, &state.sounds, notice.as_ref());
        let log_lines = log_buffer.lines();
        ui::draw_status(&mut terminal, title, &status, &log_lines);

        if !controls::handle_key_event(engine, &mut state) {
            break;
        }

        sleep(Duration::from_millis(50));
    }

    // Restore the terminal state before exiting.
    let _ = terminal.show_cursor();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show);
}

/// Adaptive sounds of adaptive playlists, in library order.
fn playable_sounds(session: &Session) -> Vec<SoundEntry> {
    session
        .playlists
        .iter()
        .filter(|playlist| playlist.is_adaptive)
        .flat_map(|playlist| playlist.sounds.iter())
        .filter(|sound| sound.has_alternate_layers())
        .map(|sound| SoundEntry {
            id: sound.id.clone(),
            name: if sound.name.is_empty() {
                sound.id.clone()
            } else {
                sound.name.clone()
            },
        })
        .collect()
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
