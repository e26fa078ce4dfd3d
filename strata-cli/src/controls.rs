use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use log::info;
use strata_lib::host::Notice;
use strata_lib::playback::engine::{EngineSnapshot, HostEvent};
use strata_lib::AdaptiveEngine;

const INTENSITY_STEP: f32 = 0.05;
const VOLUME_STEP: f32 = 0.05;
const FADE_DURATION: Duration = Duration::from_secs(3);
const COMBAT_ID: &str = "cli-encounter";

pub struct StatusSnapshot {
    pub text: String,
}

/// A sound bound to a number key.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundEntry {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Default)]
pub struct ControlState {
    pub sounds: Vec<SoundEntry>,
    pub combat_active: bool,
}

impl ControlState {
    pub fn new(sounds: Vec<SoundEntry>) -> Self {
        Self {
            sounds,
            combat_active: false,
        }
    }
}

pub fn intensity_bar(value: f32, width: usize) -> String {
    let filled = ((value.clamp(0.0, 1.0) * width as f32).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

pub fn status_text(
    snapshot: &EngineSnapshot,
    sounds: &[SoundEntry],
    notice: Option<&Notice>,
) -> StatusSnapshot {
    let mode = if snapshot.custom_mix_enabled {
        format!(
            "custom mix low {:.2} mid {:.2} high {:.2}",
            snapshot.custom_volumes.low, snapshot.custom_volumes.mid, snapshot.custom_volumes.high
        )
    } else {
        format!(
            "curve low {:.2} mid {:.2} high {:.2}",
            snapshot.curve.low, snapshot.curve.mid, snapshot.curve.high
        )
    };
    let mut flags = Vec::new();
    if snapshot.fading {
        flags.push("fading".to_string());
    }
    if snapshot.combat_encounters > 0 {
        flags.push(format!("combat x{}", snapshot.combat_encounters));
    }
    if snapshot.drift_monitor_running {
        flags.push("drift monitor".to_string());
    }

    let sound_line = sounds
        .iter()
        .take(9)
        .enumerate()
        .map(|(index, sound)| {
            let marker = if snapshot.playing.contains(&sound.id) { "▶" } else { " " };
            format!("{}{} {}", index + 1, marker, sound.name)
        })
        .collect::<Vec<_>>()
        .join("  ");

    let mut text = format!(
        "Intensity {:.2} {}   master {:.2}\n{}\n{} playing, {} loading  {}\n{}",
        snapshot.intensity,
        intensity_bar(snapshot.intensity, 20),
        snapshot.master_volume,
        mode,
        snapshot.active_tracks,
        snapshot.loading_tracks,
        flags.join(" | "),
        sound_line
    );
    if let Some(notice) = notice {
        text.push_str(&format!("\n{:?}: {}", notice.level, notice.message));
    }

    StatusSnapshot { text }
}

pub fn handle_key_event(engine: &AdaptiveEngine, state: &mut ControlState) -> bool {
    if event::poll(Duration::from_millis(100)).unwrap_or(false) {
        if let Ok(Event::Key(key)) = event::read() {
            if key.kind != KeyEventKind::Press {
                return true;
            }
            match key.code {
                KeyCode::Char('q') => {
                    engine.stop_all();
                    return false;
                }
                KeyCode::Up => {
                    engine.set_global_intensity(engine.intensity() + INTENSITY_STEP, false);
                }
                KeyCode::Down => {
                    engine.set_global_intensity(engine.intensity() - INTENSITY_STEP, false);
                }
                KeyCode::Char('f') => {
                    let target = if engine.intensity() < 0.5 { 1.0 } else { 0.0 };
                    engine.fade_to(target, FADE_DURATION, true);
                }
                KeyCode::Char(digit @ '1'..='9') => {
                    let index = digit as usize - '1' as usize;
                    if let Some(sound) = state.sounds.get(index) {
                        toggle_sound(engine, &sound.id);
                    }
                }
                KeyCode::Char('s') => {
                    let stopped = engine.stop_all();
                    info!("stopped {} sounds", stopped);
                }
                KeyCode::Char('c') => {
                    let event = if state.combat_active {
                        HostEvent::CombatEnded {
                            combat_id: COMBAT_ID.to_string(),
                        }
                    } else {
                        HostEvent::CombatStarted {
                            combat_id: COMBAT_ID.to_string(),
                        }
                    };
                    state.combat_active = !state.combat_active;
                    engine.handle_event(event);
                }
                KeyCode::Char('m') => {
                    let enabled = engine.mix_state().custom_mix_enabled;
                    engine.set_custom_mix_enabled(!enabled, false);
                }
                KeyCode::Char('-') => {
                    engine.set_master_volume(engine.mix_state().master_volume - VOLUME_STEP);
                }
                KeyCode::Char('=') | KeyCode::Char('+') => {
                    engine.set_master_volume(engine.mix_state().master_volume + VOLUME_STEP);
                }
                KeyCode::Char('p') => {
                    let engine = engine.clone();
                    thread::spawn(move || engine.preload_all());
                }
                _ => {}
            }
        }
    }

    true
}

/// Start or stop a sound. Starting loads on a worker thread so the UI keeps
/// drawing.
pub fn toggle_sound(engine: &AdaptiveEngine, sound_id: &str) {
    if engine.is_playing(sound_id) {
        engine.stop(sound_id, false);
        return;
    }
    let engine = engine.clone();
    let event = HostEvent::PlayRequested {
        sound_id: sound_id.to_string(),
        user_initiated: true,
    };
    thread::spawn(move || engine.handle_event(event));
}
