//! Probe the layers of every adaptive sound in a session.

use strata_lib::container::info::{probe_layer, LayerInfo};
use strata_lib::container::Session;
use strata_lib::error::EngineResult;
use strata_lib::mix::LayerKind;
use strata_lib::playback::engine::EngineTuning;

/// Print each adaptive sound with its probed layers.
///
/// Layers whose duration differs from the High layer by more than the
/// end-of-track window are flagged, since end detection only follows the
/// primary layer. Returns `1` when any layer failed to probe or mismatched.
pub fn run_inspect(path: &str) -> EngineResult<i32> {
    let session = Session::from_path(path)?;
    let window = EngineTuning::default().end_window;
    let mut problems = 0;

    for playlist in session.playlists.iter().filter(|playlist| playlist.is_adaptive) {
        println!("playlist {} ({:?})", playlist.name, playlist.mode);
        for sound in &playlist.sounds {
            let paths = sound.layer_paths();
            if !paths.is_adaptive() {
                println!("  {}: high layer only, played natively", sound.name);
                continue;
            }
            println!("  {}", sound.name);

            let slots = paths.slots();
            let high = slots.get(LayerKind::High).and_then(|path| probe_layer(path).ok());
            for kind in [LayerKind::High, LayerKind::Mid, LayerKind::Low] {
                let Some(layer_path) = slots.get(kind) else {
                    continue;
                };
                match probe_layer(layer_path) {
                    Ok(info) => {
                        let flag = mismatch_flag(&info, high.as_ref(), window);
                        if !flag.is_empty() {
                            problems += 1;
                        }
                        println!(
                            "    {:<5}{:>8.2}s {:>6}Hz {}ch  {}{}",
                            kind.label(),
                            info.duration,
                            info.sample_rate,
                            info.channels,
                            layer_path,
                            flag
                        );
                    }
                    Err(err) => {
                        problems += 1;
                        println!("    {:<5}error: {}", kind.label(), err);
                    }
                }
            }
        }
    }

    Ok(if problems > 0 { 1 } else { 0 })
}

fn mismatch_flag(info: &LayerInfo, high: Option<&LayerInfo>, window: f64) -> String {
    match high {
        Some(high) if info.differs_from(high, window) => {
            format!("  [length differs from high by {:.2}s]", (info.duration - high.duration).abs())
        }
        _ => String::new(),
    }
}
