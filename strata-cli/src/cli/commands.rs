//! One-shot subcommands that do not open an output device.

use std::path::Path;

use clap::ArgMatches;
use strata_lib::container::{
    detect_layers, EngineSettings, PlaybackMode, PlaylistConfig, Session, SoundConfig,
};
use strata_lib::error::EngineResult;
use strata_lib::mix::{clamp_unit, curve_levels, LayerKind};

/// Print curve volumes for an intensity.
pub fn run_mix(args: &ArgMatches) -> EngineResult<i32> {
    let raw = args.get_one::<String>("INTENSITY").map(String::as_str).unwrap_or("");
    let Ok(intensity) = raw.parse::<f32>() else {
        eprintln!("invalid intensity: {}", raw);
        return Ok(-1);
    };

    let list = args.get_one::<String>("layers").map(String::as_str).unwrap_or("low,mid,high");
    let Some(kinds) = parse_layers(list) else {
        eprintln!("invalid layer list: {} (expected names from low, mid, high)", list);
        return Ok(-1);
    };

    let levels = curve_levels(&kinds, clamp_unit(intensity));
    if args.get_flag("json") {
        println!("{}", serde_json::to_string(&levels)?);
        return Ok(0);
    }
    for kind in kinds {
        println!("{:<5}{:.3}", kind.label(), levels.get(kind));
    }
    Ok(0)
}

fn parse_layers(list: &str) -> Option<Vec<LayerKind>> {
    let mut kinds = Vec::new();
    for name in list.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        let kind = match name.to_ascii_lowercase().as_str() {
            "low" => LayerKind::Low,
            "mid" => LayerKind::Mid,
            "high" => LayerKind::High,
            _ => return None,
        };
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    kinds.sort();
    (!kinds.is_empty()).then_some(kinds)
}

/// Print the sibling layers found next to a layer file.
pub fn run_detect(args: &ArgMatches) -> EngineResult<i32> {
    let path = args.get_one::<String>("PATH").map(String::as_str).unwrap_or("");
    let Some(detected) = detect_layers(path, |candidate| Path::new(candidate).exists()) else {
        println!("no intensity layers detected for {}", path);
        return Ok(1);
    };

    println!("high: {}", detected.high);
    println!("mid:  {}", detected.mid.as_deref().unwrap_or("-"));
    println!("low:  {}", detected.low.as_deref().unwrap_or("-"));
    Ok(0)
}

/// Print an example session file.
pub fn run_create_session() -> EngineResult<i32> {
    let session = Session {
        settings: EngineSettings::default(),
        playlists: vec![PlaylistConfig::new("battle", PlaybackMode::Sequential, true).with_sound(
            SoundConfig::new("boss", "music/Boss Intensity 3.ogg").with_layers(
                Some("music/Boss Intensity 2.ogg"),
                Some("music/Boss Intensity 1.ogg"),
            ),
        )],
    };
    println!("{}", serde_json::to_string_pretty(&session)?);
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_lists_are_sorted_and_deduplicated() {
        assert_eq!(
            parse_layers("high, low,high"),
            Some(vec![LayerKind::Low, LayerKind::High])
        );
        assert_eq!(parse_layers("loud"), None);
        assert_eq!(parse_layers(""), None);
    }
}
