//! Layer auto-detection for packs that name their intensities
//! `... Intensity 1`, `... Intensity 2`, `... Intensity 3`.

use crate::container::library::LayerPaths;

const TOKEN: &str = "intensity";

/// Byte offset of the intensity digit inside `name`, if any.
fn intensity_digit(name: &str) -> Option<usize> {
    let lowered = name.to_ascii_lowercase();
    let start = lowered.rfind(TOKEN)? + TOKEN.len();
    let bytes = lowered.as_bytes();
    let mut index = start;
    while index < bytes.len() && matches!(bytes[index], b' ' | b'_' | b'-') {
        index += 1;
    }
    match bytes.get(index) {
        Some(b'1'..=b'3') => Some(index),
        _ => None,
    }
}

/// Derive sibling layer paths from an `Intensity N` file name.
///
/// `exists` decides which siblings are really there. Returns `None` when
/// the name carries no intensity token or no alternate layer exists.
pub fn detect_layers(path: &str, exists: impl Fn(&str) -> bool) -> Option<LayerPaths> {
    let split = path.rfind(['/', '\\']).map(|index| index + 1).unwrap_or(0);
    let (dir, name) = path.split_at(split);
    let digit = intensity_digit(name)?;

    let sibling = |level: char| {
        let mut candidate = String::with_capacity(path.len());
        candidate.push_str(dir);
        candidate.push_str(&name[..digit]);
        candidate.push(level);
        candidate.push_str(&name[digit + 1..]);
        candidate
    };
    let existing = |level: char| Some(sibling(level)).filter(|candidate| exists(candidate));

    let high = existing('3').unwrap_or_else(|| path.to_string());
    let mid = existing('2').filter(|mid| *mid != high);
    let low = existing('1').filter(|low| *low != high);
    let detected = LayerPaths::new(high, mid, low);

    detected.is_adaptive().then_some(detected)
}
