//! Layer vocabulary and the intensity mix calculator.
//!
//! The calculator is pure: it maps the global [`MixState`] and the set of
//! layers a sound actually has to a per-layer target volume. Volumes for
//! layers that are absent are always zero and never written to a handle.

mod curve;

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub use curve::{calculate_mix, interpolate, HIGH_CURVE, LOW_CURVE, MID_CURVE};

/// One of the three intensity-graded audio sources of a sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Low,
    Mid,
    High,
}

impl LayerKind {
    /// All kinds in primary-selection priority order (Low > Mid > High).
    pub const PRIORITY: [LayerKind; 3] = [LayerKind::Low, LayerKind::Mid, LayerKind::High];

    pub fn label(&self) -> &'static str {
        match self {
            LayerKind::Low => "low",
            LayerKind::Mid => "mid",
            LayerKind::High => "high",
        }
    }
}

impl Display for LayerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Fixed storage for one optional value per layer kind.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSlots<T> {
    pub low: Option<T>,
    pub mid: Option<T>,
    pub high: Option<T>,
}

impl<T> Default for LayerSlots<T> {
    fn default() -> Self {
        Self {
            low: None,
            mid: None,
            high: None,
        }
    }
}

impl<T> LayerSlots<T> {
    pub fn get(&self, kind: LayerKind) -> Option<&T> {
        match kind {
            LayerKind::Low => self.low.as_ref(),
            LayerKind::Mid => self.mid.as_ref(),
            LayerKind::High => self.high.as_ref(),
        }
    }

    pub fn get_mut(&mut self, kind: LayerKind) -> Option<&mut T> {
        match kind {
            LayerKind::Low => self.low.as_mut(),
            LayerKind::Mid => self.mid.as_mut(),
            LayerKind::High => self.high.as_mut(),
        }
    }

    pub fn set(&mut self, kind: LayerKind, value: T) {
        match kind {
            LayerKind::Low => self.low = Some(value),
            LayerKind::Mid => self.mid = Some(value),
            LayerKind::High => self.high = Some(value),
        }
    }

    pub fn take(&mut self, kind: LayerKind) -> Option<T> {
        match kind {
            LayerKind::Low => self.low.take(),
            LayerKind::Mid => self.mid.take(),
            LayerKind::High => self.high.take(),
        }
    }

    /// Present kinds, in priority order.
    pub fn kinds(&self) -> Vec<LayerKind> {
        LayerKind::PRIORITY
            .into_iter()
            .filter(|kind| self.get(*kind).is_some())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.kinds().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate `(kind, value)` pairs for present layers, in priority order.
    pub fn iter(&self) -> impl Iterator<Item = (LayerKind, &T)> {
        LayerKind::PRIORITY
            .into_iter()
            .filter_map(move |kind| self.get(kind).map(|value| (kind, value)))
    }
}

/// Per-layer volume scalars.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MixLevels {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

impl MixLevels {
    pub fn new(low: f32, mid: f32, high: f32) -> Self {
        Self { low, mid, high }
    }

    pub fn get(&self, kind: LayerKind) -> f32 {
        match kind {
            LayerKind::Low => self.low,
            LayerKind::Mid => self.mid,
            LayerKind::High => self.high,
        }
    }

    pub fn set(&mut self, kind: LayerKind, value: f32) {
        match kind {
            LayerKind::Low => self.low = value,
            LayerKind::Mid => self.mid = value,
            LayerKind::High => self.high = value,
        }
    }

    fn scaled(self, gain: f32) -> Self {
        Self {
            low: clamp_unit(self.low * gain),
            mid: clamp_unit(self.mid * gain),
            high: clamp_unit(self.high * gain),
        }
    }
}

/// Clamp a scalar into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Global mix inputs shared by every active track set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixState {
    pub intensity: f32,
    pub custom_mix_enabled: bool,
    pub custom_volumes: MixLevels,
    pub master_volume: f32,
}

impl Default for MixState {
    fn default() -> Self {
        Self {
            intensity: 0.5,
            custom_mix_enabled: false,
            custom_volumes: MixLevels::new(1.0, 1.0, 1.0),
            master_volume: 1.0,
        }
    }
}

impl MixState {
    /// Curve-or-custom volume per present layer, multiplied by the master
    /// volume. Absent layers are reported as `0.0`.
    pub fn levels_for(&self, present: &[LayerKind]) -> MixLevels {
        let raw = if self.custom_mix_enabled {
            self.custom_volumes
        } else {
            curve_levels(present, self.intensity)
        };

        let mut levels = MixLevels::default();
        for kind in present {
            levels.set(*kind, raw.get(*kind));
        }
        levels.scaled(clamp_unit(self.master_volume))
    }
}

/// Curve volumes for whichever layers are present.
///
/// Three layers follow the five-stage curve; two layers crossfade linearly
/// from the lower to the higher intensity layer; a single layer is always
/// full.
pub fn curve_levels(present: &[LayerKind], intensity: f32) -> MixLevels {
    let intensity = clamp_unit(intensity);
    let mut kinds: Vec<LayerKind> = present.to_vec();
    kinds.sort();
    kinds.dedup();

    let mut levels = MixLevels::default();
    match kinds.as_slice() {
        [] => {}
        [only] => levels.set(*only, 1.0),
        [lower, higher] => {
            levels.set(*lower, 1.0 - intensity);
            levels.set(*higher, intensity);
        }
        _ => levels = calculate_mix(intensity),
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const ALL: [LayerKind; 3] = [LayerKind::Low, LayerKind::Mid, LayerKind::High];

    #[test]
    fn two_layer_crossfade_runs_from_lower_to_higher() {
        let levels = curve_levels(&[LayerKind::High, LayerKind::Mid], 0.25);
        assert_abs_diff_eq!(levels.mid, 0.75);
        assert_abs_diff_eq!(levels.high, 0.25);
        assert_eq!(levels.low, 0.0);

        let levels = curve_levels(&[LayerKind::Low, LayerKind::High], 1.0);
        assert_abs_diff_eq!(levels.low, 0.0);
        assert_abs_diff_eq!(levels.high, 1.0);
    }

    #[test]
    fn single_layer_ignores_intensity() {
        for intensity in [0.0, 0.3, 1.0] {
            let levels = curve_levels(&[LayerKind::High], intensity);
            assert_eq!(levels, MixLevels::new(0.0, 0.0, 1.0));
        }
    }

    #[test]
    fn custom_mix_ignores_intensity() {
        let mut state = MixState {
            custom_mix_enabled: true,
            custom_volumes: MixLevels::new(0.0, 0.3, 1.0),
            ..MixState::default()
        };
        for intensity in [0.0, 0.25, 0.6, 1.0] {
            state.intensity = intensity;
            let levels = state.levels_for(&ALL);
            assert_abs_diff_eq!(levels.high, 1.0);
            assert_abs_diff_eq!(levels.mid, 0.3);
            assert_abs_diff_eq!(levels.low, 0.0);
        }
    }

    #[test]
    fn master_volume_scales_every_layer() {
        let state = MixState {
            intensity: 0.8,
            master_volume: 0.5,
            ..MixState::default()
        };
        let levels = state.levels_for(&[LayerKind::Mid, LayerKind::High]);
        assert_abs_diff_eq!(levels.high, 0.4, epsilon = 1e-6);
        assert_abs_diff_eq!(levels.mid, 0.1, epsilon = 1e-6);
    }

    #[test]
    fn absent_layers_stay_silent() {
        let state = MixState {
            custom_mix_enabled: true,
            ..MixState::default()
        };
        let levels = state.levels_for(&[LayerKind::High]);
        assert_eq!(levels.low, 0.0);
        assert_eq!(levels.mid, 0.0);
        assert_eq!(levels.high, 1.0);
    }

    #[test]
    fn slots_report_kinds_in_priority_order() {
        let mut slots = LayerSlots::default();
        slots.set(LayerKind::High, "h");
        slots.set(LayerKind::Low, "l");
        assert_eq!(slots.kinds(), vec![LayerKind::Low, LayerKind::High]);
        assert_eq!(slots.take(LayerKind::Low), Some("l"));
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn clamp_unit_handles_nan_and_range() {
        assert_eq!(clamp_unit(f32::NAN), 0.0);
        assert_eq!(clamp_unit(-0.2), 0.0);
        assert_eq!(clamp_unit(1.7), 1.0);
    }
}
