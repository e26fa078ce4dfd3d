use super::{clamp_unit, MixLevels};

/// Low layer: audible at 0%, 50% and 100%.
pub const LOW_CURVE: [(f32, f32); 5] = [(0.0, 1.0), (0.25, 0.0), (0.5, 1.0), (0.75, 0.0), (1.0, 1.0)];
/// Mid layer: ramps in by 25% and stays full.
pub const MID_CURVE: [(f32, f32); 3] = [(0.0, 0.0), (0.25, 1.0), (1.0, 1.0)];
/// High layer: silent through 50%, full from 75%.
pub const HIGH_CURVE: [(f32, f32); 4] = [(0.0, 0.0), (0.5, 0.0), (0.75, 1.0), (1.0, 1.0)];

/// Piecewise-linear lookup over ascending `(position, value)` control points.
///
/// Values before the first point take the first value, values past the last
/// point take the last value.
pub fn interpolate(points: &[(f32, f32)], value: f32) -> f32 {
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return 0.0,
    };
    if value <= first.0 {
        return first.1;
    }

    for pair in points.windows(2) {
        let (p1, v1) = pair[0];
        let (p2, v2) = pair[1];
        if value <= p2 {
            let span = p2 - p1;
            if span <= 0.0 {
                return v2;
            }
            return v1 + (v2 - v1) * (value - p1) / span;
        }
    }

    last.1
}

/// Three-layer volumes for an intensity in `[0, 1]`.
///
/// Out-of-range input is clamped first. Stages peak at 0 / 25 / 50 / 75 /
/// 100%: Low, Mid, Low+Mid, Mid+High, all three.
pub fn calculate_mix(intensity: f32) -> MixLevels {
    let intensity = clamp_unit(intensity);
    MixLevels {
        low: clamp_unit(interpolate(&LOW_CURVE, intensity)),
        mid: clamp_unit(interpolate(&MID_CURVE, intensity)),
        high: clamp_unit(interpolate(&HIGH_CURVE, intensity)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn audible(levels: MixLevels) -> (bool, bool, bool) {
        (levels.low > 0.0, levels.mid > 0.0, levels.high > 0.0)
    }

    #[test]
    fn stages_match_control_points() {
        assert_eq!(audible(calculate_mix(0.0)), (true, false, false));
        assert_eq!(audible(calculate_mix(0.25)), (false, true, false));
        assert_eq!(audible(calculate_mix(0.5)), (true, true, false));
        assert_eq!(audible(calculate_mix(0.75)), (false, true, true));
        assert_eq!(audible(calculate_mix(1.0)), (true, true, true));
    }

    #[test]
    fn midpoints_interpolate_linearly() {
        let levels = calculate_mix(0.125);
        assert_abs_diff_eq!(levels.low, 0.5);
        assert_abs_diff_eq!(levels.mid, 0.5);
        assert_abs_diff_eq!(levels.high, 0.0);

        let levels = calculate_mix(0.625);
        assert_abs_diff_eq!(levels.low, 0.5);
        assert_abs_diff_eq!(levels.mid, 1.0);
        assert_abs_diff_eq!(levels.high, 0.5);
    }

    #[test]
    fn curve_is_continuous_across_control_points() {
        let eps = 1e-4;
        for point in [0.25f32, 0.5, 0.75] {
            let before = calculate_mix(point - eps);
            let after = calculate_mix(point + eps);
            assert!((before.low - after.low).abs() < 0.01);
            assert!((before.mid - after.mid).abs() < 0.01);
            assert!((before.high - after.high).abs() < 0.01);
        }
    }

    #[test]
    fn output_stays_in_unit_range() {
        for step in -20..=120 {
            let levels = calculate_mix(step as f32 / 100.0);
            for value in [levels.low, levels.mid, levels.high] {
                assert!((0.0..=1.0).contains(&value));
            }
        }
        assert_eq!(calculate_mix(-3.0), calculate_mix(0.0));
        assert_eq!(calculate_mix(7.0), calculate_mix(1.0));
    }

    #[test]
    fn interpolate_clamps_beyond_last_point() {
        assert_eq!(interpolate(&MID_CURVE, 2.0), 1.0);
        assert_eq!(interpolate(&[], 0.3), 0.0);
    }
}
