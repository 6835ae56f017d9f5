//! Band edges for filled-contour rendering.

/// `bands + 1` evenly spaced edges from `min` to `max`.
///
/// Empty when the range is degenerate or no bands are requested.
pub fn band_levels(min: f64, max: f64, bands: usize) -> Vec<f64> {
    if bands == 0 || !min.is_finite() || !max.is_finite() || max <= min {
        return Vec::new();
    }

    let step = (max - min) / bands as f64;
    let mut levels: Vec<f64> = (0..bands).map(|k| min + step * k as f64).collect();
    // exact upper edge so the maximum always falls inside the last band
    levels.push(max);
    levels
}

/// Band containing `value`: `levels[k] <= value < levels[k + 1]`, with the
/// top edge belonging to the last band.
///
/// `None` for NaN or values outside the edges.
pub fn band_index(value: f64, levels: &[f64]) -> Option<usize> {
    let (&first, &last) = (levels.first()?, levels.last()?);
    if levels.len() < 2 || !(first..=last).contains(&value) {
        return None;
    }
    let upper = levels.partition_point(|&edge| edge <= value);
    Some(upper.saturating_sub(1).min(levels.len() - 2))
}

/// Legend label for a band edge.
pub fn format_level(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude != 0.0 && !(0.01..100_000.0).contains(&magnitude) {
        format!("{:.1e}", value)
    } else if magnitude >= 100.0 {
        format!("{:.0}", value)
    } else if magnitude >= 1.0 {
        format!("{:.1}", value)
    } else {
        format!("{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_even_and_inclusive() {
        let levels = band_levels(0.0, 10.0, 4);
        assert_eq!(levels, vec![0.0, 2.5, 5.0, 7.5, 10.0]);
        assert_eq!(band_levels(0.0, 1.0, 20).len(), 21);
    }

    #[test]
    fn test_degenerate_levels() {
        assert!(band_levels(1.0, 1.0, 5).is_empty());
        assert!(band_levels(2.0, 1.0, 5).is_empty());
        assert!(band_levels(0.0, f64::NAN, 5).is_empty());
        assert!(band_levels(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_band_index() {
        let levels = band_levels(0.0, 10.0, 4);
        assert_eq!(band_index(0.0, &levels), Some(0));
        assert_eq!(band_index(2.4, &levels), Some(0));
        assert_eq!(band_index(2.5, &levels), Some(1));
        assert_eq!(band_index(9.9, &levels), Some(3));
        assert_eq!(band_index(10.0, &levels), Some(3));
        assert_eq!(band_index(10.1, &levels), None);
        assert_eq!(band_index(-0.1, &levels), None);
        assert_eq!(band_index(f64::NAN, &levels), None);
        assert_eq!(band_index(1.0, &[]), None);
    }

    #[test]
    fn test_format_level() {
        assert_eq!(format_level(0.0), "0.00");
        assert_eq!(format_level(0.123), "0.12");
        assert_eq!(format_level(12.34), "12.3");
        assert_eq!(format_level(250.0), "250");
        assert_eq!(format_level(0.0001), "1.0e-4");
    }
}
