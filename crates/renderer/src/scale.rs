//! Mapping data values to 8-bit pixel values.

/// Linear value range used for grayscale rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    pub min: f64,
    pub max: f64,
}

impl Scaling {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Range of the unmasked, finite values, or `None` when there are none.
    pub fn from_data(values: &[f64], mask: &[bool]) -> Option<Self> {
        let (min, max) = values
            .iter()
            .zip(mask)
            .filter(|(v, m)| !**m && v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (v, _)| {
                (lo.min(*v), hi.max(*v))
            });
        (min <= max).then(|| Self::new(min, max))
    }

    /// Gray level for `value`: `ceil(255 (value - min) / (max - min))`
    /// clamped to `1..=255`. A flat range maps everything to 255.
    #[inline]
    pub fn level(&self, value: f64) -> u8 {
        let span = self.max - self.min;
        if span <= 0.0 || !span.is_finite() {
            return 255;
        }
        let scaled = (255.0 * (value - self.min) / span).ceil();
        if scaled.is_nan() {
            return 1;
        }
        scaled.clamp(1.0, 255.0) as u8
    }
}

/// Gray levels for every pixel; masked pixels are 0.
pub fn to_gray_levels(values: &[f64], mask: &[bool], scaling: Scaling) -> Vec<u8> {
    values
        .iter()
        .zip(mask)
        .map(|(v, masked)| if *masked { 0 } else { scaling.level(*v) })
        .collect()
}

/// Palette indices: each value truncated to a class in `0..=255`; masked
/// pixels are 0.
pub fn to_class_indices(values: &[f64], mask: &[bool]) -> Vec<u8> {
    values
        .iter()
        .zip(mask)
        .map(|(v, masked)| {
            if *masked || !v.is_finite() {
                0
            } else {
                v.clamp(0.0, 255.0) as u8
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_clamp() {
        let s = Scaling::new(0.0, 1.0);
        assert_eq!(s.level(0.0), 1);
        assert_eq!(s.level(-5.0), 1);
        assert_eq!(s.level(0.5), 128);
        assert_eq!(s.level(1.0), 255);
        assert_eq!(s.level(3.0), 255);
    }

    #[test]
    fn test_masked_pixels_are_zero() {
        let levels = to_gray_levels(&[0.2, 0.8], &[true, false], Scaling::new(0.0, 1.0));
        assert_eq!(levels, vec![0, 204]);
    }

    #[test]
    fn test_scaling_from_data_ignores_masked() {
        let s = Scaling::from_data(&[5.0, -100.0, 7.0, f64::NAN], &[false, true, false, false]).unwrap();
        assert_eq!(s, Scaling::new(5.0, 7.0));
        assert!(Scaling::from_data(&[1.0], &[true]).is_none());
    }

    #[test]
    fn test_class_indices() {
        assert_eq!(
            to_class_indices(&[1.0, 2.9, 300.0, 4.0], &[false, false, false, true]),
            vec![1, 2, 255, 0]
        );
    }
}
