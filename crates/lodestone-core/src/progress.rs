//! Conversion of raw engine completion fractions into reported percentages.

use crate::error::BoundsError;

/// Reported values are rounded to this many steps per percentage point so a
/// second pass through [`normalize`] returns the same value.
const REPORT_PRECISION: f64 = 1_000_000.0;

/// Inclusive clamp applied to reported percentages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressBounds {
    low: f64,
    high: f64,
}

impl ProgressBounds {
    /// Validate a pair of bounds.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::NotFinite`] for NaN or infinite bounds and
    /// [`BoundsError::Inverted`] when `low > high`.
    pub fn new(low: f64, high: f64) -> Result<Self, BoundsError> {
        for value in [low, high] {
            if !value.is_finite() {
                return Err(BoundsError::NotFinite { value });
            }
        }
        if low > high {
            return Err(BoundsError::Inverted { low, high });
        }
        Ok(Self { low, high })
    }

    /// Lower bound.
    #[must_use]
    pub const fn low(&self) -> f64 {
        self.low
    }

    /// Upper bound.
    #[must_use]
    pub const fn high(&self) -> f64 {
        self.high
    }

    /// Normalize a raw fraction against these bounds.
    #[must_use]
    pub fn normalize(&self, raw: f64) -> f64 {
        normalize(raw, self.low, self.high)
    }
}

impl Default for ProgressBounds {
    fn default() -> Self {
        Self {
            low: 0.0,
            high: 100.0,
        }
    }
}

/// Map a raw completion fraction to a percentage clamped to `[low, high]`.
///
/// NaN and negative fractions report `low`; `+inf` reports `high`. Callers are
/// expected to pass validated bounds; inverted bounds still return without
/// panicking.
#[must_use]
pub fn normalize(raw: f64, low: f64, high: f64) -> f64 {
    if raw.is_nan() || raw < 0.0 {
        return low;
    }
    let percent = raw * 100.0;
    let percent = if percent.is_finite() {
        (percent * REPORT_PRECISION).round() / REPORT_PRECISION
    } else {
        percent
    };
    percent.max(low).min(high)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_overshoot_and_negative_fractions() {
        assert!((normalize(1.37, 0.0, 100.0) - 100.0).abs() < f64::EPSILON);
        assert!(normalize(-0.2, 0.0, 100.0).abs() < f64::EPSILON);
        assert!((normalize(0.5, 0.0, 100.0) - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn non_finite_inputs_are_bounded() {
        assert!(normalize(f64::NAN, 5.0, 95.0).eq(&5.0));
        assert!(normalize(f64::INFINITY, 5.0, 95.0).eq(&95.0));
        assert!(normalize(f64::NEG_INFINITY, 5.0, 95.0).eq(&5.0));
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            -3.0, 0.0, 1e-9, 0.001, 0.017_3, 0.123_456_789, 0.333_333_333, 0.5, 0.666_666_7,
            0.999_999_9, 1.0, 1.5, 42.0, 1e300,
        ];
        for raw in samples {
            let once = normalize(raw, 0.0, 100.0);
            let twice = normalize(once / 100.0, 0.0, 100.0);
            assert!(twice.eq(&once), "raw={raw} once={once} twice={twice}");
        }
    }

    #[test]
    fn bounds_validation() {
        assert!(ProgressBounds::new(0.0, 100.0).is_ok());
        assert!(ProgressBounds::new(50.0, 50.0).is_ok());
        assert_eq!(
            ProgressBounds::new(60.0, 40.0),
            Err(BoundsError::Inverted {
                low: 60.0,
                high: 40.0
            })
        );
        assert!(matches!(
            ProgressBounds::new(f64::NAN, 100.0),
            Err(BoundsError::NotFinite { .. })
        ));

        let bounds = ProgressBounds::default();
        assert!((bounds.normalize(0.25) - 25.0).abs() < f64::EPSILON);
    }
}
