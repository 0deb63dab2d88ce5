//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float,
{
    target_range.0
        + ((value - source_range.0) * (target_range.1 - target_range.0)
            / (source_range.1 - source_range.0))
}

/// Clamp a value into the range [min, max].
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float,
{
    if value > max {
        max
    } else if value < min {
        min
    } else {
        value
    }
}

/// Wrap an angle in degrees into the range (-180, 180].
///
/// 0 maps to 0, 180 maps to 180, -180 maps to 180, 270 maps to -90.
pub fn wrap_180<T>(angle_deg: T) -> T
where
    T: Float,
{
    let t180 = T::from(180.0).unwrap();
    let t360 = T::from(360.0).unwrap();

    let mut a = angle_deg % t360;

    if a > t180 {
        a = a - t360;
    }
    if a <= -t180 {
        a = a + t360;
    }

    a
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_wrap_180() {
        assert_eq!(wrap_180(0f64), 0f64);
        assert_eq!(wrap_180(90f64), 90f64);
        assert_eq!(wrap_180(180f64), 180f64);
        assert_eq!(wrap_180(-180f64), 180f64);
        assert_eq!(wrap_180(270f64), -90f64);
        assert_eq!(wrap_180(-270f64), 90f64);
        assert_eq!(wrap_180(540f64), 180f64);
    }

    #[test]
    fn test_lin_map() {
        assert_eq!(lin_map((0f64, 1f64), (0f64, 100f64), 0.5f64), 50f64);
        assert_eq!(lin_map((0f64, 200f64), (100f64, 0f64), 50f64), 75f64);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(1.5f64, 0f64, 1f64), 1f64);
        assert_eq!(clamp(-0.5f64, 0f64, 1f64), 0f64);
        assert_eq!(clamp(0.5f64, 0f64, 1f64), 0.5f64);
    }
}
