use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
///
/// All arithmetic inside the simulation loop is done in `Fixed64` so that a
/// run is bit-for-bit reproducible across platforms. `f64` appears only at
/// configuration boundaries.
pub type Fixed64 = I32F32;

/// A point on the logical time axis.
pub type SimTime = Fixed64;

/// A span of logical time (processing times, travel times, slacks).
pub type Duration = Fixed64;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display/reporting, never in sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Checked division that returns None on a zero divisor.
#[inline]
pub fn checked_div_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_div(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_arithmetic() {
        let a = f64_to_fixed64(1.5);
        let b = f64_to_fixed64(2.0);
        assert_eq!(fixed64_to_f64(a + b), 3.5);
        assert_eq!(fixed64_to_f64(a * b), 3.0);
    }

    #[test]
    fn checked_div_by_zero() {
        let a = f64_to_fixed64(1.0);
        assert!(checked_div_64(a, Fixed64::ZERO).is_none());
    }

    #[test]
    fn determinism() {
        let a = f64_to_fixed64(1.0 / 3.0);
        let b = f64_to_fixed64(1.0 / 3.0);
        assert_eq!(a, b);
    }

    #[test]
    fn ordering() {
        assert!(f64_to_fixed64(1.0) < f64_to_fixed64(2.0));
        assert!(f64_to_fixed64(-3.5) < Fixed64::ZERO);
    }
}
