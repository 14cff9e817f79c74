//! Numeric convergence tests for analog readbacks.
//!
//! Analog readbacks never land exactly on a setpoint, so completion is judged
//! by closeness, never by equality.

/// Default absolute tolerance for accumulated-output convergence (volume units).
pub const DEFAULT_TOLERANCE: f64 = 0.015;

const CLOSE_RTOL: f64 = 1e-5;
const CLOSE_ATOL: f64 = 1e-8;

/// Strict absolute-tolerance test: `|value - target| < tolerance`.
///
/// A value exactly `tolerance` away does **not** converge.
#[inline]
pub fn converged(value: f64, target: f64, tolerance: f64) -> bool {
    (value - target).abs() < tolerance
}

/// Relative closeness test for readback-verified setpoints.
///
/// `|value - target| <= 1e-8 + 1e-5 * |target|`; NaN never matches.
#[inline]
pub fn is_close(value: f64, target: f64) -> bool {
    (value - target).abs() <= CLOSE_ATOL + CLOSE_RTOL * target.abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_is_exclusive() {
        assert!(!converged(0.015, 0.0, DEFAULT_TOLERANCE));
        assert!(!converged(-0.015, 0.0, DEFAULT_TOLERANCE));
        assert!(converged(0.014, 0.0, DEFAULT_TOLERANCE));
        assert!(converged(1.014, 1.0, DEFAULT_TOLERANCE));
        assert!(!converged(1.0 + DEFAULT_TOLERANCE * 2.0, 1.0, DEFAULT_TOLERANCE));
    }

    #[test]
    fn test_pump_target_window() {
        assert!(converged(9.99, 10.0, DEFAULT_TOLERANCE));
        assert!(!converged(9.9, 10.0, DEFAULT_TOLERANCE));
    }

    #[test]
    fn test_is_close() {
        assert!(is_close(0.25, 0.25));
        assert!(is_close(100.0005, 100.0));
        assert!(!is_close(0.2501, 0.25));
        assert!(!is_close(f64::NAN, 0.25));
    }
}
