//! Work function
//!
//! The unit of work each task carries: a definite integral over a
//! subinterval, approximated with the trapezoidal rule. The integrand is
//! interchangeable; any CPU-bound, idempotent `fn(f64) -> f64` qualifies,
//! so the same run may be recomputed on any worker without side effects.

/// Integrand signature
pub type WorkFn = fn(f64) -> f64;

/// Default integrand: f(x) = x²
pub fn square(x: f64) -> f64 {
    x * x
}

/// Trapezoidal integration of `f` over `[left, right)` with `steps` trapezoids
pub fn integrate(f: WorkFn, left: f64, right: f64, steps: u32) -> f64 {
    let step = (right - left) / steps as f64;
    let mut result = 0.0;

    for i in 0..steps {
        let x1 = left + i as f64 * step;
        let x2 = x1 + step;
        result += 0.5 * (x2 - x1) * (f(x1) + f(x2));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(x: f64) -> f64 {
        x
    }

    #[test]
    fn test_square_integral_unit_interval() {
        // ∫ x² dx over [0,1) = 1/3
        let result = integrate(square, 0.0, 1.0, 1000);
        assert!((result - 1.0 / 3.0).abs() < 1e-5, "got {}", result);
    }

    #[test]
    fn test_linear_integrand_is_exact() {
        // The trapezoidal rule is exact for linear functions
        let result = integrate(ident, 0.0, 1.0, 4);
        assert!((result - 0.5).abs() < 1e-12, "got {}", result);
    }

    #[test]
    fn test_quarter_interval_values() {
        // Per-subinterval integrals of f(x) = x over [0,1) split in four
        let expected = [0.03125, 0.09375, 0.15625, 0.21875];
        for (i, want) in expected.iter().enumerate() {
            let left = i as f64 * 0.25;
            let got = integrate(ident, left, left + 0.25, 100);
            assert!((got - want).abs() < 1e-12, "interval {}: got {}", i, got);
        }
    }

    #[test]
    fn test_subinterval_sums_match_whole() {
        let whole = integrate(square, 0.0, 2.0, 4000);
        let halves = integrate(square, 0.0, 1.0, 2000) + integrate(square, 1.0, 2.0, 2000);
        assert!((whole - halves).abs() < 1e-9);
    }
}
