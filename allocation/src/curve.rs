use serde::{Deserialize, Serialize};

const MONOTONIC_SAMPLES: usize = 1024;
const BISECTION_ITERATIONS: usize = 200;

/// Polynomial map from a normalized motor command to thrust.
/// `coefficients[k]` multiplies `u^k`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseCurve {
    coefficients: Vec<f64>,
}

impl ResponseCurve {
    pub fn new(coefficients: Vec<f64>) -> Self {
        Self { coefficients }
    }

    /// `thrust = gain * u`.
    pub fn linear(gain: f64) -> Self {
        Self::new(vec![0.0, gain])
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn evaluate(&self, u: f64) -> f64 {
        // horner
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * u + c)
    }

    /// True when the curve rises strictly across `[min, max]`, checked on an
    /// evenly spaced sample.
    pub fn is_increasing_on(&self, min: f64, max: f64) -> bool {
        if self.coefficients.is_empty() || !self.coefficients.iter().all(|c| c.is_finite()) {
            return false;
        }
        let step = (max - min) / MONOTONIC_SAMPLES as f64;
        let mut previous = self.evaluate(min);
        for k in 1..=MONOTONIC_SAMPLES {
            let u = if k == MONOTONIC_SAMPLES { max } else { min + step * k as f64 };
            let value = self.evaluate(u);
            if value.is_nan() || value <= previous {
                return false;
            }
            previous = value;
        }
        true
    }

    /// Command in `[min, max]` producing `thrust`. Thrusts beyond what the
    /// interval can reach saturate at the nearest end. Assumes the curve is
    /// increasing on the interval.
    pub fn inverse(&self, thrust: f64, min: f64, max: f64) -> f64 {
        if thrust <= self.evaluate(min) {
            return min;
        }
        if thrust >= self.evaluate(max) {
            return max;
        }
        let (mut lo, mut hi) = (min, max);
        for _ in 0..BISECTION_ITERATIONS {
            let mid = 0.5 * (lo + hi);
            if mid <= lo || mid >= hi {
                break;
            }
            if self.evaluate(mid) < thrust {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        // pick whichever end is closer in thrust
        if (self.evaluate(hi) - thrust).abs() < (thrust - self.evaluate(lo)).abs() {
            hi
        } else {
            lo
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn cubic() -> ResponseCurve {
        // 0.1 + 2u + u^3
        ResponseCurve::new(vec![0.1, 2.0, 0.0, 1.0])
    }

    #[test]
    fn test_evaluate_ascending_order() {
        assert_abs_diff_eq!(cubic().evaluate(0.0), 0.1, epsilon = 1e-15);
        assert_abs_diff_eq!(cubic().evaluate(0.5), 0.1 + 1.0 + 0.125, epsilon = 1e-15);
        assert_abs_diff_eq!(cubic().evaluate(-1.0), 0.1 - 2.0 - 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_inverse_round_trip() {
        let curve = cubic();
        for k in 0..=20 {
            let u = -1.0 + 0.1 * k as f64;
            let thrust = curve.evaluate(u);
            let back = curve.inverse(thrust, -1.0, 1.0);
            assert_abs_diff_eq!(back, u, epsilon = 1e-12);
            assert_abs_diff_eq!(curve.evaluate(back), thrust, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_inverse_saturates() {
        let curve = ResponseCurve::linear(2.0);
        assert_eq!(curve.inverse(5.0, -0.5, 0.5), 0.5);
        assert_eq!(curve.inverse(-5.0, -0.5, 0.5), -0.5);
    }

    #[test]
    fn test_monotonic_check() {
        assert!(cubic().is_increasing_on(-1.0, 1.0));
        // u^2 turns around at zero
        assert!(!ResponseCurve::new(vec![0.0, 0.0, 1.0]).is_increasing_on(-1.0, 1.0));
        assert!(!ResponseCurve::new(vec![1.0]).is_increasing_on(-1.0, 1.0));
        assert!(!ResponseCurve::new(vec![]).is_increasing_on(-1.0, 1.0));
    }
}
