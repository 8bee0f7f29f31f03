use statrs::distribution::{ContinuousCDF, Normal};
use std::sync::OnceLock;

static NORMAL_DIST: OnceLock<Normal> = OnceLock::new();

fn get_normal() -> &'static Normal {
    NORMAL_DIST.get_or_init(|| Normal::new(0.0, 1.0).unwrap())
}

/// Calculate d1 parameter for Black-Scholes model
fn calculate_d1(s: f64, k: f64, t: f64, r: f64, sigma: f64) -> f64 {
    ((s / k).ln() + (r + 0.5 * sigma * sigma) * t) / (sigma * t.sqrt())
}

/// Calculate d2 parameter for Black-Scholes model
fn calculate_d2(d1: f64, sigma: f64, t: f64) -> f64 {
    d1 - sigma * t.sqrt()
}

/// Discounted intrinsic value, the zero-volatility / zero-time limit.
fn discounted_intrinsic(s: f64, k: f64, t: f64, r: f64, is_call: bool) -> f64 {
    let discounted_strike = k * (-r * t.max(0.0)).exp();
    if is_call {
        (s - discounted_strike).max(0.0)
    } else {
        (discounted_strike - s).max(0.0)
    }
}

/// Black-Scholes option price. NaN inputs propagate to a NaN price.
pub fn price(s: f64, k: f64, t: f64, r: f64, sigma: f64, is_call: bool) -> f64 {
    if [s, k, t, r, sigma].iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    if s <= 0.0 || k <= 0.0 {
        return f64::NAN;
    }
    if t <= 0.0 || sigma <= 0.0 {
        return discounted_intrinsic(s, k, t, r, is_call);
    }

    let n = get_normal();
    let d1 = calculate_d1(s, k, t, r, sigma);
    let d2 = calculate_d2(d1, sigma, t);
    if is_call {
        s * n.cdf(d1) - k * (-r * t).exp() * n.cdf(d2)
    } else {
        k * (-r * t).exp() * n.cdf(-d2) - s * n.cdf(-d1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn put_call_parity() {
        let (s, k, t, r, sigma) = (100.0, 95.0, 0.5, 0.03, 0.25);
        let call = price(s, k, t, r, sigma, true);
        let put = price(s, k, t, r, sigma, false);
        assert_abs_diff_eq!(call - put, s - k * (-r * t).exp(), epsilon = 1e-9);
    }

    #[test]
    fn zero_vol_is_intrinsic() {
        assert_abs_diff_eq!(price(110.0, 100.0, 1.0, 0.0, 0.0, true), 10.0);
        assert_abs_diff_eq!(price(110.0, 100.0, 1.0, 0.0, 0.0, false), 0.0);
    }

    #[test]
    fn nan_propagates() {
        assert!(price(f64::NAN, 100.0, 1.0, 0.0, 0.2, true).is_nan());
        assert!(price(100.0, 100.0, 1.0, f64::NAN, 0.2, true).is_nan());
    }
}
