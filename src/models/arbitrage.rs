//! Static no-arbitrage diagnostics for supplied SVI slices
//!
//! These checks inspect parameters handed over by the calibration service;
//! they never adjust them.
//!
//! # References
//! - Gatheral, J. & Jacquier, A. "Arbitrage-free SVI Volatility Surfaces" (2014)

use crate::error::Result;
use crate::models::chain::Extent;
use crate::models::svi::SviParameters;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Upper bound on `b·(1 + |ρ|)`; steeper wings admit butterfly arbitrage.
pub const MAX_WING_SLOPE: f64 = 4.0;
/// Samples used when scanning total variance for negative values.
const VARIANCE_SAMPLES: usize = 50;
const VARIANCE_PADDING: f64 = 1.0;
/// Samples used when scanning the butterfly density.
const DENSITY_SAMPLES: usize = 20;
const DENSITY_PADDING: f64 = 0.5;
/// Log-moneyness window for calendar comparisons.
const CALENDAR_WINDOW: (f64, f64) = (-2.0, 2.0);
const CALENDAR_SAMPLES: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArbitrageIssue {
    NegativeSlope { b: f64 },
    RhoNotInterior { rho: f64 },
    WingTooSteep { slope: f64 },
    NegativeMinimumVariance { min_variance: f64 },
    NegativeVariance { log_moneyness: f64, total_variance: f64 },
    ButterflyDensity { log_moneyness: f64, density: f64 },
    CalendarSpread { log_moneyness: f64, near: f64, far: f64 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageReport {
    pub issues: Vec<ArbitrageIssue>,
}

impl ArbitrageReport {
    pub fn is_free(&self) -> bool {
        self.issues.is_empty()
    }

    /// Most negative butterfly density among the sampled points, if any.
    pub fn worst_density(&self) -> Option<f64> {
        self.issues
            .iter()
            .filter_map(|issue| match issue {
                ArbitrageIssue::ButterflyDensity { density, .. } => Some(*density),
                _ => None,
            })
            .reduce(f64::min)
    }
}

struct RawSlice {
    a: f64,
    b: f64,
    rho: f64,
    m: f64,
    sigma: f64,
}

impl RawSlice {
    fn from_parameters(parameters: &SviParameters) -> Result<Self> {
        let (a, b, rho, m, sigma) = parameters.to_raw()?.raw_coefficients()?;
        Ok(Self { a, b, rho, m, sigma })
    }

    fn variance(&self, k: f64) -> f64 {
        let x = k - self.m;
        self.a + self.b * (self.rho * x + (x * x + self.sigma * self.sigma).sqrt())
    }

    /// Durrleman's g(k); `None` where total variance is not positive.
    fn density(&self, k: f64) -> Option<f64> {
        let w = self.variance(k);
        if w <= 0.0 {
            return None;
        }
        let x = k - self.m;
        let root = (x * x + self.sigma * self.sigma).sqrt();
        let w1 = self.b * (self.rho + x / root);
        let w2 = self.b * self.sigma * self.sigma / root.powi(3);

        Some((1.0 - k * w1 / (2.0 * w)).powi(2) - 0.25 * w1 * w1 * (1.0 / w + 0.25) + 0.5 * w2)
    }
}

/// Butterfly density g(k) of a slice at log-moneyness `k`; `None` where the
/// total variance is not positive.
pub fn butterfly_density(parameters: &SviParameters, k: f64) -> Result<Option<f64>> {
    Ok(RawSlice::from_parameters(parameters)?.density(k))
}

/// Check a single expiry slice over the log-moneyness range of the quotes it
/// will be drawn against.
pub fn check_slice(parameters: &SviParameters, observed: Extent) -> Result<ArbitrageReport> {
    let slice = RawSlice::from_parameters(parameters)?;
    let mut issues = Vec::new();

    if slice.b < 0.0 {
        issues.push(ArbitrageIssue::NegativeSlope { b: slice.b });
    }
    if slice.rho.abs() >= 1.0 {
        issues.push(ArbitrageIssue::RhoNotInterior { rho: slice.rho });
    }
    let slope = slice.b * (1.0 + slice.rho.abs());
    if slope > MAX_WING_SLOPE {
        issues.push(ArbitrageIssue::WingTooSteep { slope });
    }
    let min_variance = slice.a + slice.b * slice.sigma * (1.0 - slice.rho * slice.rho).max(0.0).sqrt();
    if min_variance < 0.0 {
        issues.push(ArbitrageIssue::NegativeMinimumVariance { min_variance });
    }

    let wide = observed.widen(VARIANCE_PADDING);
    for &k in Array1::linspace(wide.min, wide.max, VARIANCE_SAMPLES).iter() {
        let total_variance = slice.variance(k);
        if total_variance < 0.0 {
            issues.push(ArbitrageIssue::NegativeVariance { log_moneyness: k, total_variance });
        }
    }

    let near = observed.widen(DENSITY_PADDING);
    for &k in Array1::linspace(near.min, near.max, DENSITY_SAMPLES).iter() {
        match slice.density(k) {
            Some(density) if density >= 0.0 => {}
            Some(density) => issues.push(ArbitrageIssue::ButterflyDensity { log_moneyness: k, density }),
            // already reported as negative variance when inside the wide scan
            None => {}
        }
    }

    Ok(ArbitrageReport { issues })
}

/// Total variance must not decrease with expiry. Slices are ordered by their
/// expiries; equal or reversed expiries are not comparable and pass.
pub fn check_calendar(
    near_expiry: f64,
    near: &SviParameters,
    far_expiry: f64,
    far: &SviParameters,
) -> Result<ArbitrageReport> {
    let near_slice = RawSlice::from_parameters(near)?;
    let far_slice = RawSlice::from_parameters(far)?;
    if far_expiry <= near_expiry {
        return Ok(ArbitrageReport::default());
    }

    let (lo, hi) = CALENDAR_WINDOW;
    let issues = Array1::linspace(lo, hi, CALENDAR_SAMPLES)
        .iter()
        .filter_map(|&k| {
            let (w_near, w_far) = (near_slice.variance(k), far_slice.variance(k));
            (w_far < w_near).then_some(ArbitrageIssue::CalendarSpread {
                log_moneyness: k,
                near: w_near,
                far: w_far,
            })
        })
        .collect();

    Ok(ArbitrageReport { issues })
}
