//! SVI (Stochastic Volatility Inspired) skew evaluation
//!
//! Both parametrizations give total implied variance `w(k)` as a function of
//! log-moneyness `k = ln(spot / strike)`:
//!
//! ```text
//! raw:     w(k) = a + b·(ρ(k − m) + √((k − m)² + σ²))
//! natural: w(k) = Δ + ω/2·(1 + ζρ(k − μ) + √((ζ(k − μ) + ρ)² + (1 − ρ²)))
//! ```
//!
//! and implied volatility is `√(w / T)`. Parameters are supplied by an
//! external calibration service; nothing here fits them.

use crate::error::{Result, SkewError};
use crate::models::chain::Extent;
use crate::models::option::AxisField;
use crate::utils::black_scholes;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Number of samples in a generated curve.
pub const DEFAULT_CURVE_STEPS: usize = 100;
/// Log-moneyness margin added on both sides of the observed quotes.
pub const LOG_MONEYNESS_PADDING: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "parametrization", rename_all = "lowercase")]
pub enum SviParameters {
    Raw {
        a: f64,
        b: f64,
        rho: f64,
        m: f64,
        sigma: f64,
    },
    Natural {
        delta: f64,
        mu: f64,
        rho: f64,
        omega: f64,
        zeta: f64,
    },
}

/// SVI jump-wings view of a raw slice at expiry `t`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SviJumpWings {
    /// ATM variance
    pub v: f64,
    /// ATM skew
    pub psi: f64,
    /// Left (put) wing slope
    pub p: f64,
    /// Right (call) wing slope
    pub c: f64,
    /// Minimum implied variance
    pub v_min: f64,
}

fn checked_sqrt(x: f64, what: &str) -> Result<f64> {
    if x.is_nan() || x < 0.0 {
        return Err(SkewError::DomainError(format!(
            "square root of negative {} ({})",
            what, x
        )));
    }
    Ok(x.sqrt())
}

fn require_finite(values: &[(&str, f64)]) -> Result<()> {
    for (name, value) in values {
        if !value.is_finite() {
            return Err(SkewError::ParameterError(format!(
                "{} must be finite, got {}",
                name, value
            )));
        }
    }
    Ok(())
}

fn require_rho(rho: f64) -> Result<()> {
    if !(-1.0..=1.0).contains(&rho) {
        return Err(SkewError::ParameterError(format!(
            "rho must lie in [-1, 1], got {}",
            rho
        )));
    }
    Ok(())
}

fn require_time(time_to_expiry: f64) -> Result<()> {
    if !time_to_expiry.is_finite() || time_to_expiry <= 0.0 {
        return Err(SkewError::DomainError(format!(
            "time to expiry must be positive, got {}",
            time_to_expiry
        )));
    }
    Ok(())
}

/// Log-moneyness `ln(spot / strike)`.
pub fn log_moneyness(strike_price: f64, spot: f64) -> Result<f64> {
    if !(strike_price.is_finite() && strike_price > 0.0) {
        return Err(SkewError::DomainError(format!(
            "strike must be positive, got {}",
            strike_price
        )));
    }
    if !(spot.is_finite() && spot > 0.0) {
        return Err(SkewError::DomainError(format!(
            "spot must be positive, got {}",
            spot
        )));
    }
    Ok((spot / strike_price).ln())
}

impl SviParameters {
    /// Reject parameter sets that cannot be evaluated.
    pub fn validate(&self) -> Result<()> {
        match *self {
            SviParameters::Raw { a, b, rho, m, sigma } => {
                require_finite(&[("a", a), ("b", b), ("rho", rho), ("m", m), ("sigma", sigma)])?;
                require_rho(rho)?;
                if sigma <= 0.0 {
                    return Err(SkewError::ParameterError(format!(
                        "sigma must be positive, got {}",
                        sigma
                    )));
                }
            }
            SviParameters::Natural { delta, mu, rho, omega, zeta } => {
                require_finite(&[
                    ("delta", delta),
                    ("mu", mu),
                    ("rho", rho),
                    ("omega", omega),
                    ("zeta", zeta),
                ])?;
                require_rho(rho)?;
                if omega < 0.0 {
                    return Err(SkewError::ParameterError(format!(
                        "omega must be non-negative, got {}",
                        omega
                    )));
                }
                if zeta <= 0.0 {
                    return Err(SkewError::ParameterError(format!(
                        "zeta must be positive, got {}",
                        zeta
                    )));
                }
            }
        }
        Ok(())
    }

    /// Total variance at `k`, assuming the parameters were validated.
    fn variance_at(&self, k: f64) -> Result<f64> {
        match *self {
            SviParameters::Raw { a, b, rho, m, sigma } => {
                let x = k - m;
                let root = checked_sqrt(x * x + sigma * sigma, "raw SVI radicand")?;
                Ok(a + b * (rho * x + root))
            }
            SviParameters::Natural { delta, mu, rho, omega, zeta } => {
                let x = zeta * (k - mu);
                let root = checked_sqrt((x + rho).powi(2) + (1.0 - rho * rho), "natural SVI radicand")?;
                Ok(delta + 0.5 * omega * (1.0 + rho * x + root))
            }
        }
    }

    /// Total implied variance `w(k)` at log-moneyness `k`.
    pub fn total_variance(&self, k: f64) -> Result<f64> {
        self.validate()?;
        if !k.is_finite() {
            return Err(SkewError::DomainError(format!(
                "log-moneyness must be finite, got {}",
                k
            )));
        }
        self.variance_at(k)
    }

    /// Raw coefficients `(a, b, rho, m, sigma)` after validation.
    pub(crate) fn raw_coefficients(&self) -> Result<(f64, f64, f64, f64, f64)> {
        self.validate()?;
        let coefficients = match *self {
            SviParameters::Raw { a, b, rho, m, sigma } => (a, b, rho, m, sigma),
            SviParameters::Natural { delta, mu, rho, omega, zeta } => {
                let one_minus_rho2 = 1.0 - rho * rho;
                (
                    delta + 0.5 * omega * one_minus_rho2,
                    0.5 * omega * zeta,
                    rho,
                    mu - rho / zeta,
                    one_minus_rho2.sqrt() / zeta,
                )
            }
        };
        Ok(coefficients)
    }

    /// Equivalent raw parameters (Gatheral-Jacquier mapping).
    pub fn to_raw(&self) -> Result<SviParameters> {
        let (a, b, rho, m, sigma) = self.raw_coefficients()?;
        let raw = SviParameters::Raw { a, b, rho, m, sigma };
        raw.validate()?;
        Ok(raw)
    }

    /// Jump-wings parameters at expiry `time_to_expiry`.
    pub fn to_jump_wings(&self, time_to_expiry: f64) -> Result<SviJumpWings> {
        require_time(time_to_expiry)?;
        let (a, b, rho, m, sigma) = self.to_raw()?.raw_coefficients()?;

        let root = (m * m + sigma * sigma).sqrt();
        let w_atm = a + b * (-rho * m + root);
        if w_atm <= 0.0 {
            return Err(SkewError::DomainError(format!(
                "ATM total variance must be positive, got {}",
                w_atm
            )));
        }
        let scale = 1.0 / w_atm.sqrt();

        Ok(SviJumpWings {
            v: w_atm / time_to_expiry,
            psi: scale * 0.5 * b * (rho - m / root),
            p: scale * b * (1.0 - rho),
            c: scale * b * (1.0 + rho),
            v_min: (a + b * sigma * (1.0 - rho * rho).sqrt()) / time_to_expiry,
        })
    }
}

fn nan() -> f64 {
    f64::NAN
}

/// One sample of an SVI skew curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SviCurvePoint {
    pub log_moneyness: f64,
    #[serde(default = "nan")]
    pub strike_price: f64,
    #[serde(default = "nan")]
    pub total_variance: f64,
    #[serde(alias = "impliedVolatility", alias = "y")]
    pub implied_vol: f64,
}

impl SviCurvePoint {
    pub fn moneyness(&self) -> f64 {
        self.log_moneyness.exp()
    }

    pub fn x_value(&self, field: AxisField) -> f64 {
        match field {
            AxisField::StrikePrice => self.strike_price,
            AxisField::Moneyness => self.moneyness(),
            AxisField::LogMoneyness => self.log_moneyness,
        }
    }

    /// Black-Scholes (call, put) premiums at this point's strike and vol.
    pub fn premiums(&self, spot: f64, risk_free_rate: f64, time_to_expiry: f64) -> (f64, f64) {
        let price = |is_call| {
            black_scholes::price(
                spot,
                self.strike_price,
                time_to_expiry,
                risk_free_rate,
                self.implied_vol,
                is_call,
            )
        };
        (price(true), price(false))
    }
}

fn evaluate_validated(
    parameters: &SviParameters,
    strike_price: f64,
    spot: f64,
    time_to_expiry: f64,
) -> Result<SviCurvePoint> {
    let k = log_moneyness(strike_price, spot)?;
    let total_variance = parameters.variance_at(k)?;
    let variance_rate = total_variance / time_to_expiry;
    if variance_rate.is_infinite() {
        return Err(SkewError::DomainError(format!(
            "total variance {} over time to expiry {} is not finite",
            total_variance, time_to_expiry
        )));
    }
    let implied_vol = checked_sqrt(variance_rate, "total variance")?;
    Ok(SviCurvePoint {
        log_moneyness: k,
        strike_price,
        total_variance,
        implied_vol,
    })
}

/// Evaluate the skew at a single strike.
pub fn evaluate(
    parameters: &SviParameters,
    strike_price: f64,
    spot: f64,
    time_to_expiry: f64,
) -> Result<SviCurvePoint> {
    parameters.validate()?;
    require_time(time_to_expiry)?;
    evaluate_validated(parameters, strike_price, spot, time_to_expiry)
}

/// Evaluate the skew at each strike, preserving input order.
pub fn evaluate_curve(
    parameters: &SviParameters,
    strikes: &[f64],
    spot: f64,
    time_to_expiry: f64,
) -> Result<Vec<SviCurvePoint>> {
    parameters.validate()?;
    require_time(time_to_expiry)?;
    strikes
        .iter()
        .map(|&strike| evaluate_validated(parameters, strike, spot, time_to_expiry))
        .collect()
}

/// Where to sample a curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StrikeGrid {
    Strikes { strikes: Vec<f64> },
    StrikeRange { min: f64, max: f64, steps: usize },
    LogMoneynessRange { min: f64, max: f64, steps: usize },
}

fn linspace(min: f64, max: f64, steps: usize) -> Result<Array1<f64>> {
    if steps < 2 || !min.is_finite() || !max.is_finite() || min >= max {
        return Err(SkewError::ParameterError(format!(
            "range needs min < max and at least 2 steps, got [{}, {}] x {}",
            min, max, steps
        )));
    }
    Ok(Array1::linspace(min, max, steps))
}

impl StrikeGrid {
    /// Observed log-moneyness extent padded by [`LOG_MONEYNESS_PADDING`].
    pub fn around_log_moneyness(extent: Extent) -> Self {
        let padded = extent.widen(LOG_MONEYNESS_PADDING);
        StrikeGrid::LogMoneynessRange {
            min: padded.min,
            max: padded.max,
            steps: DEFAULT_CURVE_STEPS,
        }
    }

    /// Concrete strikes; ranges come out ascending.
    pub fn strikes(&self, spot: f64) -> Result<Vec<f64>> {
        match self {
            StrikeGrid::Strikes { strikes } => Ok(strikes.clone()),
            StrikeGrid::StrikeRange { min, max, steps } => {
                Ok(linspace(*min, *max, *steps)?.to_vec())
            }
            StrikeGrid::LogMoneynessRange { min, max, steps } => {
                // k = ln(S/K) so strikes fall as k rises
                let grid = linspace(*min, *max, *steps)?;
                Ok(grid.iter().rev().map(|k| spot * (-k).exp()).collect())
            }
        }
    }
}

/// A complete curve request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SviCurveQuery {
    pub parameters: SviParameters,
    pub strikes: StrikeGrid,
    pub spot: f64,
    pub time_to_expiry: f64,
}

impl SviCurveQuery {
    pub fn evaluate(&self) -> Result<Vec<SviCurvePoint>> {
        let strikes = self.strikes.strikes(self.spot)?;
        evaluate_curve(&self.parameters, &strikes, self.spot, self.time_to_expiry)
    }
}

/// Keeps the currently displayed curve, recomputing only when the query or
/// the x axis changes.
#[derive(Debug, Default)]
pub struct CurveMemo {
    key: Option<(SviCurveQuery, AxisField)>,
    points: Vec<SviCurvePoint>,
}

impl CurveMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(
        &mut self,
        query: &SviCurveQuery,
        axis: AxisField,
    ) -> Result<&[SviCurvePoint]> {
        let fresh = matches!(&self.key, Some((q, a)) if q == query && *a == axis);
        if !fresh {
            trace!("Recomputing SVI curve for {:?} on {:?}", query.parameters, axis);
            // On failure the previous curve is dropped rather than shown stale.
            self.key = None;
            self.points = query.evaluate()?;
            self.key = Some((query.clone(), axis));
        }
        Ok(&self.points)
    }
}
