//! Nearest-point lookup for chart hover
//!
//! Given a cursor position in pixels, [`resolve`] finds the quote or curve
//! sample closest along the x axis and returns it with its screen position.

use crate::error::{Result, SkewError};
use crate::models::{AxisField, OptionQuote, SviCurvePoint};
use crate::utils::scale::{build_scale, LinearScale};
use serde::Serialize;

/// A point that can be drawn on the skew chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkewPoint<'a> {
    Quote(&'a OptionQuote),
    Curve(&'a SviCurvePoint),
}

impl SkewPoint<'_> {
    pub fn x_value(&self, field: AxisField) -> f64 {
        match self {
            SkewPoint::Quote(q) => q.x_value(field),
            SkewPoint::Curve(c) => c.x_value(field),
        }
    }

    /// Implied volatility as a fraction.
    pub fn y_value(&self) -> f64 {
        match self {
            SkewPoint::Quote(q) => q.mark_iv,
            SkewPoint::Curve(c) => c.implied_vol,
        }
    }
}

/// Valid quotes followed by curve samples.
pub fn collect_points<'a>(
    quotes: impl IntoIterator<Item = &'a OptionQuote>,
    curve: &'a [SviCurvePoint],
) -> Vec<SkewPoint<'a>> {
    quotes
        .into_iter()
        .filter(|q| q.is_valid())
        .map(SkewPoint::Quote)
        .chain(curve.iter().map(SkewPoint::Curve))
        .collect()
}

/// The x and y scales of a rendered chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkewProjection {
    pub x: LinearScale,
    pub y: LinearScale,
}

impl SkewProjection {
    pub fn new(x: LinearScale, y: LinearScale) -> Self {
        Self { x, y }
    }

    /// Scales fitted to `points`, x along `x_field` and y by implied vol.
    pub fn fit(
        points: &[SkewPoint<'_>],
        x_field: AxisField,
        x_range: (f64, f64),
        y_range: (f64, f64),
    ) -> Result<Self> {
        let xs: Vec<f64> = points.iter().map(|p| p.x_value(x_field)).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.y_value()).collect();
        Ok(Self {
            x: build_scale(&xs, x_range)?,
            y: build_scale(&ys, y_range)?,
        })
    }

    pub fn project(&self, point: &SkewPoint<'_>, x_field: AxisField) -> ProjectedPoint {
        let x_pos = self.x.forward(point.x_value(x_field));
        let y_pos = self.y.forward(point.y_value());
        match point {
            SkewPoint::Quote(q) => ProjectedPoint {
                symbol: Some(q.symbol.clone()),
                strike_price: finite(q.strike_price),
                mark_price: finite(q.mark_price),
                mark_iv: finite(q.mark_iv),
                implied_volatility: None,
                moneyness: finite(q.moneyness),
                log_moneyness: finite(q.log_moneyness),
                x_pos,
                y_pos,
            },
            SkewPoint::Curve(c) => ProjectedPoint {
                symbol: None,
                strike_price: finite(c.strike_price),
                mark_price: None,
                mark_iv: None,
                implied_volatility: finite(c.implied_vol),
                moneyness: finite(c.moneyness()),
                log_moneyness: finite(c.log_moneyness),
                x_pos,
                y_pos,
            },
        }
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Hover payload: whatever the source point carries, plus its screen position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedPoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strike_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mark_price: Option<f64>,
    #[serde(rename = "markIV", skip_serializing_if = "Option::is_none")]
    pub mark_iv: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implied_volatility: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moneyness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_moneyness: Option<f64>,
    pub x_pos: f64,
    pub y_pos: f64,
}

impl ProjectedPoint {
    /// Label/value rows for a tooltip; absent fields produce no row.
    pub fn tooltip_rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = Vec::new();
        if let Some(symbol) = &self.symbol {
            rows.push(("Option", symbol.clone()));
        }
        if let Some(strike) = self.strike_price {
            rows.push(("Strike", format!("${:.2}", strike)));
        }
        if let Some(premium) = self.mark_price {
            rows.push(("Premium", format!("${:.2}", premium)));
        }
        if let Some(iv) = self.mark_iv.or(self.implied_volatility) {
            rows.push(("Implied Vol", format!("{:.2}%", iv * 100.0)));
        }
        if let Some(m) = self.moneyness {
            rows.push(("Moneyness", format!("{:.3}", m)));
        }
        if let Some(k) = self.log_moneyness {
            rows.push(("Log Moneyness", format!("{:.3}", k)));
        }
        rows
    }
}

/// Index of the value closest to `target`. Ties go to the lowest index and
/// non-finite values are skipped. A non-finite target has no nearest value.
pub fn nearest_index<I>(values: I, target: f64) -> Option<usize>
where
    I: IntoIterator<Item = f64>,
{
    if !target.is_finite() {
        return None;
    }
    let mut best: Option<(usize, f64)> = None;
    for (i, x) in values.into_iter().enumerate() {
        if !x.is_finite() {
            continue;
        }
        let distance = (x - target).abs();
        match best {
            Some((_, d)) if distance >= d => {}
            _ => best = Some((i, distance)),
        }
    }
    best.map(|(i, _)| i)
}

/// Same answer as [`nearest_index`] for ascending `values`, by binary search.
/// Trailing non-finite values are ignored.
pub fn nearest_sorted(values: &[f64], target: f64) -> Option<usize> {
    let len = values.partition_point(|x| x.is_finite());
    let values = &values[..len];
    if values.is_empty() || !target.is_finite() {
        return None;
    }

    let split = values.partition_point(|&x| x < target);
    let first_of_run = |i: usize| values.partition_point(|&x| x < values[i]);
    if split == 0 {
        return Some(0);
    }
    if split == len {
        return Some(first_of_run(len - 1));
    }

    let below = first_of_run(split - 1);
    // values[split] >= target so split already starts its run
    if target - values[below] <= values[split] - target {
        Some(below)
    } else {
        Some(split)
    }
}

/// Resolve a cursor x position (pixels) to the nearest candidate along
/// `x_field`.
pub fn resolve(
    cursor_px: f64,
    x_field: AxisField,
    projection: &SkewProjection,
    candidates: &[SkewPoint<'_>],
) -> Result<ProjectedPoint> {
    if candidates.is_empty() {
        return Err(SkewError::EmptyCandidates);
    }
    let target = projection.x.inverse(cursor_px);
    if !target.is_finite() {
        return Err(SkewError::DomainError(format!(
            "cursor position {} does not map to a finite axis value",
            cursor_px
        )));
    }

    let index = nearest_index(candidates.iter().map(|p| p.x_value(x_field)), target)
        .ok_or(SkewError::EmptyCandidates)?;
    Ok(projection.project(&candidates[index], x_field))
}
