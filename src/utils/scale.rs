//! Linear axis scales
//!
//! A [`LinearScale`] maps a numeric domain onto a pixel range and back. The
//! domain is "niced" the way d3's `scaleLinear().nice()` does it: bounds are
//! pushed outward to the tick step that ten ticks over the extent would use,
//! so axis ticks land on round numbers.

use crate::error::{Result, SkewError};
use crate::models::Extent;
use serde::{Deserialize, Serialize};

/// Tick count used for niceing and default tick generation.
pub const DEFAULT_TICK_COUNT: usize = 10;
const MAX_NICE_PASSES: usize = 10;

const E10: f64 = 7.0710678118654755; // sqrt(50)
const E5: f64 = 3.1622776601683795; // sqrt(10)
const E2: f64 = std::f64::consts::SQRT_2;

/// Step between ticks. Sub-unit steps are stored as their reciprocal so that
/// tick values come out as `i / n` instead of accumulating `i * 0.1` error.
#[derive(Debug, Clone, Copy, PartialEq)]
enum TickStep {
    Multiple(f64),
    Fraction(f64),
}

/// Tick index range `[i1, i2]` and the step it is measured in.
fn tick_spec(start: f64, stop: f64, count: f64) -> (f64, f64, TickStep) {
    let step = (stop - start) / count.max(0.0);
    let power = step.log10().floor();
    let error = step / 10f64.powf(power);
    let factor = if error >= E10 {
        10.0
    } else if error >= E5 {
        5.0
    } else if error >= E2 {
        2.0
    } else {
        1.0
    };

    let (i1, i2, inc) = if power < 0.0 {
        let inc = 10f64.powf(-power) / factor;
        let mut i1 = (start * inc).round();
        let mut i2 = (stop * inc).round();
        if i1 / inc < start {
            i1 += 1.0;
        }
        if i2 / inc > stop {
            i2 -= 1.0;
        }
        (i1, i2, TickStep::Fraction(inc))
    } else {
        let inc = 10f64.powf(power) * factor;
        let mut i1 = (start / inc).round();
        let mut i2 = (stop / inc).round();
        if i1 * inc < start {
            i1 += 1.0;
        }
        if i2 * inc > stop {
            i2 -= 1.0;
        }
        (i1, i2, TickStep::Multiple(inc))
    };

    if i2 < i1 && (0.5..2.0).contains(&count) {
        return tick_spec(start, stop, count * 2.0);
    }
    (i1, i2, inc)
}

/// Evenly spaced round values within `[start, stop]` (either order).
pub fn ticks(start: f64, stop: f64, count: usize) -> Vec<f64> {
    if count == 0 || !start.is_finite() || !stop.is_finite() {
        return Vec::new();
    }
    if start == stop {
        return vec![start];
    }
    let reverse = stop < start;
    let (lo, hi) = if reverse { (stop, start) } else { (start, stop) };

    let (i1, i2, inc) = tick_spec(lo, hi, count as f64);
    if i1.is_nan() || i2.is_nan() || i2 < i1 {
        return Vec::new();
    }
    let n = (i2 - i1) as usize + 1;
    let mut values: Vec<f64> = (0..n)
        .map(|i| {
            let idx = i1 + i as f64;
            match inc {
                TickStep::Fraction(inc) => idx / inc,
                TickStep::Multiple(inc) => idx * inc,
            }
        })
        .collect();
    if reverse {
        values.reverse();
    }
    values
}

/// Extend `[start, stop]` outward to round tick boundaries.
pub fn nice(start: f64, stop: f64, count: usize) -> (f64, f64) {
    let reverse = stop < start;
    let (mut lo, mut hi) = if reverse { (stop, start) } else { (start, stop) };
    let mut previous: Option<TickStep> = None;

    for _ in 0..MAX_NICE_PASSES {
        let (_, _, step) = tick_spec(lo, hi, count as f64);
        if previous == Some(step) {
            break;
        }
        let (next_lo, next_hi) = match step {
            TickStep::Multiple(inc) if inc > 0.0 && inc.is_finite() => {
                ((lo / inc).floor() * inc, (hi / inc).ceil() * inc)
            }
            TickStep::Fraction(inc) if inc > 0.0 && inc.is_finite() => {
                ((lo * inc).floor() / inc, (hi * inc).ceil() / inc)
            }
            _ => break,
        };
        // rounding outward near f64::MAX can overflow
        if !next_lo.is_finite() || !next_hi.is_finite() {
            break;
        }
        lo = next_lo;
        hi = next_hi;
        previous = Some(step);
    }

    if reverse {
        (hi, lo)
    } else {
        (lo, hi)
    }
}

/// Pad a zero-width extent so the scale has something to divide by.
fn ensure_span(min: f64, max: f64) -> (f64, f64) {
    if max > min {
        return (min, max);
    }
    let pad = if min == 0.0 { 0.5 } else { min.abs() * 0.01 };
    let lo = (min - pad).max(-f64::MAX);
    let hi = (max + pad).min(f64::MAX);
    if hi > lo {
        return (lo, hi);
    }
    // the relative pad underflowed (subnormal input)
    (min - 0.5, max + 0.5)
}

/// One labelled axis tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub value: f64,
    pub label: String,
    pub pixel: f64,
}

/// Linear map between a numeric domain and a pixel range. The range may be
/// inverted (e.g. a y axis growing downward on screen).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearScale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl LinearScale {
    /// Scale over an explicit domain, niced and padded like [`build_scale`].
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Result<Self> {
        let (lo, hi) = (domain.0.min(domain.1), domain.0.max(domain.1));
        if !lo.is_finite() || !hi.is_finite() {
            return Err(SkewError::DomainError(format!(
                "scale domain must be finite, got [{}, {}]",
                domain.0, domain.1
            )));
        }
        if !range.0.is_finite() || !range.1.is_finite() {
            return Err(SkewError::DomainError(format!(
                "pixel range must be finite, got [{}, {}]",
                range.0, range.1
            )));
        }
        let (lo, hi) = ensure_span(lo, hi);
        Ok(Self {
            domain: nice(lo, hi, DEFAULT_TICK_COUNT),
            range,
        })
    }

    pub fn from_extent(extent: Extent, range: (f64, f64)) -> Result<Self> {
        Self::new((extent.min, extent.max), range)
    }

    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    pub fn range(&self) -> (f64, f64) {
        self.range
    }

    /// Domain value → pixel.
    pub fn forward(&self, value: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        r0 + (value - d0) / (d1 - d0) * (r1 - r0)
    }

    /// Pixel → domain value. A zero-width pixel range maps everything to the
    /// domain start.
    pub fn inverse(&self, pixel: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        if r1 == r0 {
            return d0;
        }
        d0 + (pixel - r0) / (r1 - r0) * (d1 - d0)
    }

    pub fn ticks(&self, count: usize) -> Vec<Tick> {
        ticks(self.domain.0, self.domain.1, count)
            .into_iter()
            .map(|value| Tick {
                value,
                label: format!("{:.2}", value),
                pixel: self.forward(value),
            })
            .collect()
    }
}

/// Scale over the finite extent of `values`, projected onto `pixel_range`.
pub fn build_scale(values: &[f64], pixel_range: (f64, f64)) -> Result<LinearScale> {
    let extent = Extent::of(values.iter().copied()).ok_or_else(|| {
        SkewError::DomainError("cannot build a scale from no finite values".to_string())
    })?;
    LinearScale::from_extent(extent, pixel_range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn nice_rounds_outward() {
        assert_eq!(nice(0.13, 0.87, 10), (0.1, 0.9));
        assert_eq!(nice(1.1, 10.7, 10), (1.0, 11.0));
        assert_eq!(nice(-0.23, 0.48, 10), (-0.3, 0.5));
        assert_eq!(nice(96000.0, 130000.0, 10), (95000.0, 130000.0));
    }

    #[test]
    fn ticks_over_unit_interval() {
        let values = ticks(0.0, 1.0, 10);
        assert_eq!(values.len(), 11);
        assert_eq!(values[3], 0.3);
        assert_eq!(values[10], 1.0);
    }

    #[test]
    fn ticks_respect_direction() {
        assert_eq!(ticks(0.0, 10.0, 5), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(ticks(10.0, 0.0, 5), vec![10.0, 8.0, 6.0, 4.0, 2.0, 0.0]);
        assert_eq!(ticks(1.0, 1.0, 10), vec![1.0]);
        assert!(ticks(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn build_scale_nices_the_extent() {
        let scale = build_scale(&[0.87, 0.13, f64::NAN, 0.5], (20.0, 1004.0)).unwrap();
        assert_eq!(scale.domain(), (0.1, 0.9));
        assert_abs_diff_eq!(scale.forward(0.1), 20.0);
        assert_abs_diff_eq!(scale.forward(0.9), 1004.0, epsilon = 1e-9);
        assert_abs_diff_eq!(scale.forward(0.5), 512.0, epsilon = 1e-9);
    }

    #[test]
    fn inverted_range_for_y_axis() {
        let scale = build_scale(&[0.2, 1.0], (748.0, 20.0)).unwrap();
        assert!(scale.forward(1.0) < scale.forward(0.2));
        assert_abs_diff_eq!(scale.inverse(748.0), scale.domain().0, epsilon = 1e-12);
    }

    #[test]
    fn round_trip_within_a_pixel() {
        let scale = build_scale(&[-0.37, 0.21], (20.0, 1004.0)).unwrap();
        for p in [20.0, 33.3, 512.0, 900.1, 1004.0] {
            assert!((scale.forward(scale.inverse(p)) - p).abs() <= 1.0);
        }
    }

    #[test]
    fn zero_width_domain_gets_a_span() {
        let scale = build_scale(&[100.0, 100.0], (0.0, 500.0)).unwrap();
        let (d0, d1) = scale.domain();
        assert!(d1 > d0);
        assert!(d0 <= 100.0 && 100.0 <= d1);
        assert!(scale.forward(100.0).is_finite());

        let zero = build_scale(&[0.0], (0.0, 500.0)).unwrap();
        assert!(zero.domain().1 > zero.domain().0);
    }

    #[test]
    fn subnormal_value_gets_an_absolute_span() {
        let scale = build_scale(&[5e-324], (20.0, 1004.0)).unwrap();
        let (d0, d1) = scale.domain();
        assert!(d0.is_finite() && d1.is_finite());
        assert!(d1 > d0);
        assert!(d0 <= 5e-324 && 5e-324 <= d1);
        assert!(scale.forward(5e-324).is_finite());
        assert!(!scale.ticks(10).is_empty());
    }

    #[test]
    fn extreme_values_keep_a_finite_domain() {
        for v in [f64::MAX, -f64::MAX] {
            let scale = build_scale(&[v], (20.0, 1004.0)).unwrap();
            let (d0, d1) = scale.domain();
            assert!(d0.is_finite() && d1.is_finite(), "domain [{}, {}]", d0, d1);
            assert!(d1 > d0);
            assert!(d0 <= v && v <= d1);
            assert!(scale.forward(v).is_finite());
            assert!(!scale.ticks(10).is_empty());
        }
    }

    #[test]
    fn nice_stops_before_overflowing() {
        let (lo, hi) = nice(f64::MAX * 0.99, f64::MAX, 10);
        assert!(lo.is_finite() && hi.is_finite());
        assert!(hi > lo);
    }

    #[test]
    fn no_finite_values_is_an_error() {
        assert!(matches!(build_scale(&[], (0.0, 1.0)), Err(SkewError::DomainError(_))));
        assert!(build_scale(&[f64::NAN, f64::INFINITY], (0.0, 1.0)).is_err());
    }

    #[test]
    fn zero_width_range_inverts_to_domain_start() {
        let scale = build_scale(&[0.0, 1.0], (50.0, 50.0)).unwrap();
        assert_eq!(scale.inverse(80.0), scale.domain().0);
    }

    #[test]
    fn tick_labels_use_two_decimals() {
        let scale = build_scale(&[0.0, 1.0], (0.0, 100.0)).unwrap();
        let ticks = scale.ticks(5);
        assert_eq!(ticks[1].label, "0.20");
        assert_abs_diff_eq!(ticks[1].pixel, 20.0, epsilon = 1e-9);
    }
}
