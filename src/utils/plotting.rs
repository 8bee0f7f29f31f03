use crate::error::{Result, SkewError};
use crate::models::{AxisField, OptionChain, OptionSide, SviCurvePoint};
use crate::utils::resolver::{collect_points, ProjectedPoint, SkewPoint, SkewProjection};
use plotters::backend::BitMapBackend;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;
use tracing::debug;

const CALL_FILL: RGBColor = RGBColor(0x25, 0x63, 0xeb);
const CALL_STROKE: RGBColor = RGBColor(0x1d, 0x4e, 0xd8);
const PUT_FILL: RGBColor = RGBColor(0xdc, 0x26, 0x26);
const PUT_STROKE: RGBColor = RGBColor(0xb9, 0x1c, 0x1c);
const CURVE_COLOR: RGBColor = RGBColor(0x22, 0xc5, 0x5e);
const POINT_RADIUS: i32 = 5;
const TICK_LENGTH: i32 = 6;

/// Canvas size and the margins around the plot area, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartDimensions {
    pub width: u32,
    pub height: u32,
    pub margin_top: u32,
    pub margin_right: u32,
    pub margin_bottom: u32,
    pub margin_left: u32,
    /// Tick labels, axis titles and tooltip text. Needs a system font.
    pub labels: bool,
}

impl Default for ChartDimensions {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            margin_top: 20,
            margin_right: 20,
            margin_bottom: 20,
            margin_left: 20,
            labels: true,
        }
    }
}

impl ChartDimensions {
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn x_range(&self) -> (f64, f64) {
        (
            self.margin_left as f64,
            self.width.saturating_sub(self.margin_right) as f64,
        )
    }

    /// Screen y grows downward, so the range runs bottom to top.
    pub fn y_range(&self) -> (f64, f64) {
        (
            self.height.saturating_sub(self.margin_bottom) as f64,
            self.margin_top as f64,
        )
    }
}

/// Scales for a skew chart. Domains follow the valid quotes; the curve is
/// used only when the chain has none.
pub fn skew_projection(
    chain: &OptionChain,
    curve: &[SviCurvePoint],
    x_field: AxisField,
    dims: &ChartDimensions,
) -> Result<SkewProjection> {
    let quotes = collect_points(chain.quotes(), &[]);
    let basis = if quotes.is_empty() {
        collect_points([], curve)
    } else {
        quotes
    };
    SkewProjection::fit(&basis, x_field, dims.x_range(), dims.y_range())
}

fn plot_err<E: std::fmt::Display>(e: E) -> SkewError {
    SkewError::PlotError(e.to_string())
}

fn px(value: f64) -> i32 {
    value.round() as i32
}

fn draw_skew<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    chain: &OptionChain,
    curve: &[SviCurvePoint],
    x_field: AxisField,
    dims: &ChartDimensions,
    projection: &SkewProjection,
    highlight: Option<&ProjectedPoint>,
) -> Result<()> {
    root.fill(&WHITE).map_err(plot_err)?;

    let (x0, x1) = dims.x_range();
    let (y0, y1) = dims.y_range();
    let axis_y = px(y0);
    let axis_x = px(x0);
    root.draw(&PathElement::new(vec![(axis_x, axis_y), (px(x1), axis_y)], BLACK))
        .map_err(plot_err)?;
    root.draw(&PathElement::new(vec![(axis_x, axis_y), (axis_x, px(y1))], BLACK))
        .map_err(plot_err)?;

    let font = ("sans-serif", 12).into_font();
    for tick in projection.x.ticks(crate::utils::scale::DEFAULT_TICK_COUNT) {
        let x = px(tick.pixel);
        root.draw(&PathElement::new(vec![(x, axis_y), (x, axis_y + TICK_LENGTH)], BLACK))
            .map_err(plot_err)?;
        if dims.labels {
            let style = font.clone().color(&BLACK).pos(Pos::new(HPos::Center, VPos::Top));
            root.draw(&Text::new(tick.label, (x, axis_y + TICK_LENGTH + 2), style))
                .map_err(plot_err)?;
        }
    }
    for tick in projection.y.ticks(crate::utils::scale::DEFAULT_TICK_COUNT) {
        let y = px(tick.pixel);
        root.draw(&PathElement::new(vec![(axis_x - TICK_LENGTH, y), (axis_x, y)], BLACK))
            .map_err(plot_err)?;
        if dims.labels {
            let style = font.clone().color(&BLACK).pos(Pos::new(HPos::Right, VPos::Center));
            root.draw(&Text::new(tick.label, (axis_x - TICK_LENGTH - 4, y), style))
                .map_err(plot_err)?;
        }
    }

    if dims.labels {
        let title = ("sans-serif", 14).into_font().style(FontStyle::Bold);
        root.draw(&Text::new(
            x_field.label(),
            (dims.width as i32 / 2, dims.height as i32 - 5),
            title.clone().color(&BLACK).pos(Pos::new(HPos::Center, VPos::Bottom)),
        ))
        .map_err(plot_err)?;
        root.draw(&Text::new(
            "Implied Volatility",
            (15, dims.height as i32 / 2),
            title
                .transform(FontTransform::Rotate270)
                .color(&BLACK)
                .pos(Pos::new(HPos::Center, VPos::Center)),
        ))
        .map_err(plot_err)?;
    }

    for (side, fill, stroke) in [
        (OptionSide::Call, CALL_FILL, CALL_STROKE),
        (OptionSide::Put, PUT_FILL, PUT_STROKE),
    ] {
        for quote in chain.side(side).iter().filter(|q| q.is_valid()) {
            let p = projection.project(&SkewPoint::Quote(quote), x_field);
            let center = (px(p.x_pos), px(p.y_pos));
            root.draw(&Circle::new(center, POINT_RADIUS, fill.mix(0.8).filled()))
                .map_err(plot_err)?;
            root.draw(&Circle::new(center, POINT_RADIUS, stroke.stroke_width(1)))
                .map_err(plot_err)?;
        }
    }

    let path: Vec<(i32, i32)> = curve
        .iter()
        .map(|c| projection.project(&SkewPoint::Curve(c), x_field))
        .filter(|p| p.x_pos.is_finite() && p.y_pos.is_finite())
        .map(|p| (px(p.x_pos), px(p.y_pos)))
        .collect();
    if path.len() > 1 {
        root.draw(&PathElement::new(path, CURVE_COLOR.stroke_width(2)))
            .map_err(plot_err)?;
    }

    if let Some(point) = highlight {
        let center = (px(point.x_pos), px(point.y_pos));
        root.draw(&PathElement::new(
            vec![(center.0, px(y0)), (center.0, px(y1))],
            BLACK.mix(0.3),
        ))
        .map_err(plot_err)?;
        root.draw(&Circle::new(center, POINT_RADIUS + 3, BLACK.stroke_width(2)))
            .map_err(plot_err)?;

        if dims.labels {
            let style = ("sans-serif", 12).into_font().color(&BLACK);
            for (i, (label, value)) in point.tooltip_rows().into_iter().enumerate() {
                root.draw(&Text::new(
                    format!("{}: {}", label, value),
                    (center.0 + 12, center.1 + 12 + 14 * i as i32),
                    style.clone(),
                ))
                .map_err(plot_err)?;
            }
        }
    }

    root.present().map_err(plot_err)?;
    Ok(())
}

/// Render the skew chart to a PNG file.
pub fn plot_skew<P: AsRef<Path>>(
    chain: &OptionChain,
    curve: &[SviCurvePoint],
    x_field: AxisField,
    dims: &ChartDimensions,
    highlight: Option<&ProjectedPoint>,
    output_path: P,
) -> Result<()> {
    let output_path = output_path.as_ref();
    let projection = skew_projection(chain, curve, x_field, dims)?;
    {
        let root = BitMapBackend::new(output_path, (dims.width, dims.height)).into_drawing_area();
        draw_skew(&root, chain, curve, x_field, dims, &projection, highlight)?;
    }
    debug!("Skew chart written to {}", output_path.display());
    Ok(())
}

/// Render the skew chart into an RGB buffer of `width * height * 3` bytes.
pub fn plot_skew_in_memory(
    chain: &OptionChain,
    curve: &[SviCurvePoint],
    x_field: AxisField,
    dims: &ChartDimensions,
    highlight: Option<&ProjectedPoint>,
) -> Result<Vec<u8>> {
    let projection = skew_projection(chain, curve, x_field, dims)?;
    let mut buffer = vec![0u8; dims.width as usize * dims.height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (dims.width, dims.height)).into_drawing_area();
        draw_skew(&root, chain, curve, x_field, dims, &projection, highlight)?;
    }
    Ok(buffer)
}
