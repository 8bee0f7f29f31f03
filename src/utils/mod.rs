pub mod black_scholes;
pub mod plotting;
pub mod polars_utils;
pub mod resolver;
pub mod scale;

pub use plotting::{plot_skew, plot_skew_in_memory, skew_projection, ChartDimensions};
pub use resolver::{collect_points, nearest_index, nearest_sorted, resolve, ProjectedPoint, SkewPoint, SkewProjection};
pub use scale::{build_scale, LinearScale, Tick};
