//! # volskew
//!
//! Implied-volatility skews for listed option chains: SVI evaluation, chain
//! normalization, chart projection and hover lookup.
//!
//! ## Features
//!
//! - Raw and natural SVI evaluators with jump-wings conversion
//! - Static no-arbitrage diagnostics for supplied SVI slices
//! - Option chain normalization (fail-soft parsing, moneyness, dedupe, sort)
//! - d3-style linear scales with nice domains and ticks
//! - Nearest-point resolution for tooltips
//! - PNG skew charts and Parquet export
//! - Environment-based configuration
//!
//! ## Example
//!
//! ```rust
//! use volskew::models::{AxisField, OptionChain, SviCurveQuery, SviParameters, StrikeGrid};
//! use volskew::utils::{collect_points, resolve, skew_projection, ChartDimensions};
//!
//! fn main() -> volskew::Result<()> {
//!     let chain = OptionChain::from_json(r#"{
//!         "C": [{"symbol": "BTC-250524-96000-C", "strikePrice": "96000",
//!                "spotPrice": "100000", "markIV": "0.52", "timeToExpiry": 0.05}],
//!         "P": [{"symbol": "BTC-250524-104000-P", "strikePrice": "104000",
//!                "spotPrice": "100000", "markIV": "0.48", "timeToExpiry": 0.05}]
//!     }"#)?;
//!
//!     let query = SviCurveQuery {
//!         parameters: SviParameters::Raw { a: 0.01, b: 0.1, rho: -0.3, m: 0.0, sigma: 0.2 },
//!         strikes: StrikeGrid::StrikeRange { min: 90000.0, max: 110000.0, steps: 50 },
//!         spot: 100000.0,
//!         time_to_expiry: 0.05,
//!     };
//!     let curve = query.evaluate()?;
//!
//!     let dims = ChartDimensions::default();
//!     let projection = skew_projection(&chain, &curve, AxisField::LogMoneyness, &dims)?;
//!     let hit = resolve(512.0, AxisField::LogMoneyness, &projection, &collect_points([], &curve))?;
//!     println!("{:?}", hit.tooltip_rows());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, SkewError};
