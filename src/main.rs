//! volskew command line tool
//!
//! Reads an option chain document and an optional SVI curve document, then:
//! 1. Normalizes the chain and exports it (with a per-side summary) to Parquet
//! 2. Checks the SVI slice for static arbitrage and samples the curve
//! 3. Renders the skew chart to PNG
//! 4. Resolves the tooltip under a configured cursor position

use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use volskew::config::Config;
use volskew::error::{Result, SkewError};
use volskew::models::arbitrage::check_slice;
use volskew::models::{ChainReference, CurveMemo, Extent, OptionChain, StrikeGrid, SviCurvePoint, SviCurveQuery, SviParameters};
use volskew::utils::polars_utils::{
    chain_to_dataframe, curve_with_premiums_to_dataframe, summarize_chain, write_parquet,
};
use volskew::utils::{collect_points, plot_skew, resolve, skew_projection, ProjectedPoint};

/// Curve document. Anything left out is taken from the chain.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurveDocument {
    parameters: SviParameters,
    strikes: Option<StrikeGrid>,
    spot: Option<f64>,
    time_to_expiry: Option<f64>,
    risk_free_rate: Option<f64>,
}

impl CurveDocument {
    /// Query plus the pricing inputs its premiums are exported at.
    fn into_query(self, chain: &OptionChain) -> Result<(SviCurveQuery, ChainReference)> {
        let reference = chain.reference();
        let spot = self.spot.or(reference.map(|r| r.spot));
        let time_to_expiry = self.time_to_expiry.or(reference.map(|r| r.time_to_expiry));
        let risk_free_rate = self
            .risk_free_rate
            .or(reference.map(|r| r.risk_free_rate))
            .unwrap_or(0.0);
        let (Some(spot), Some(time_to_expiry)) = (spot, time_to_expiry) else {
            return Err(SkewError::ConfigError(
                "curve document needs spot and timeToExpiry when the chain has no valid quote".to_string(),
            ));
        };

        let strikes = match self.strikes {
            Some(grid) => grid,
            None => {
                let observed = chain.extents().log_moneyness.ok_or_else(|| {
                    SkewError::ConfigError("curve document needs strikes when the chain has no log-moneyness".to_string())
                })?;
                StrikeGrid::around_log_moneyness(observed)
            }
        };

        let query = SviCurveQuery {
            parameters: self.parameters,
            strikes,
            spot,
            time_to_expiry,
        };
        let pricing = ChainReference {
            spot,
            time_to_expiry,
            risk_free_rate,
        };
        Ok((query, pricing))
    }
}

fn load_chain(path: &Path) -> Result<OptionChain> {
    let json = fs::read_to_string(path)?;
    let chain = OptionChain::from_json(&json)?;
    let invalid = chain.quotes().filter(|q| !q.is_valid()).count();
    for quote in chain.quotes().filter(|q| !q.symbol_agrees()) {
        warn!(
            "Symbol {} disagrees with quoted {} strike {}",
            quote.symbol, quote.side, quote.strike_price
        );
    }
    info!(
        "Loaded {} calls and {} puts from {} ({} invalid)",
        chain.calls().len(),
        chain.puts().len(),
        path.display(),
        invalid
    );
    Ok(chain)
}

fn run_diagnostics(query: &SviCurveQuery, observed: Option<Extent>) -> Result<()> {
    if let Ok(wings) = query.parameters.to_jump_wings(query.time_to_expiry) {
        debug!("Jump-wings: {:?}", wings);
    }

    let observed = observed.unwrap_or(Extent { min: -0.5, max: 0.5 });
    let report = check_slice(&query.parameters, observed)?;
    if report.is_free() {
        info!("SVI slice passed static arbitrage checks");
    } else {
        for issue in &report.issues {
            warn!("Arbitrage check: {:?}", issue);
        }
    }
    Ok(())
}

fn export(
    chain: &OptionChain,
    curve: &[SviCurvePoint],
    pricing: Option<&ChainReference>,
    output_dir: &Path,
) -> Result<()> {
    if !chain.is_empty() {
        let df = chain_to_dataframe(chain)?;
        let summary = summarize_chain(&df)?;
        info!("Chain summary:\n{}", summary);
        write_parquet(&df, output_dir.join("chain.parquet"))?;
    }
    if let Some(pricing) = pricing.filter(|_| !curve.is_empty()) {
        let df = curve_with_premiums_to_dataframe(curve, pricing)?;
        write_parquet(&df, output_dir.join("svi_curve.parquet"))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let config = Config::from_env()?;
    config.init_logging()?;

    info!("Starting volskew");

    let chain = load_chain(&config.chain_path)?;
    let extents = chain.extents();

    let mut memo = CurveMemo::new();
    let (curve, pricing): (Vec<SviCurvePoint>, Option<ChainReference>) = match &config.curve_path {
        Some(path) => {
            let document: CurveDocument = serde_json::from_str(&fs::read_to_string(path)?)?;
            let (query, pricing) = document.into_query(&chain)?;
            run_diagnostics(&query, extents.log_moneyness)?;
            let points = memo.get_or_compute(&query, config.x_axis)?;
            info!("Sampled {} SVI curve points", points.len());
            (points.to_vec(), Some(pricing))
        }
        None => (Vec::new(), None),
    };

    fs::create_dir_all(&config.output_dir)?;
    export(&chain, &curve, pricing.as_ref(), &config.output_dir)?;

    let dims = config.dimensions();
    let hover: Option<ProjectedPoint> = match config.cursor_x {
        Some(cursor_x) => {
            let projection = skew_projection(&chain, &curve, config.x_axis, &dims)?;
            // hover tracks the curve when one is drawn
            let candidates = if curve.is_empty() {
                collect_points(chain.quotes(), &[])
            } else {
                collect_points([], &curve)
            };
            match resolve(cursor_x, config.x_axis, &projection, &candidates) {
                Ok(point) => {
                    info!("Tooltip at x={}: {}", cursor_x, serde_json::to_string(&point)?);
                    for (label, value) in point.tooltip_rows() {
                        info!("  {}: {}", label, value);
                    }
                    Some(point)
                }
                Err(SkewError::EmptyCandidates) => {
                    warn!("Nothing to resolve at x={}", cursor_x);
                    None
                }
                Err(e) => return Err(e),
            }
        }
        None => None,
    };

    let chart_path = config.output_dir.join("skew.png");
    plot_skew(&chain, &curve, config.x_axis, &dims, hover.as_ref(), &chart_path)?;
    info!("Skew chart saved to {}", chart_path.display());

    Ok(())
}
