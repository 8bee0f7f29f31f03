use crate::error::{Result, SkewError};
use crate::models::{ChainReference, OptionChain, SviCurvePoint};
use polars::prelude::*;
use std::path::Path;
use tracing::debug;

/// Convert a normalized chain to a Polars DataFrame, calls first
pub fn chain_to_dataframe(chain: &OptionChain) -> Result<DataFrame> {
    if chain.is_empty() {
        return Err(SkewError::Other("Cannot create DataFrame from an empty chain".to_string()));
    }

    let n = chain.len();
    let mut symbols = Vec::with_capacity(n);
    let mut sides = Vec::with_capacity(n);
    let mut strikes = Vec::with_capacity(n);
    let mut spots = Vec::with_capacity(n);
    let mut mark_prices = Vec::with_capacity(n);
    let mut bsm_prices = Vec::with_capacity(n);
    let mut mark_ivs = Vec::with_capacity(n);
    let mut moneyness = Vec::with_capacity(n);
    let mut log_moneyness = Vec::with_capacity(n);
    let mut rates = Vec::with_capacity(n);
    let mut expiries = Vec::with_capacity(n);
    let mut days = Vec::with_capacity(n);
    let mut valid = Vec::with_capacity(n);

    for quote in chain.quotes() {
        symbols.push(quote.symbol.as_str());
        sides.push(quote.side.to_string());
        strikes.push(quote.strike_price);
        spots.push(quote.spot_price);
        mark_prices.push(quote.mark_price);
        bsm_prices.push(quote.bsm_price);
        mark_ivs.push(quote.mark_iv);
        moneyness.push(quote.moneyness);
        log_moneyness.push(quote.log_moneyness);
        rates.push(quote.risk_free_rate);
        expiries.push(quote.time_to_expiry);
        days.push(quote.days_to_expiry);
        valid.push(quote.is_valid());
    }

    let df = DataFrame::new(vec![
        Series::new("symbol", symbols),
        Series::new("side", sides),
        Series::new("strike_price", strikes),
        Series::new("spot_price", spots),
        Series::new("mark_price", mark_prices),
        Series::new("bsm_price", bsm_prices),
        Series::new("mark_iv", mark_ivs),
        Series::new("moneyness", moneyness),
        Series::new("log_moneyness", log_moneyness),
        Series::new("risk_free_rate", rates),
        Series::new("time_to_expiry", expiries),
        Series::new("days_to_expiry", days),
        Series::new("valid", valid),
    ])?;

    Ok(df)
}

/// Convert sampled curve points to a DataFrame
pub fn curve_to_dataframe(points: &[SviCurvePoint]) -> Result<DataFrame> {
    if points.is_empty() {
        return Err(SkewError::Other("Cannot create DataFrame from an empty curve".to_string()));
    }

    let df = DataFrame::new(curve_columns(points))?;

    Ok(df)
}

fn curve_columns(points: &[SviCurvePoint]) -> Vec<Series> {
    vec![
        Series::new("log_moneyness", points.iter().map(|p| p.log_moneyness).collect::<Vec<_>>()),
        Series::new("strike_price", points.iter().map(|p| p.strike_price).collect::<Vec<_>>()),
        Series::new("total_variance", points.iter().map(|p| p.total_variance).collect::<Vec<_>>()),
        Series::new("implied_vol", points.iter().map(|p| p.implied_vol).collect::<Vec<_>>()),
    ]
}

/// Curve frame with Black-Scholes `call_premium` and `put_premium` columns
/// priced at each point's implied vol against `pricing`
pub fn curve_with_premiums_to_dataframe(
    points: &[SviCurvePoint],
    pricing: &ChainReference,
) -> Result<DataFrame> {
    if points.is_empty() {
        return Err(SkewError::Other("Cannot create DataFrame from an empty curve".to_string()));
    }

    let (calls, puts): (Vec<f64>, Vec<f64>) = points
        .iter()
        .map(|p| p.premiums(pricing.spot, pricing.risk_free_rate, pricing.time_to_expiry))
        .unzip();
    debug!(
        "Pricing {} curve points at spot {} rate {} T {}",
        points.len(),
        pricing.spot,
        pricing.risk_free_rate,
        pricing.time_to_expiry
    );

    let mut columns = curve_columns(points);
    columns.push(Series::new("call_premium", calls));
    columns.push(Series::new("put_premium", puts));
    let df = DataFrame::new(columns)?;

    Ok(df)
}

/// Read curve points back from a frame produced by [`curve_to_dataframe`]
pub fn dataframe_to_curve(df: &DataFrame) -> Result<Vec<SviCurvePoint>> {
    let log_moneyness = df.column("log_moneyness")?.f64()?;
    let strikes = df.column("strike_price")?.f64()?;
    let variances = df.column("total_variance")?.f64()?;
    let vols = df.column("implied_vol")?.f64()?;

    let points = (0..df.height())
        .map(|i| SviCurvePoint {
            log_moneyness: log_moneyness.get(i).unwrap_or(f64::NAN),
            strike_price: strikes.get(i).unwrap_or(f64::NAN),
            total_variance: variances.get(i).unwrap_or(f64::NAN),
            implied_vol: vols.get(i).unwrap_or(f64::NAN),
        })
        .collect();

    Ok(points)
}

/// Per-side statistics over the valid quotes of a chain frame
pub fn summarize_chain(df: &DataFrame) -> Result<DataFrame> {
    let summary = df
        .clone()
        .lazy()
        .filter(col("valid"))
        .group_by([col("side")])
        .agg([
            col("symbol").count().alias("quotes"),
            col("mark_iv").mean().alias("mean_mark_iv"),
            col("mark_iv").min().alias("min_mark_iv"),
            col("mark_iv").max().alias("max_mark_iv"),
            col("log_moneyness").min().alias("min_log_moneyness"),
            col("log_moneyness").max().alias("max_log_moneyness"),
            (col("mark_price") - col("bsm_price")).mean().alias("mean_price_residual"),
        ])
        .sort("side", Default::default())
        .collect()?;

    Ok(summary)
}

/// Write a DataFrame to disk in Parquet format
pub fn write_parquet<P: AsRef<Path>>(df: &DataFrame, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)?;

    let mut df_mut = df.clone();
    ParquetWriter::new(file).finish(&mut df_mut)?;
    debug!("Wrote {} rows to {}", df.height(), path.display());

    Ok(())
}

/// Load a DataFrame from a Parquet file
pub fn read_parquet<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SkewError::Other(format!("Parquet file not found: {}", path.display())));
    }

    let df = LazyFrame::scan_parquet(path, Default::default())?.collect()?;
    Ok(df)
}
