//! End-to-end checks over a small BTC chain: normalize, sample an SVI curve
//! over the observed window, project, resolve and export.

use approx::assert_abs_diff_eq;
use volskew::models::arbitrage::{check_calendar, check_slice};
use volskew::models::{AxisField, CurveMemo, OptionChain, StrikeGrid, SviCurveQuery, SviParameters};
use volskew::utils::polars_utils::{
    chain_to_dataframe, curve_with_premiums_to_dataframe, read_parquet, write_parquet,
};
use volskew::utils::{collect_points, plot_skew, resolve, skew_projection, ChartDimensions, SkewPoint};
use volskew::SkewError;

const CHAIN: &str = r#"{
    "C": [
        {"symbol": "BTC-250524-104000-C", "strikePrice": "104000.00000000", "spotPrice": "107023.53000000",
         "markPrice": "3450.2", "markIV": "0.5010", "riskFreeRate": "0.065", "timeToExpiry": 0.0009, "daysToExpiry": 0.33},
        {"symbol": "BTC-250524-96000-C", "strikePrice": "96000.00000000", "spotPrice": "107023.53000000",
         "markPrice": "11054.1", "markIV": "1.0994", "riskFreeRate": "0.065", "timeToExpiry": 0.0009, "daysToExpiry": 0.33},
        {"symbol": "BTC-250524-110000-C", "strikePrice": "110000.00000000", "spotPrice": "107023.53000000",
         "markPrice": "5.0", "markIV": "0.4620", "riskFreeRate": "0.065", "timeToExpiry": 0.0009, "daysToExpiry": 0.33},
        {"symbol": "BTC-250524-104000-C", "strikePrice": "104000", "spotPrice": "107023.53",
         "markPrice": "3449.0", "markIV": "0.5000", "riskFreeRate": "0.065", "timeToExpiry": 0.0009, "daysToExpiry": 0.33}
    ],
    "P": [
        {"symbol": "BTC-250524-100000-P", "strikePrice": "100000", "spotPrice": "107023.53",
         "markPrice": "12.5", "markIV": "0.7100", "riskFreeRate": "0.065", "timeToExpiry": 0.0009, "daysToExpiry": 0.33},
        {"symbol": "BTC-250524-broken-P", "strikePrice": "n/a", "spotPrice": "107023.53",
         "markIV": "0.7", "timeToExpiry": 0.0009}
    ]
}"#;

fn chain() -> OptionChain {
    OptionChain::from_json(CHAIN).unwrap()
}

fn parameters() -> SviParameters {
    SviParameters::Raw { a: 0.0001, b: 0.002, rho: -0.2, m: 0.0, sigma: 0.02 }
}

fn window_query(chain: &OptionChain) -> SviCurveQuery {
    let reference = chain.reference().unwrap();
    SviCurveQuery {
        parameters: parameters(),
        strikes: StrikeGrid::around_log_moneyness(chain.extents().log_moneyness.unwrap()),
        spot: reference.spot,
        time_to_expiry: reference.time_to_expiry,
    }
}

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("volskew-{}-{}", std::process::id(), name))
}

#[test]
fn chain_document_is_normalized() {
    let chain = chain();
    let strikes: Vec<f64> = chain.calls().iter().map(|q| q.strike_price).collect();
    assert_eq!(strikes, vec![96000.0, 104000.0, 110000.0]);
    // the later 104000 record wins
    assert_eq!(chain.calls()[1].mark_iv, 0.5);

    assert_eq!(chain.puts().len(), 2);
    assert!(chain.puts()[1].strike_price.is_nan());
    assert!(!chain.puts()[1].is_valid());

    let q = &chain.calls()[0];
    assert_abs_diff_eq!(q.moneyness, 107023.53 / 96000.0, epsilon = 1e-12);
    assert_abs_diff_eq!(q.log_moneyness, (107023.53f64 / 96000.0).ln(), epsilon = 1e-12);
    assert!(q.bsm_price > 0.0);
    assert!(chain.quotes().all(|q| q.symbol_agrees()));
}

#[test]
fn curve_spans_the_padded_window() {
    let chain = chain();
    let observed = chain.extents().log_moneyness.unwrap();
    let curve = window_query(&chain).evaluate().unwrap();

    assert_eq!(curve.len(), 100);
    for pair in curve.windows(2) {
        assert!(pair[0].strike_price < pair[1].strike_price);
    }
    let ks: Vec<f64> = curve.iter().map(|p| p.log_moneyness).collect();
    let lowest = ks.iter().cloned().fold(f64::INFINITY, f64::min);
    let highest = ks.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    assert_abs_diff_eq!(lowest, observed.min - 0.1, epsilon = 1e-9);
    assert_abs_diff_eq!(highest, observed.max + 0.1, epsilon = 1e-9);
}

#[test]
fn memo_recomputes_only_on_change() {
    let chain = chain();
    let query = window_query(&chain);
    let mut memo = CurveMemo::new();

    let first = memo.get_or_compute(&query, AxisField::LogMoneyness).unwrap().to_vec();
    let again = memo.get_or_compute(&query, AxisField::LogMoneyness).unwrap().to_vec();
    assert_eq!(first, again);

    let mut shifted = query.clone();
    shifted.parameters = SviParameters::Raw { a: 0.0002, b: 0.002, rho: -0.2, m: 0.0, sigma: 0.02 };
    let changed = memo.get_or_compute(&shifted, AxisField::LogMoneyness).unwrap();
    assert!(changed[0].total_variance > first[0].total_variance);
}

#[test]
fn hover_resolves_nearest_curve_point() {
    let chain = chain();
    let curve = window_query(&chain).evaluate().unwrap();
    let dims = ChartDimensions::default();
    let projection = skew_projection(&chain, &curve, AxisField::LogMoneyness, &dims).unwrap();
    let candidates = collect_points([], &curve);

    let cursor = 500.0;
    let hit = resolve(cursor, AxisField::LogMoneyness, &projection, &candidates).unwrap();
    let target = projection.x.inverse(cursor);
    let hit_k = hit.log_moneyness.unwrap();
    for p in &curve {
        assert!((p.log_moneyness - target).abs() >= (hit_k - target).abs());
    }
    assert_abs_diff_eq!(hit.x_pos, projection.x.forward(hit_k), epsilon = 1e-9);
    assert!(hit.symbol.is_none());
    assert!(hit.implied_volatility.is_some());

    assert!(matches!(
        resolve(cursor, AxisField::LogMoneyness, &projection, &[]),
        Err(SkewError::EmptyCandidates)
    ));
}

#[test]
fn hover_over_quotes_reports_quote_fields() {
    let chain = chain();
    let dims = ChartDimensions::default();
    let projection = skew_projection(&chain, &[], AxisField::StrikePrice, &dims).unwrap();
    let candidates = collect_points(chain.quotes(), &[]);
    // the broken put is filtered out
    assert_eq!(candidates.len(), 4);

    let at_100k = projection.x.forward(100000.0);
    let hit = resolve(at_100k + 1.0, AxisField::StrikePrice, &projection, &candidates).unwrap();
    assert_eq!(hit.symbol.as_deref(), Some("BTC-250524-100000-P"));

    let rows = hit.tooltip_rows();
    assert_eq!(rows[0], ("Option", "BTC-250524-100000-P".to_string()));
    assert_eq!(rows[1], ("Strike", "$100000.00".to_string()));
    assert_eq!(rows[2], ("Premium", "$12.50".to_string()));
    assert_eq!(rows[3], ("Implied Vol", "71.00%".to_string()));

    let json = serde_json::to_value(&hit).unwrap();
    assert_eq!(json["markIV"], 0.71);
    assert!(json.get("impliedVolatility").is_none());
}

#[test]
fn slices_are_diagnosed() {
    let chain = chain();
    let observed = chain.extents().log_moneyness.unwrap();
    assert!(check_slice(&parameters(), observed).unwrap().is_free());

    let near = SviParameters::Raw { a: 0.0001, b: 0.002, rho: -0.2, m: 0.0, sigma: 0.02 };
    let far = SviParameters::Raw { a: 0.0004, b: 0.004, rho: -0.2, m: 0.0, sigma: 0.02 };
    assert!(check_calendar(0.0009, &near, 0.02, &far).unwrap().is_free());
    assert!(!check_calendar(0.0009, &far, 0.02, &near).unwrap().is_free());
}

#[test]
fn chain_exports_to_parquet() {
    let chain = chain();
    let df = chain_to_dataframe(&chain).unwrap();
    let path = temp_path("chain.parquet");
    write_parquet(&df, &path).unwrap();
    let loaded = read_parquet(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.height(), 5);
    assert_eq!(loaded.get_column_names(), df.get_column_names());
}

#[test]
fn curve_exports_with_premiums_at_chain_rate() {
    let chain = chain();
    let reference = chain.reference().unwrap();
    assert_abs_diff_eq!(reference.risk_free_rate, 0.065);

    let curve = window_query(&chain).evaluate().unwrap();
    let df = curve_with_premiums_to_dataframe(&curve, &reference).unwrap();
    let path = temp_path("svi_curve.parquet");
    write_parquet(&df, &path).unwrap();
    let loaded = read_parquet(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.height(), 100);
    let strikes = loaded.column("strike_price").unwrap().f64().unwrap();
    let calls = loaded.column("call_premium").unwrap().f64().unwrap();
    let puts = loaded.column("put_premium").unwrap().f64().unwrap();
    let discount = (-reference.risk_free_rate * reference.time_to_expiry).exp();
    for i in [0, 50, 99] {
        let parity = reference.spot - strikes.get(i).unwrap() * discount;
        assert_abs_diff_eq!(calls.get(i).unwrap() - puts.get(i).unwrap(), parity, epsilon = 1e-6);
    }
}

#[test]
fn chart_is_written_to_disk() {
    let chain = chain();
    let curve = window_query(&chain).evaluate().unwrap();
    let dims = ChartDimensions { labels: false, ..ChartDimensions::with_size(320, 240) };
    let projection = skew_projection(&chain, &curve, AxisField::Moneyness, &dims).unwrap();
    let highlight = projection.project(&SkewPoint::Curve(&curve[50]), AxisField::Moneyness);

    let path = temp_path("skew.png");
    plot_skew(&chain, &curve, AxisField::Moneyness, &dims, Some(&highlight), &path).unwrap();
    let size = std::fs::metadata(&path).unwrap().len();
    std::fs::remove_file(&path).ok();
    assert!(size > 0);
}
