//! Option chain normalization
//!
//! Turns raw per-strike quote records into an [`OptionChain`]: one ascending,
//! duplicate-free sequence of quotes per side, plus the domain extents used to
//! build chart scales.

use crate::error::{Result, SkewError};
use crate::models::option::{AxisField, OptionQuote, OptionSide, RawOptionQuote};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Subset of a chain to work with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SideFilter {
    #[serde(rename = "C")]
    Call,
    #[serde(rename = "P")]
    Put,
    #[serde(rename = "A")]
    All,
}

impl SideFilter {
    pub fn includes(&self, side: OptionSide) -> bool {
        match self {
            SideFilter::Call => side == OptionSide::Call,
            SideFilter::Put => side == OptionSide::Put,
            SideFilter::All => true,
        }
    }
}

/// Closed numeric interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min: f64,
    pub max: f64,
}

impl Extent {
    /// Extent of the finite values; `None` if there are none.
    pub fn of<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some(Extent { min: v, max: v }),
                Some(e) => Some(Extent {
                    min: e.min.min(v),
                    max: e.max.max(v),
                }),
            })
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// Extent pushed outward by `pad` on both sides.
    pub fn widen(&self, pad: f64) -> Self {
        Extent {
            min: self.min - pad,
            max: self.max + pad,
        }
    }
}

/// Union extents across both sides of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainExtents {
    pub strike_price: Option<Extent>,
    pub moneyness: Option<Extent>,
    pub log_moneyness: Option<Extent>,
    pub mark_iv: Option<Extent>,
}

impl ChainExtents {
    pub fn x(&self, field: AxisField) -> Option<Extent> {
        match field {
            AxisField::StrikePrice => self.strike_price,
            AxisField::Moneyness => self.moneyness,
            AxisField::LogMoneyness => self.log_moneyness,
        }
    }
}

/// Wire shape of a chain document: `{"C": [...], "P": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawOptionChain {
    #[serde(rename = "C", default)]
    pub calls: Vec<RawOptionQuote>,
    #[serde(rename = "P", default)]
    pub puts: Vec<RawOptionQuote>,
}

/// Calls and puts for one expiry, each ascending by strike with no duplicate
/// strike within a side. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OptionChain {
    #[serde(rename = "C")]
    calls: Vec<OptionQuote>,
    #[serde(rename = "P")]
    puts: Vec<OptionQuote>,
}

/// NaN strikes sort after every real strike.
fn strike_order(a: &OptionQuote, b: &OptionQuote) -> Ordering {
    match (a.strike_price.is_nan(), b.strike_price.is_nan()) {
        (false, false) => a.strike_price.total_cmp(&b.strike_price),
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => Ordering::Equal,
    }
}

fn normalize_side(raw: &[RawOptionQuote], side: OptionSide) -> Vec<OptionQuote> {
    let mut quotes: Vec<OptionQuote> = Vec::with_capacity(raw.len());
    let mut by_strike: HashMap<u64, usize> = HashMap::new();

    for record in raw {
        let quote = OptionQuote::from_raw(record, side);
        if quote.strike_price.is_nan() {
            // No strike to key on; kept so callers can report it as invalid.
            quotes.push(quote);
            continue;
        }
        // -0.0 and 0.0 are the same strike
        let key = (quote.strike_price + 0.0).to_bits();
        match by_strike.get(&key) {
            Some(&idx) => {
                trace!(
                    "Duplicate {} strike {}: {} replaces {}",
                    side,
                    quote.strike_price,
                    quote.symbol,
                    quotes[idx].symbol
                );
                quotes[idx] = quote;
            }
            None => {
                by_strike.insert(key, quotes.len());
                quotes.push(quote);
            }
        }
    }

    quotes.sort_by(strike_order);
    quotes
}

/// Build a chain from separate call and put records.
pub fn normalize(raw_calls: &[RawOptionQuote], raw_puts: &[RawOptionQuote]) -> OptionChain {
    let chain = OptionChain {
        calls: normalize_side(raw_calls, OptionSide::Call),
        puts: normalize_side(raw_puts, OptionSide::Put),
    };

    let invalid = chain.quotes().filter(|q| !q.is_valid()).count();
    debug!(
        "Normalized chain: {} calls, {} puts ({} raw records, {} invalid)",
        chain.calls.len(),
        chain.puts.len(),
        raw_calls.len() + raw_puts.len(),
        invalid
    );

    chain
}

/// Build a chain from one mixed list, taking each record's side from its
/// symbol suffix. Records without a recognizable side are dropped.
pub fn normalize_mixed(raw: &[RawOptionQuote]) -> OptionChain {
    let mut calls = Vec::new();
    let mut puts = Vec::new();

    for record in raw {
        match record.side_from_symbol() {
            Some(OptionSide::Call) => calls.push(record.clone()),
            Some(OptionSide::Put) => puts.push(record.clone()),
            None => warn!("Dropping quote with no side suffix: '{}'", record.symbol),
        }
    }

    normalize(&calls, &puts)
}

impl OptionChain {
    /// Parse and normalize a `{"C": [...], "P": [...]}` document.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawOptionChain = serde_json::from_str(json)
            .map_err(|e| SkewError::ParseError(format!("Invalid option chain document: {}", e)))?;
        Ok(normalize(&raw.calls, &raw.puts))
    }

    pub fn calls(&self) -> &[OptionQuote] {
        &self.calls
    }

    pub fn puts(&self) -> &[OptionQuote] {
        &self.puts
    }

    pub fn side(&self, side: OptionSide) -> &[OptionQuote] {
        match side {
            OptionSide::Call => &self.calls,
            OptionSide::Put => &self.puts,
        }
    }

    /// Calls followed by puts.
    pub fn quotes(&self) -> impl Iterator<Item = &OptionQuote> {
        self.calls.iter().chain(self.puts.iter())
    }

    pub fn filter(&self, filter: SideFilter) -> impl Iterator<Item = &OptionQuote> {
        self.quotes().filter(move |q| filter.includes(q.side))
    }

    pub fn len(&self) -> usize {
        self.calls.len() + self.puts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.puts.is_empty()
    }

    pub fn extents(&self) -> ChainExtents {
        ChainExtents {
            strike_price: Extent::of(self.quotes().map(|q| q.strike_price)),
            moneyness: Extent::of(self.quotes().map(|q| q.moneyness)),
            log_moneyness: Extent::of(self.quotes().map(|q| q.log_moneyness)),
            mark_iv: Extent::of(self.quotes().map(|q| q.mark_iv)),
        }
    }

    /// Pricing inputs shared by the chain, taken from its first valid quote.
    pub fn reference(&self) -> Option<ChainReference> {
        self.quotes().find(|q| q.is_valid()).map(|q| {
            let risk_free_rate = if q.risk_free_rate.is_finite() {
                q.risk_free_rate
            } else {
                trace!("No usable risk-free rate on {}, using 0", q.symbol);
                0.0
            };
            ChainReference {
                spot: q.spot_price,
                time_to_expiry: q.time_to_expiry,
                risk_free_rate,
            }
        })
    }
}

/// Spot, expiry and rate a chain was quoted against. A missing rate reads
/// as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainReference {
    pub spot: f64,
    pub time_to_expiry: f64,
    pub risk_free_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(symbol: &str, strike: f64, iv: f64) -> RawOptionQuote {
        serde_json::from_value(serde_json::json!({
            "symbol": symbol,
            "strikePrice": strike.to_string(),
            "spotPrice": "100",
            "markIV": iv,
            "markPrice": "1.0",
            "riskFreeRate": "0.05",
            "timeToExpiry": 0.5,
            "daysToExpiry": 182.6
        }))
        .unwrap()
    }

    fn strikes(quotes: &[OptionQuote]) -> Vec<f64> {
        quotes.iter().map(|q| q.strike_price).collect()
    }

    #[test]
    fn sorts_each_side_ascending() {
        let chain = normalize(
            &[record("A-1-100-C", 100.0, 0.5), record("A-1-50-C", 50.0, 0.6)],
            &[],
        );
        assert_eq!(strikes(chain.calls()), vec![50.0, 100.0]);
    }

    #[test]
    fn later_duplicate_wins_within_side() {
        let chain = normalize(
            &[
                record("first", 100.0, 0.5),
                record("other", 90.0, 0.4),
                record("second", 100.0, 0.7),
            ],
            &[record("put", 100.0, 0.9)],
        );

        assert_eq!(strikes(chain.calls()), vec![90.0, 100.0]);
        assert_eq!(chain.calls()[1].symbol, "second");
        assert_eq!(chain.calls()[1].mark_iv, 0.7);
        // same strike on the other side is not a duplicate
        assert_eq!(chain.puts().len(), 1);
        assert_eq!(chain.puts()[0].symbol, "put");
    }

    #[test]
    fn nan_strikes_sort_last_and_are_invalid() {
        let mut bad = record("bad", 0.0, 0.5);
        bad.strike_price = Some(crate::models::NumericField::Text("n/a".into()));
        let chain = normalize(&[bad, record("ok", 80.0, 0.5)], &[]);

        assert_eq!(chain.calls()[0].strike_price, 80.0);
        assert!(chain.calls()[1].strike_price.is_nan());
        assert!(!chain.calls()[1].is_valid());
    }

    #[test]
    fn extents_span_both_sides_and_skip_nan() {
        let chain = normalize(
            &[record("c1", 90.0, 0.4), record("c2", 110.0, 0.3)],
            &[record("p1", 80.0, 0.6)],
        );
        let extents = chain.extents();

        let strike = extents.strike_price.unwrap();
        assert_eq!((strike.min, strike.max), (80.0, 110.0));
        let iv = extents.mark_iv.unwrap();
        assert_eq!((iv.min, iv.max), (0.3, 0.6));
        let k = extents.log_moneyness.unwrap();
        assert!((k.min - (100.0f64 / 110.0).ln()).abs() < 1e-12);
        assert!((k.max - (100.0f64 / 80.0).ln()).abs() < 1e-12);
    }

    #[test]
    fn empty_chain_has_no_extents() {
        let chain = normalize(&[], &[]);
        assert!(chain.is_empty());
        assert!(chain.extents().strike_price.is_none());
        assert!(chain.reference().is_none());
    }

    #[test]
    fn reference_comes_from_first_valid_quote() {
        let chain = normalize(
            &[record("A-1-0-C", f64::NAN, 0.5), record("A-1-90-C", 90.0, 0.4)],
            &[],
        );
        let reference = chain.reference().unwrap();
        assert_eq!(reference.spot, 100.0);
        assert_eq!(reference.time_to_expiry, 0.5);
        assert_eq!(reference.risk_free_rate, 0.05);
    }

    #[test]
    fn mixed_records_split_by_symbol_suffix() {
        let chain = normalize_mixed(&[
            record("BTC-250524-90000-P", 90000.0, 0.6),
            record("BTC-250524-95000-C", 95000.0, 0.5),
            record("BTC-250524-99000", 99000.0, 0.5),
        ]);
        assert_eq!(chain.calls().len(), 1);
        assert_eq!(chain.puts().len(), 1);
        assert_eq!(chain.filter(SideFilter::Put).count(), 1);
        assert_eq!(chain.filter(SideFilter::All).count(), 2);
    }

    #[test]
    fn parses_chain_document() {
        let json = r#"{
            "C": [{"symbol": "BTC-250524-96000-C", "strikePrice": "96000", "spotPrice": "100000",
                   "markIV": "0.5", "timeToExpiry": 0.01}],
            "P": []
        }"#;
        let chain = OptionChain::from_json(json).unwrap();
        assert_eq!(chain.len(), 1);
        // no riskFreeRate on the record
        assert_eq!(
            chain.reference(),
            Some(ChainReference { spot: 100000.0, time_to_expiry: 0.01, risk_free_rate: 0.0 })
        );

        assert!(matches!(
            OptionChain::from_json("[1, 2]"),
            Err(SkewError::ParseError(_))
        ));
    }
}
