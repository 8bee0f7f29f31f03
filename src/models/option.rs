use crate::utils::black_scholes;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Exchange option contracts settle at 08:00 UTC on the expiry date.
const SETTLEMENT_HOUR_UTC: u32 = 8;
const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 60.0 * 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionSide {
    #[serde(rename = "C")]
    Call,
    #[serde(rename = "P")]
    Put,
}

impl OptionSide {
    /// Side from a `C`/`P` suffix, case-insensitive.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.trim() {
            "C" | "c" => Some(OptionSide::Call),
            "P" | "p" => Some(OptionSide::Put),
            _ => None,
        }
    }

    pub fn is_call(&self) -> bool {
        *self == OptionSide::Call
    }
}

impl std::fmt::Display for OptionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionSide::Call => write!(f, "Call"),
            OptionSide::Put => write!(f, "Put"),
        }
    }
}

/// Which quantity a chart x axis is plotted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AxisField {
    StrikePrice,
    Moneyness,
    #[default]
    LogMoneyness,
}

impl AxisField {
    pub fn label(&self) -> &'static str {
        match self {
            AxisField::StrikePrice => "Strike Price",
            AxisField::Moneyness => "Moneyness",
            AxisField::LogMoneyness => "Log Moneyness",
        }
    }
}

impl std::str::FromStr for AxisField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "strikePrice" | "strike" => Ok(AxisField::StrikePrice),
            "moneyness" => Ok(AxisField::Moneyness),
            "logMoneyness" | "log_moneyness" => Ok(AxisField::LogMoneyness),
            other => Err(format!("unknown axis field '{}'", other)),
        }
    }
}

/// A numeric wire field: feeds send decimals either as JSON numbers or as
/// strings such as `"107023.53000000"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericField {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl NumericField {
    /// Fail-soft conversion: anything that does not parse becomes NaN.
    pub fn to_f64(&self) -> f64 {
        match self {
            NumericField::Number(n) => *n,
            NumericField::Text(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
            NumericField::Other(_) => f64::NAN,
        }
    }
}

fn parse_field(field: &Option<NumericField>) -> f64 {
    field.as_ref().map_or(f64::NAN, NumericField::to_f64)
}

/// One quote record as delivered by the market-data collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawOptionQuote {
    pub symbol: String,
    pub strike_price: Option<NumericField>,
    pub spot_price: Option<NumericField>,
    pub mark_price: Option<NumericField>,
    pub bsm_price: Option<NumericField>,
    #[serde(rename = "markIV")]
    pub mark_iv: Option<NumericField>,
    pub risk_free_rate: Option<NumericField>,
    pub moneyness: Option<NumericField>,
    pub log_moneyness: Option<NumericField>,
    pub time_to_expiry: Option<NumericField>,
    pub days_to_expiry: Option<NumericField>,
}

impl RawOptionQuote {
    /// Side taken from the symbol's trailing `-C`/`-P` segment.
    pub fn side_from_symbol(&self) -> Option<OptionSide> {
        self.symbol.rsplit('-').next().and_then(OptionSide::from_suffix)
    }
}

/// Parsed exchange symbol, format `UNDERLYING-YYMMDD-STRIKE-SIDE`
/// e.g. `BTC-250524-96000-C`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSymbol {
    pub underlying: String,
    pub expiry: NaiveDate,
    pub strike: f64,
    pub side: OptionSide,
}

impl OptionSymbol {
    pub fn parse(symbol: &str) -> Option<Self> {
        trace!("Parsing option symbol: {}", symbol);

        let parts: Vec<&str> = symbol.split('-').collect();
        if parts.len() != 4 {
            warn!("Expected 4 dash-separated parts in option symbol: {}", symbol);
            return None;
        }
        let (underlying, date_str, strike_str, side_str) = (parts[0], parts[1], parts[2], parts[3]);

        if underlying.is_empty() {
            warn!("Empty underlying in option symbol: {}", symbol);
            return None;
        }

        let expiry = match NaiveDate::parse_from_str(date_str, "%y%m%d") {
            Ok(d) => d,
            Err(e) => {
                warn!("Failed to parse expiry '{}' in option symbol {}: {}", date_str, symbol, e);
                return None;
            }
        };

        let strike = match strike_str.parse::<f64>() {
            Ok(s) if s > 0.0 => s,
            Ok(s) => {
                warn!("Non-positive strike {} in option symbol: {}", s, symbol);
                return None;
            }
            Err(e) => {
                warn!("Failed to parse strike '{}' in option symbol {}: {}", strike_str, symbol, e);
                return None;
            }
        };

        let side = match OptionSide::from_suffix(side_str) {
            Some(side) => side,
            None => {
                warn!("Invalid side '{}' in option symbol: {}", side_str, symbol);
                return None;
            }
        };

        Some(Self {
            underlying: underlying.to_string(),
            expiry,
            strike,
            side,
        })
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expiry
            .and_hms_opt(SETTLEMENT_HOUR_UTC, 0, 0)
            .map(|dt| dt.and_utc())
    }

    /// Time to expiration in years measured from `now`; zero once expired.
    pub fn time_to_expiry(&self, now: DateTime<Utc>) -> f64 {
        match self.expiration() {
            Some(expiration) if expiration > now => {
                (expiration - now).num_seconds() as f64 / SECONDS_PER_YEAR
            }
            _ => 0.0,
        }
    }
}

/// A normalized market data point for one strike and side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionQuote {
    pub symbol: String,
    pub side: OptionSide,
    pub strike_price: f64,
    pub spot_price: f64,
    pub mark_price: f64,
    #[serde(rename = "markIV")]
    pub mark_iv: f64,
    pub bsm_price: f64,
    pub moneyness: f64,
    pub log_moneyness: f64,
    pub risk_free_rate: f64,
    pub time_to_expiry: f64,
    pub days_to_expiry: f64,
}

impl OptionQuote {
    /// Build a quote from a raw record. Never fails: unparsable fields become
    /// NaN and the quote is reported through [`OptionQuote::is_valid`].
    pub fn from_raw(raw: &RawOptionQuote, side: OptionSide) -> Self {
        let strike_price = parse_field(&raw.strike_price);
        let spot_price = parse_field(&raw.spot_price);
        let mark_iv = parse_field(&raw.mark_iv);
        let risk_free_rate = parse_field(&raw.risk_free_rate);
        let time_to_expiry = parse_field(&raw.time_to_expiry);

        // Feed-supplied moneyness is ignored; it is re-derived from spot/strike.
        let (moneyness, log_moneyness) = if strike_price > 0.0 && spot_price > 0.0 {
            let m = spot_price / strike_price;
            (m, m.ln())
        } else {
            (f64::NAN, f64::NAN)
        };

        let mut bsm_price = parse_field(&raw.bsm_price);
        if bsm_price.is_nan() {
            bsm_price = black_scholes::price(
                spot_price,
                strike_price,
                time_to_expiry,
                risk_free_rate,
                mark_iv,
                side.is_call(),
            );
        }

        Self {
            symbol: raw.symbol.clone(),
            side,
            strike_price,
            spot_price,
            mark_price: parse_field(&raw.mark_price),
            mark_iv,
            bsm_price,
            moneyness,
            log_moneyness,
            risk_free_rate,
            time_to_expiry,
            days_to_expiry: parse_field(&raw.days_to_expiry),
        }
    }

    /// True when the fields every downstream consumer depends on are usable.
    pub fn is_valid(&self) -> bool {
        self.strike_price.is_finite()
            && self.strike_price > 0.0
            && self.spot_price.is_finite()
            && self.spot_price > 0.0
            && self.time_to_expiry.is_finite()
            && self.time_to_expiry > 0.0
            && self.mark_iv.is_finite()
            && self.mark_iv >= 0.0
            && self.log_moneyness.is_finite()
    }

    /// Total implied variance `markIV² · T`.
    pub fn total_variance(&self) -> f64 {
        self.mark_iv * self.mark_iv * self.time_to_expiry
    }

    pub fn x_value(&self, field: AxisField) -> f64 {
        match field {
            AxisField::StrikePrice => self.strike_price,
            AxisField::Moneyness => self.moneyness,
            AxisField::LogMoneyness => self.log_moneyness,
        }
    }

    pub fn parsed_symbol(&self) -> Option<OptionSymbol> {
        OptionSymbol::parse(&self.symbol)
    }

    /// False when the exchange symbol names a different side or strike than
    /// the quote carries. Symbols outside the exchange format are not checked.
    pub fn symbol_agrees(&self) -> bool {
        match self.parsed_symbol() {
            Some(parsed) => {
                parsed.side == self.side
                    && (!self.strike_price.is_finite() || parsed.strike == self.strike_price)
            }
            None => true,
        }
    }
}
