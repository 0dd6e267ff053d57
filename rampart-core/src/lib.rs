//! Fundamental data types shared across the entire workspace.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alias for price precision.
pub type Price = f64;
/// Alias for quantity precision.
pub type Quantity = f64;
/// Alias used for human-readable market symbols (e.g., `BTC/EUR`).
pub type Symbol = String;
/// Identifier of an independent trading account.
pub type AccountId = String;

/// Tolerance used when comparing weight sums.
pub const WEIGHT_EPSILON: f64 = 1e-9;

/// Trading horizon that drives ranking, allocation and fee selection.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyMode {
    Scalping,
    Intraday,
    #[default]
    Swing,
}

impl StrategyMode {
    /// Short horizons rank candidates by volatility instead of liquidity.
    #[must_use]
    pub fn favors_volatility(self) -> bool {
        matches!(self, Self::Scalping | Self::Intraday)
    }

    /// Proportional fee applied by the simulated venue for this horizon.
    #[must_use]
    pub fn default_fee_rate(self) -> f64 {
        match self {
            Self::Scalping => 0.0005,
            Self::Intraday | Self::Swing => 0.001,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scalping => "scalping",
            Self::Intraday => "intraday",
            Self::Swing => "swing",
        }
    }
}

impl fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "scalping" => Ok(Self::Scalping),
            "intraday" => Ok(Self::Intraday),
            "swing" => Ok(Self::Swing),
            other => Err(format!("unsupported strategy mode '{other}'")),
        }
    }
}

/// Candle granularity used to bucket recent close prices.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Timeframe {
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl Timeframe {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::OneHour => "1h",
            Self::FourHours => "4h",
            Self::OneDay => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discrete trading decision applied to an account each step.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Sell,
    #[default]
    Hold,
    Buy,
}

impl Action {
    /// Map the `0 = sell, 1 = hold, 2 = buy` encoding used by policy oracles.
    #[must_use]
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Sell),
            1 => Some(Self::Hold),
            2 => Some(Self::Buy),
            _ => None,
        }
    }

    /// Entries open or increase exposure and are the only actions a halted account may not take.
    #[must_use]
    pub fn is_entry(self) -> bool {
        matches!(self, Self::Buy)
    }
}

/// Raw market observation returned by a snapshot provider.
///
/// Every numeric field is optional so that a provider can report what it actually received;
/// candidates with missing required fields are excluded during selection, never defaulted.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub symbol: Symbol,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub last_price: Option<Price>,
    #[serde(default)]
    pub quote_volume: Option<f64>,
    /// Absolute price change over the provider's reference window.
    #[serde(default)]
    pub price_change: Option<Price>,
    #[serde(default)]
    pub bid: Option<Price>,
    #[serde(default)]
    pub ask: Option<Price>,
    #[serde(default)]
    pub closes: BTreeMap<Timeframe, Vec<Price>>,
}

impl MarketSnapshot {
    /// Recent closes for the requested timeframe (empty when not supplied).
    #[must_use]
    pub fn closes(&self, timeframe: Timeframe) -> &[Price] {
        self.closes
            .get(&timeframe)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Indicator values computed by a signal provider for one close series.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct IndicatorValues {
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
}

/// Inputs consumed by the volatility forecaster.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct VolatilityFeatures {
    pub quote_volume: f64,
    pub price_change: f64,
    pub rsi: f64,
    pub bollinger_width: f64,
}

/// Validated, immutable view of a market considered for trading in one selection cycle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarketCandidate {
    pub symbol: Symbol,
    pub active: bool,
    pub last_price: Price,
    pub quote_volume: f64,
    pub price_change_ratio: f64,
    pub bid: Price,
    pub ask: Price,
    pub spread: f64,
    pub volatility: BTreeMap<Timeframe, f64>,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
}

impl MarketCandidate {
    /// Volatility for one timeframe, zero when the timeframe was not observed.
    #[must_use]
    pub fn volatility(&self, timeframe: Timeframe) -> f64 {
        self.volatility.get(&timeframe).copied().unwrap_or(0.0)
    }

    /// Sum of the 1h and 4h volatilities used by the volatility ranking.
    #[must_use]
    pub fn short_term_volatility(&self) -> f64 {
        self.volatility(Timeframe::OneHour) + self.volatility(Timeframe::FourHours)
    }

    /// Largest volatility over all observed timeframes.
    #[must_use]
    pub fn peak_volatility(&self) -> f64 {
        self.volatility.values().copied().fold(0.0, f64::max)
    }

    /// Positive-trend condition shared by every selection mode.
    #[must_use]
    pub fn is_trending_up(&self, rsi_floor: f64) -> bool {
        self.rsi > rsi_floor && self.macd > self.macd_signal
    }
}

/// Ordered trading pairs produced by one successful selection cycle.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TradingPairList {
    pub symbols: Vec<Symbol>,
    pub strategy_mode: StrategyMode,
    pub generated_at: DateTime<Utc>,
}

impl TradingPairList {
    pub fn new(symbols: Vec<Symbol>, strategy_mode: StrategyMode) -> Self {
        Self {
            symbols,
            strategy_mode,
            generated_at: Utc::now(),
        }
    }

    /// Empty list used when neither live nor cached data is available.
    pub fn empty(strategy_mode: StrategyMode) -> Self {
        Self::new(Vec::new(), strategy_mode)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|candidate| candidate == symbol)
    }
}

/// Capital weights keyed by symbol.
///
/// Weights are non-negative and sum to at most one; capital that is not allocated stays
/// uninvested.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct AllocationVector(BTreeMap<Symbol, f64>);

impl AllocationVector {
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a vector from raw weights, dropping negative or non-finite entries to zero.
    pub fn from_weights<I>(weights: I) -> Self
    where
        I: IntoIterator<Item = (Symbol, f64)>,
    {
        Self(
            weights
                .into_iter()
                .map(|(symbol, weight)| {
                    let weight = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
                    (symbol, weight)
                })
                .collect(),
        )
    }

    /// Split capital evenly across the provided symbols.
    pub fn equal_weight<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        let symbols: Vec<Symbol> = symbols.into_iter().map(Into::into).collect();
        if symbols.is_empty() {
            return Self::new();
        }
        let weight = 1.0 / symbols.len() as f64;
        Self(symbols.into_iter().map(|symbol| (symbol, weight)).collect())
    }

    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.0.get(symbol).copied()
    }

    /// Weight used when sizing trades in `symbol`.
    ///
    /// An empty vector means "no allocation constraint" and yields a full weight; a populated
    /// vector that omits the symbol yields zero.
    #[must_use]
    pub fn weight_for(&self, symbol: &str) -> f64 {
        if self.0.is_empty() {
            1.0
        } else {
            self.get(symbol).unwrap_or(0.0)
        }
    }

    pub fn set(&mut self, symbol: impl Into<Symbol>, weight: f64) {
        let weight = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
        self.0.insert(symbol.into(), weight);
    }

    #[must_use]
    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &f64)> {
        self.0.iter()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.0.keys()
    }

    /// Rescale so the weights sum to one. Returns `None` when the vector carries no weight.
    #[must_use]
    pub fn normalized(&self) -> Option<Self> {
        let total = self.sum();
        if !total.is_finite() || total <= WEIGHT_EPSILON {
            return None;
        }
        Some(Self(
            self.0
                .iter()
                .map(|(symbol, weight)| (symbol.clone(), weight / total))
                .collect(),
        ))
    }

    /// True when every weight is non-negative and the sum does not exceed one.
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.0.values().all(|weight| weight.is_finite() && *weight >= 0.0)
            && self.sum() <= 1.0 + WEIGHT_EPSILON
    }

    /// Capital assigned to each symbol for the provided balance.
    #[must_use]
    pub fn capital(&self, balance: f64) -> BTreeMap<Symbol, f64> {
        self.0
            .iter()
            .map(|(symbol, weight)| (symbol.clone(), weight * balance))
            .collect()
    }
}

impl FromIterator<(Symbol, f64)> for AllocationVector {
    fn from_iter<T: IntoIterator<Item = (Symbol, f64)>>(iter: T) -> Self {
        Self::from_weights(iter)
    }
}

/// Close-price history keyed by symbol, oldest observation first.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct PriceHistory {
    series: BTreeMap<Symbol, Vec<Price>>,
}

impl PriceHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: impl Into<Symbol>, closes: Vec<Price>) {
        self.series.insert(symbol.into(), closes);
    }

    pub fn push(&mut self, symbol: &str, close: Price) {
        self.series.entry(symbol.to_string()).or_default().push(close);
    }

    #[must_use]
    pub fn series(&self, symbol: &str) -> Option<&[Price]> {
        self.series.get(symbol).map(Vec::as_slice)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.series.keys()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Restrict the history to the requested symbols, aligned on their common most-recent tail
    /// and optionally truncated to the last `window` observations.
    ///
    /// Symbols without a strictly positive, finite price series are dropped.
    #[must_use]
    pub fn aligned(&self, symbols: &[Symbol], window: Option<usize>) -> Self {
        let priced: Vec<(&Symbol, &Vec<Price>)> = symbols
            .iter()
            .filter_map(|symbol| self.series.get_key_value(symbol))
            .filter(|(_, closes)| {
                !closes.is_empty() && closes.iter().all(|price| price.is_finite() && *price > 0.0)
            })
            .collect();
        let Some(common) = priced.iter().map(|(_, closes)| closes.len()).min() else {
            return Self::new();
        };
        let len = window.map_or(common, |window| window.min(common));
        Self {
            series: priced
                .into_iter()
                .map(|(symbol, closes)| (symbol.clone(), closes[closes.len() - len..].to_vec()))
                .collect(),
        }
    }

    /// Number of observations shared by every series.
    #[must_use]
    pub fn observations(&self) -> usize {
        self.series.values().map(Vec::len).min().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_mode_parses_case_insensitively() {
        assert_eq!("Scalping".parse::<StrategyMode>().unwrap(), StrategyMode::Scalping);
        assert_eq!(" swing ".parse::<StrategyMode>().unwrap(), StrategyMode::Swing);
        assert!("hodl".parse::<StrategyMode>().is_err());
        assert!(StrategyMode::Intraday.favors_volatility());
        assert!(!StrategyMode::Swing.favors_volatility());
    }

    #[test]
    fn snapshot_deserializes_timeframe_keys() {
        let raw = r#"{
            "symbol": "BTC/EUR",
            "active": true,
            "bid": 100.0,
            "ask": 100.1,
            "closes": {"1h": [1.0, 2.0], "4h": [3.0]}
        }"#;
        let snapshot: MarketSnapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(snapshot.closes(Timeframe::OneHour), &[1.0, 2.0]);
        assert_eq!(snapshot.closes(Timeframe::FourHours), &[3.0]);
        assert!(snapshot.closes(Timeframe::OneDay).is_empty());
        assert!(snapshot.quote_volume.is_none());
    }

    #[test]
    fn equal_weight_sums_to_one() {
        let weights = AllocationVector::equal_weight(["A", "B", "C"]);
        assert!((weights.sum() - 1.0).abs() < WEIGHT_EPSILON);
        assert!(weights.is_bounded());
        assert!(AllocationVector::equal_weight(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn allocation_sanitizes_negative_weights() {
        let weights = AllocationVector::from_weights([
            ("A".to_string(), -0.3),
            ("B".to_string(), f64::NAN),
            ("C".to_string(), 0.4),
        ]);
        assert_eq!(weights.get("A"), Some(0.0));
        assert_eq!(weights.get("B"), Some(0.0));
        assert_eq!(weights.weight_for("C"), 0.4);
        assert_eq!(weights.weight_for("D"), 0.0);
        assert_eq!(AllocationVector::new().weight_for("D"), 1.0);
    }

    #[test]
    fn price_history_aligns_on_common_tail() {
        let mut history = PriceHistory::new();
        history.insert("A", vec![1.0, 2.0, 3.0, 4.0]);
        history.insert("B", vec![10.0, 11.0]);
        history.insert("C", vec![5.0, 0.0]);
        let symbols = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let aligned = history.aligned(&symbols, None);
        assert_eq!(aligned.series("A"), Some(&[3.0, 4.0][..]));
        assert_eq!(aligned.series("B"), Some(&[10.0, 11.0][..]));
        assert!(aligned.series("C").is_none());
        assert_eq!(aligned.observations(), 2);

        let windowed = history.aligned(&symbols[..1], Some(3));
        assert_eq!(windowed.series("A"), Some(&[2.0, 3.0, 4.0][..]));
    }

    #[test]
    fn candidate_trend_requires_rsi_and_macd() {
        let mut volatility = BTreeMap::new();
        volatility.insert(Timeframe::OneHour, 0.03);
        volatility.insert(Timeframe::FourHours, 0.01);
        let candidate = MarketCandidate {
            symbol: "ETH/EUR".into(),
            active: true,
            last_price: 10.0,
            quote_volume: 1.0,
            price_change_ratio: 0.0,
            bid: 10.0,
            ask: 10.01,
            spread: 0.001,
            volatility,
            rsi: 55.0,
            macd: 0.2,
            macd_signal: 0.1,
        };
        assert!(candidate.is_trending_up(50.0));
        assert!((candidate.short_term_volatility() - 0.04).abs() < 1e-12);
        assert_eq!(candidate.peak_volatility(), 0.03);
    }
}
