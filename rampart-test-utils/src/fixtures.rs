//! Deterministic market fixtures.

use std::collections::BTreeMap;

use rampart_broker::SignalProvider;
use rampart_core::{IndicatorValues, MarketSnapshot, Price, PriceHistory, Timeframe, VolatilityFeatures};

/// Geometric uptrend: `start * (1 + growth)^i`.
#[must_use]
pub fn trending_closes(len: usize, start: Price, growth: f64) -> Vec<Price> {
    (0..len)
        .map(|i| start * (1.0 + growth).powi(i as i32))
        .collect()
}

/// Alternates `base * (1 - amplitude)` and `base * (1 + amplitude)`, so the relative volatility
/// of an even-length series is exactly `amplitude`.
#[must_use]
pub fn oscillating_closes(base: Price, amplitude: f64, len: usize) -> Vec<Price> {
    (0..len)
        .map(|i| {
            if i % 2 == 0 {
                base * (1.0 - amplitude)
            } else {
                base * (1.0 + amplitude)
            }
        })
        .collect()
}

/// Snapshot that passes the default filters with the default technical signal provider.
///
/// `four_hour_volatility` controls the volatility ranking; `quote_volume` the volume ranking.
#[must_use]
pub fn eligible_snapshot(symbol: &str, quote_volume: f64, four_hour_volatility: f64) -> MarketSnapshot {
    let hourly = trending_closes(60, 100.0, 0.01);
    let last = hourly.last().copied().unwrap_or(100.0);
    let mut closes = BTreeMap::new();
    closes.insert(Timeframe::OneHour, hourly);
    closes.insert(
        Timeframe::FourHours,
        oscillating_closes(last, four_hour_volatility, 20),
    );
    MarketSnapshot {
        symbol: symbol.to_string(),
        active: true,
        last_price: Some(last),
        quote_volume: Some(quote_volume),
        price_change: Some(last * 0.03),
        bid: Some(last),
        ask: Some(last * 1.0005),
        closes,
    }
}

/// Mildly trending, noisy close histories for allocator tests.
#[must_use]
pub fn price_history(symbols: &[&str], len: usize) -> PriceHistory {
    let mut history = PriceHistory::new();
    for (k, symbol) in symbols.iter().enumerate() {
        let base = 100.0 + 10.0 * k as f64;
        let drift = 0.0005 * (k as f64 + 1.0);
        let frequency = 0.7 + 0.37 * k as f64;
        let closes = (0..len)
            .map(|i| {
                let i = i as f64;
                base * (1.0 + drift * i + 0.02 * (i * frequency).sin())
            })
            .collect();
        history.insert(*symbol, closes);
    }
    history
}

/// Signal provider returning canned values regardless of input.
#[derive(Clone, Debug, Default)]
pub struct FixedSignalProvider {
    pub values: Option<IndicatorValues>,
    pub forecast: Option<f64>,
    pub bollinger_width: Option<f64>,
}

impl FixedSignalProvider {
    /// Indicators that satisfy the positive-trend filter.
    #[must_use]
    pub fn bullish() -> Self {
        Self {
            values: Some(IndicatorValues {
                rsi: 65.0,
                macd: 1.0,
                macd_signal: 0.5,
            }),
            forecast: Some(5.0),
            bollinger_width: Some(0.2),
        }
    }

    #[must_use]
    pub fn with_forecast(mut self, forecast: Option<f64>) -> Self {
        self.forecast = forecast;
        self
    }
}

impl SignalProvider for FixedSignalProvider {
    fn indicators(&self, closes: &[Price]) -> Option<IndicatorValues> {
        if closes.is_empty() {
            None
        } else {
            self.values
        }
    }

    fn forecast_volatility(&self, _features: &VolatilityFeatures) -> Option<f64> {
        self.forecast
    }

    fn bollinger_width(&self, _closes: &[Price]) -> Option<f64> {
        self.bollinger_width
    }
}
