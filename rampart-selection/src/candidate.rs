//! Derivation of validated [`MarketCandidate`]s from raw snapshots.

use std::collections::BTreeMap;

use rampart_broker::SignalProvider;
use rampart_core::{MarketCandidate, MarketSnapshot, Timeframe};
use rampart_indicators::relative_volatility;
use thiserror::Error;
use tracing::{debug, warn};

/// Data-quality problems that exclude a snapshot from selection.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CandidateDefect {
    #[error("missing or invalid field '{0}'")]
    MissingField(&'static str),
    #[error("crossed book (bid {bid} > ask {ask})")]
    CrossedBook { bid: f64, ask: f64 },
    #[error("not enough {0} history to compute indicators")]
    InsufficientHistory(Timeframe),
}

fn positive(value: Option<f64>, field: &'static str) -> Result<f64, CandidateDefect> {
    match value {
        Some(value) if value.is_finite() && value > 0.0 => Ok(value),
        _ => Err(CandidateDefect::MissingField(field)),
    }
}

fn non_negative(value: Option<f64>, field: &'static str) -> Result<f64, CandidateDefect> {
    match value {
        Some(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(CandidateDefect::MissingField(field)),
    }
}

/// Validate one snapshot and compute its spread, volatilities and trend indicators.
pub fn derive_candidate(
    snapshot: &MarketSnapshot,
    signals: &dyn SignalProvider,
) -> Result<MarketCandidate, CandidateDefect> {
    let last_price = positive(snapshot.last_price, "last_price")?;
    let quote_volume = non_negative(snapshot.quote_volume, "quote_volume")?;
    let bid = positive(snapshot.bid, "bid")?;
    let ask = positive(snapshot.ask, "ask")?;
    if ask < bid {
        return Err(CandidateDefect::CrossedBook { bid, ask });
    }
    let price_change = match snapshot.price_change {
        Some(change) if change.is_finite() => change,
        _ => return Err(CandidateDefect::MissingField("price_change")),
    };

    let volatility: BTreeMap<Timeframe, f64> = snapshot
        .closes
        .iter()
        .filter_map(|(timeframe, closes)| {
            relative_volatility(closes).map(|volatility| (*timeframe, volatility))
        })
        .collect();

    let hourly = snapshot.closes(Timeframe::OneHour);
    if hourly.is_empty() {
        return Err(CandidateDefect::MissingField("closes.1h"));
    }
    let indicators = signals
        .indicators(hourly)
        .ok_or(CandidateDefect::InsufficientHistory(Timeframe::OneHour))?;

    Ok(MarketCandidate {
        symbol: snapshot.symbol.clone(),
        active: snapshot.active,
        last_price,
        quote_volume,
        price_change_ratio: (price_change / last_price).abs(),
        bid,
        ask,
        spread: (ask - bid) / bid,
        volatility,
        rsi: indicators.rsi,
        macd: indicators.macd,
        macd_signal: indicators.macd_signal,
    })
}

/// Derive candidates for every active snapshot, logging and dropping defective ones.
pub fn derive_candidates(
    snapshots: &[MarketSnapshot],
    signals: &dyn SignalProvider,
) -> Vec<MarketCandidate> {
    snapshots
        .iter()
        .filter(|snapshot| {
            if !snapshot.active {
                debug!(symbol = %snapshot.symbol, "skipping inactive market");
            }
            snapshot.active
        })
        .filter_map(|snapshot| match derive_candidate(snapshot, signals) {
            Ok(candidate) => Some(candidate),
            Err(defect) => {
                warn!(symbol = %snapshot.symbol, %defect, "excluding market with bad data");
                None
            }
        })
        .collect()
}
