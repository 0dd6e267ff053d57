//! Signal-weighted capital split.

use std::collections::BTreeMap;

use rampart_core::{MarketCandidate, Price, Symbol};

/// Split `capital` across `candidates` in proportion to `short_term_volatility * |macd - signal|`.
///
/// Non-finite scores count as zero; when every score is zero the capital is split evenly.
#[must_use]
pub fn score_allocation(candidates: &[MarketCandidate], capital: Price) -> BTreeMap<Symbol, Price> {
    if candidates.is_empty() {
        return BTreeMap::new();
    }
    let scores: Vec<f64> = candidates
        .iter()
        .map(|candidate| {
            let score =
                candidate.short_term_volatility() * (candidate.macd - candidate.macd_signal).abs();
            if score.is_finite() {
                score.max(0.0)
            } else {
                0.0
            }
        })
        .collect();
    let total: f64 = scores.iter().sum();
    candidates
        .iter()
        .zip(scores)
        .map(|(candidate, score)| {
            let share = if total > 0.0 {
                score / total
            } else {
                1.0 / candidates.len() as f64
            };
            (candidate.symbol.clone(), capital * share)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampart_core::Timeframe;

    fn candidate(symbol: &str, volatility: f64, macd_gap: f64) -> MarketCandidate {
        let mut volatilities = BTreeMap::new();
        volatilities.insert(Timeframe::OneHour, volatility);
        MarketCandidate {
            symbol: symbol.to_string(),
            active: true,
            last_price: 10.0,
            quote_volume: 2_000_000.0,
            price_change_ratio: 0.03,
            bid: 10.0,
            ask: 10.01,
            spread: 0.001,
            volatility: volatilities,
            rsi: 60.0,
            macd: macd_gap,
            macd_signal: 0.0,
        }
    }

    #[test]
    fn capital_follows_scores() {
        let split = score_allocation(
            &[candidate("A", 0.02, 1.0), candidate("B", 0.02, 3.0)],
            1_000.0,
        );
        assert!((split["A"] - 250.0).abs() < 1e-9);
        assert!((split["B"] - 750.0).abs() < 1e-9);
    }

    #[test]
    fn zero_scores_split_evenly() {
        let split = score_allocation(
            &[candidate("A", 0.0, 1.0), candidate("B", 0.05, 0.0)],
            90.0,
        );
        assert!((split["A"] - 45.0).abs() < 1e-9);
        assert!((split["B"] - 45.0).abs() < 1e-9);
        assert!(score_allocation(&[], 90.0).is_empty());
    }
}
