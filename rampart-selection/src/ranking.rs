use rampart_core::{MarketCandidate, StrategyMode, Symbol};
use serde::{Deserialize, Serialize};

/// How eligible candidates are ordered.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingPolicy {
    /// Most volatile first, by the sum of the 1h and 4h volatilities.
    Volatility,
    /// Most liquid first, by quote volume.
    Volume,
}

impl RankingPolicy {
    #[must_use]
    pub fn for_mode(mode: StrategyMode) -> Self {
        if mode.favors_volatility() {
            Self::Volatility
        } else {
            Self::Volume
        }
    }

    #[must_use]
    pub fn score(self, candidate: &MarketCandidate) -> f64 {
        match self {
            Self::Volatility => candidate.short_term_volatility(),
            Self::Volume => candidate.quote_volume,
        }
    }

    /// Order candidates by descending score (ties broken by symbol).
    ///
    /// Only the volume ranking is cut to `top_n`; the volatility ranking keeps every candidate.
    #[must_use]
    pub fn rank(self, mut candidates: Vec<MarketCandidate>, top_n: usize) -> Vec<Symbol> {
        candidates.sort_by(|left, right| {
            self.score(right)
                .total_cmp(&self.score(left))
                .then_with(|| left.symbol.cmp(&right.symbol))
        });
        let keep = match self {
            Self::Volatility => candidates.len(),
            Self::Volume => top_n,
        };
        candidates
            .into_iter()
            .take(keep)
            .map(|candidate| candidate.symbol)
            .collect()
    }
}

impl From<StrategyMode> for RankingPolicy {
    fn from(mode: StrategyMode) -> Self {
        Self::for_mode(mode)
    }
}
