use rampart_config::{SelectionConfig, VolatilityRule};
use rampart_core::MarketCandidate;

/// Eligibility rules applied to every derived candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct PairFilter {
    pub min_volume: f64,
    pub spread_cap: f64,
    pub volatility_threshold: f64,
    pub volatility_rule: VolatilityRule,
    pub rsi_floor: f64,
}

impl PairFilter {
    #[must_use]
    pub fn from_config(config: &SelectionConfig) -> Self {
        Self {
            min_volume: config.min_volume,
            spread_cap: config.spread_cap,
            volatility_threshold: config.volatility_threshold,
            volatility_rule: config.volatility_rule,
            rsi_floor: config.rsi_floor,
        }
    }

    /// First failed condition, if any.
    #[must_use]
    pub fn rejection(&self, candidate: &MarketCandidate) -> Option<&'static str> {
        if !candidate.active {
            return Some("inactive");
        }
        if candidate.quote_volume < self.min_volume {
            return Some("volume");
        }
        if candidate.spread >= self.spread_cap {
            return Some("spread");
        }
        let volatile = match self.volatility_rule {
            VolatilityRule::AnyTimeframe => candidate
                .volatility
                .values()
                .any(|volatility| *volatility >= self.volatility_threshold),
            VolatilityRule::PriceChange => {
                candidate.price_change_ratio >= self.volatility_threshold
            }
        };
        if !volatile {
            return Some("volatility");
        }
        if !candidate.is_trending_up(self.rsi_floor) {
            return Some("trend");
        }
        None
    }

    #[must_use]
    pub fn admits(&self, candidate: &MarketCandidate) -> bool {
        self.rejection(candidate).is_none()
    }
}

impl Default for PairFilter {
    fn default() -> Self {
        Self::from_config(&SelectionConfig::default())
    }
}
