use rampart_config::RiskConfig;
use serde::{Deserialize, Serialize};

use crate::{RiskError, RiskResult};

/// Per-account risk limits.
///
/// `risk_per_trade_fraction` and `trailing_stop_fraction` follow the volatility forecast each
/// cycle; the remaining limits are fixed for the session.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct RiskProfile {
    pub max_drawdown_fraction: f64,
    pub risk_per_trade_fraction: f64,
    pub max_exposure_fraction: f64,
    pub trailing_stop_fraction: f64,
}

impl RiskProfile {
    pub fn validate(&self) -> RiskResult<()> {
        for (parameter, value) in [
            ("max_drawdown_fraction", self.max_drawdown_fraction),
            ("risk_per_trade_fraction", self.risk_per_trade_fraction),
            ("max_exposure_fraction", self.max_exposure_fraction),
            ("trailing_stop_fraction", self.trailing_stop_fraction),
        ] {
            if !(value.is_finite() && value > 0.0 && value <= 1.0) {
                return Err(RiskError::InvalidFraction { parameter, value });
            }
        }
        Ok(())
    }

    /// Drawdown below which a halted account may trade again.
    #[must_use]
    pub fn resume_threshold(&self) -> f64 {
        self.max_drawdown_fraction / 2.0
    }

    pub(crate) fn apply_tier(&mut self, tier: RiskTier) {
        self.trailing_stop_fraction = tier.trailing_stop_fraction();
        self.risk_per_trade_fraction = tier.risk_per_trade_fraction();
    }
}

impl Default for RiskProfile {
    fn default() -> Self {
        Self::from(&RiskConfig::default())
    }
}

impl From<&RiskConfig> for RiskProfile {
    fn from(config: &RiskConfig) -> Self {
        Self {
            max_drawdown_fraction: config.max_drawdown_fraction,
            risk_per_trade_fraction: config.risk_per_trade_fraction,
            max_exposure_fraction: config.max_exposure_fraction,
            trailing_stop_fraction: config.trailing_stop_fraction,
        }
    }
}

/// Risk tier selected from a volatility forecast on the 0-100 scale.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Conservative,
    Moderate,
    Normal,
}

impl RiskTier {
    /// Missing or non-finite forecasts map to the most conservative tier.
    #[must_use]
    pub fn from_forecast(forecast: Option<f64>) -> Self {
        match forecast {
            Some(v) if v.is_finite() && v > 15.0 => Self::Conservative,
            Some(v) if v.is_finite() && v > 10.0 => Self::Moderate,
            Some(v) if v.is_finite() => Self::Normal,
            _ => Self::Conservative,
        }
    }

    #[must_use]
    pub fn trailing_stop_fraction(self) -> f64 {
        match self {
            Self::Conservative => 0.15,
            Self::Moderate => 0.10,
            Self::Normal => 0.05,
        }
    }

    #[must_use]
    pub fn risk_per_trade_fraction(self) -> f64 {
        match self {
            Self::Conservative => 0.01,
            Self::Moderate => 0.015,
            Self::Normal => 0.02,
        }
    }
}
