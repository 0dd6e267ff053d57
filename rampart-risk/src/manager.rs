//! The per-account risk manager.

use rampart_core::{AllocationVector, Price, Symbol, WEIGHT_EPSILON};
use rampart_indicators::relative_volatility;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{AccountState, RiskProfile, RiskResult, RiskTier, TrailingStop};

/// Outcome of one drawdown evaluation.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawdownTransition {
    /// The account stayed in its previous state.
    Unchanged,
    /// Drawdown exceeded the limit; new entries are suppressed.
    Halted,
    /// Drawdown recovered below half the limit; entries are allowed again.
    Resumed,
}

/// Volatility-scaled exit levels for a fresh position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct StopLevels {
    pub stop_loss: Price,
    pub trailing_stop: Price,
}

/// Owns one account's [`RiskProfile`] and enforces it.
#[derive(Clone, Debug)]
pub struct RiskManager {
    profile: RiskProfile,
    tier: Option<RiskTier>,
}

impl RiskManager {
    pub fn new(profile: RiskProfile) -> RiskResult<Self> {
        profile.validate()?;
        Ok(Self {
            profile,
            tier: None,
        })
    }

    #[must_use]
    pub fn profile(&self) -> &RiskProfile {
        &self.profile
    }

    /// Tier applied by the last call to [`Self::adjust_for_forecast`].
    #[must_use]
    pub fn tier(&self) -> Option<RiskTier> {
        self.tier
    }

    /// Recompute the per-trade risk and trailing distance from a volatility forecast.
    pub fn adjust_for_forecast(&mut self, forecast: Option<f64>) -> RiskTier {
        let tier = RiskTier::from_forecast(forecast);
        if self.tier != Some(tier) {
            debug!(?tier, ?forecast, "risk tier changed");
        }
        self.profile.apply_tier(tier);
        self.tier = Some(tier);
        tier
    }

    /// Trailing-stop fraction for a forecast; unknown forecasts fall into the widest stop.
    #[must_use]
    pub fn compute_trailing_stop(&self, forecast: Option<f64>) -> f64 {
        RiskTier::from_forecast(forecast).trailing_stop_fraction()
    }

    /// Cash to commit to one entry: `min(balance * risk * (1 + momentum), balance * exposure)`.
    #[must_use]
    pub fn compute_position_size(&self, balance: Price, momentum: f64) -> Price {
        if !balance.is_finite() || balance <= 0.0 {
            return 0.0;
        }
        let momentum = if momentum.is_finite() {
            momentum.max(-1.0)
        } else {
            0.0
        };
        let sized = balance * self.profile.risk_per_trade_fraction * (1.0 + momentum);
        sized
            .min(balance * self.profile.max_exposure_fraction)
            .max(0.0)
    }

    /// Evaluate the hysteresis rule after a balance-changing action.
    pub fn update_drawdown_state(&self, account: &mut AccountState) -> DrawdownTransition {
        let net_worth = account.observe_net_worth();
        let drawdown = account.drawdown();
        let limit = self.profile.max_drawdown_fraction;

        if !account.is_halted() && drawdown > limit {
            account.set_kill_switch(true);
            warn!(
                account = account.account_id(),
                net_worth,
                peak = account.highest_balance_seen(),
                drawdown,
                "drawdown limit breached; halting new entries"
            );
            return DrawdownTransition::Halted;
        }
        if account.is_halted() && drawdown < self.profile.resume_threshold() {
            account.set_kill_switch(false);
            info!(
                account = account.account_id(),
                net_worth, drawdown, "drawdown recovered; resuming entries"
            );
            return DrawdownTransition::Resumed;
        }
        DrawdownTransition::Unchanged
    }

    /// Bound every weight by the exposure ceiling, redistributing the excess to symbols that
    /// still have headroom. Whatever cannot be placed stays uninvested.
    #[must_use]
    pub fn clip_allocation(&self, weights: &AllocationVector, balance: Price) -> AllocationVector {
        if !balance.is_finite() || balance <= 0.0 {
            return weights.symbols().map(|symbol| (symbol.clone(), 0.0)).collect();
        }
        let ceiling = self.profile.max_exposure_fraction;
        let mut clipped: Vec<(Symbol, f64)> = weights
            .iter()
            .map(|(symbol, weight)| (symbol.clone(), *weight))
            .collect();

        let total: f64 = clipped.iter().map(|(_, weight)| weight).sum();
        if total > 1.0 {
            clipped.iter_mut().for_each(|(_, weight)| *weight /= total);
        }

        for _ in 0..=clipped.len() {
            let mut excess = 0.0;
            for (_, weight) in clipped.iter_mut() {
                if *weight > ceiling {
                    excess += *weight - ceiling;
                    *weight = ceiling;
                }
            }
            if excess <= WEIGHT_EPSILON {
                break;
            }
            let headroom_base: f64 = clipped
                .iter()
                .map(|(_, weight)| *weight)
                .filter(|weight| *weight < ceiling - WEIGHT_EPSILON)
                .sum();
            if headroom_base <= WEIGHT_EPSILON {
                debug!(excess, "no headroom left; leaving excess uninvested");
                break;
            }
            for (_, weight) in clipped.iter_mut() {
                if *weight < ceiling - WEIGHT_EPSILON {
                    *weight += excess * *weight / headroom_base;
                }
            }
        }

        // Redistribution can overshoot by rounding; a final pass keeps the ceiling strict.
        clipped
            .into_iter()
            .map(|(symbol, weight)| (symbol, weight.min(ceiling)))
            .collect()
    }

    /// Stop-loss and trailing levels scaled by the relative volatility of recent closes.
    #[must_use]
    pub fn adaptive_stop_levels(entry: Price, closes: &[Price]) -> Option<StopLevels> {
        if !entry.is_finite() || entry <= 0.0 {
            return None;
        }
        let volatility = relative_volatility(closes)?;
        Some(StopLevels {
            stop_loss: (entry * (1.0 - 1.5 * volatility)).max(0.0),
            trailing_stop: (entry * (1.0 - 0.8 * volatility)).max(0.0),
        })
    }

    /// Fresh trailing-stop tracker at the current distance.
    #[must_use]
    pub fn trailing_stop(&self) -> TrailingStop {
        TrailingStop::new(self.profile.trailing_stop_fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> RiskManager {
        RiskManager::new(RiskProfile::default()).unwrap()
    }

    #[test]
    fn position_size_respects_exposure_ceiling() {
        let manager = manager();
        assert!((manager.compute_position_size(1000.0, 0.5) - 30.0).abs() < 1e-9);
        let aggressive = RiskManager::new(RiskProfile {
            risk_per_trade_fraction: 0.4,
            ..RiskProfile::default()
        })
        .unwrap();
        assert_eq!(aggressive.compute_position_size(1000.0, 1.0), 500.0);
        assert_eq!(manager.compute_position_size(0.0, 0.5), 0.0);
        assert_eq!(manager.compute_position_size(-5.0, 0.5), 0.0);
    }

    #[test]
    fn forecast_adjusts_profile() {
        let mut manager = manager();
        assert_eq!(manager.adjust_for_forecast(Some(12.0)), RiskTier::Moderate);
        assert_eq!(manager.profile().trailing_stop_fraction, 0.10);
        assert_eq!(manager.profile().risk_per_trade_fraction, 0.015);
        assert_eq!(manager.adjust_for_forecast(None), RiskTier::Conservative);
        assert_eq!(manager.profile().risk_per_trade_fraction, 0.01);
        assert_eq!(manager.compute_trailing_stop(Some(3.0)), 0.05);
        assert_eq!(manager.compute_trailing_stop(Some(f64::NAN)), 0.15);
        assert_eq!(manager.trailing_stop().fraction(), 0.15);
    }

    #[test]
    fn clip_redistributes_excess_below_ceiling() {
        let manager = manager();
        let weights = AllocationVector::from_weights([
            ("A".to_string(), 0.7),
            ("B".to_string(), 0.2),
            ("C".to_string(), 0.1),
        ]);
        let clipped = manager.clip_allocation(&weights, 1000.0);
        assert!((clipped.weight_for("A") - 0.5).abs() < 1e-9);
        assert!((clipped.weight_for("B") - (0.2 + 0.2 * 2.0 / 3.0)).abs() < 1e-9);
        assert!((clipped.weight_for("C") - (0.1 + 0.2 / 3.0)).abs() < 1e-9);
        assert!((clipped.sum() - 1.0).abs() < 1e-9);
        assert!(clipped.is_bounded());
    }

    #[test]
    fn clip_leaves_unplaceable_capital_uninvested() {
        let manager = manager();
        let weights = AllocationVector::from_weights([("A".to_string(), 1.0)]);
        let clipped = manager.clip_allocation(&weights, 1000.0);
        assert_eq!(clipped.weight_for("A"), 0.5);
        assert!(clipped.sum() <= weights.sum());
    }

    #[test]
    fn clip_with_empty_balance_zeroes_everything() {
        let manager = manager();
        let weights = AllocationVector::equal_weight(["A", "B"]);
        let clipped = manager.clip_allocation(&weights, 0.0);
        assert_eq!(clipped.len(), 2);
        assert_eq!(clipped.sum(), 0.0);
    }

    #[test]
    fn adaptive_stops_scale_with_volatility() {
        // relative volatility 0.2
        let levels = RiskManager::adaptive_stop_levels(100.0, &[8.0, 12.0, 8.0, 12.0]).unwrap();
        assert!((levels.stop_loss - 70.0).abs() < 1e-9);
        assert!((levels.trailing_stop - 84.0).abs() < 1e-9);
        assert!(RiskManager::adaptive_stop_levels(100.0, &[]).is_none());
        assert!(RiskManager::adaptive_stop_levels(0.0, &[1.0, 2.0]).is_none());
    }
}
