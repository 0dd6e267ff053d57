//! Decision policies driving the execution loop.
//!
//! A policy sees one account at a time and answers with a single [`Action`]. Risk controls are
//! applied afterwards by the session, so a policy may happily ask to buy on a halted account;
//! the entry is simply suppressed.

use std::collections::VecDeque;
use std::sync::Arc;

use rampart_broker::SignalProvider;
use rampart_core::{Action, Price, Quantity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used within policy implementations.
pub type StrategyResult<T> = Result<T, StrategyError>;

#[derive(Debug, Error, PartialEq)]
pub enum StrategyError {
    /// Not enough history yet; the session treats this as HOLD.
    #[error("policy not ready: {0}")]
    NotReady(String),
    /// Raised when user-provided configuration is invalid.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// What a policy may inspect when deciding for one account.
#[derive(Clone, Copy, Debug)]
pub struct DecisionContext<'a> {
    pub account_id: &'a str,
    pub step: usize,
    pub symbol: &'a str,
    /// Closes observed so far, the current price last.
    pub closes: &'a [Price],
    pub shares_held: Quantity,
    pub halted: bool,
}

impl DecisionContext<'_> {
    #[must_use]
    pub fn price(&self) -> Option<Price> {
        self.closes.last().copied()
    }

    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.shares_held <= 0.0
    }
}

/// Per-account decision maker.
pub trait DecisionPolicy: Send + Sync {
    /// Human-friendly identifier used in logs and the ledger.
    fn name(&self) -> &str;

    fn decide(&mut self, ctx: &DecisionContext<'_>) -> StrategyResult<Action>;
}

/// Replays a fixed sequence of actions, then holds.
#[derive(Clone, Debug, Default)]
pub struct ScriptedPolicy {
    actions: VecDeque<Action>,
}

impl ScriptedPolicy {
    pub fn new(actions: impl IntoIterator<Item = Action>) -> Self {
        Self {
            actions: actions.into_iter().collect(),
        }
    }

    /// Build from the `0 = sell, 1 = hold, 2 = buy` encoding.
    pub fn from_indices(indices: &[u8]) -> StrategyResult<Self> {
        indices
            .iter()
            .map(|index| {
                Action::from_index(*index).ok_or_else(|| {
                    StrategyError::InvalidParameter(format!("unknown action index {index}"))
                })
            })
            .collect::<StrategyResult<Vec<_>>>()
            .map(Self::new)
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.actions.len()
    }
}

impl DecisionPolicy for ScriptedPolicy {
    fn name(&self) -> &str {
        "scripted"
    }

    fn decide(&mut self, _ctx: &DecisionContext<'_>) -> StrategyResult<Action> {
        Ok(self.actions.pop_front().unwrap_or(Action::Hold))
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct SmaCrossConfig {
    pub fast_period: usize,
    pub slow_period: usize,
}

impl Default for SmaCrossConfig {
    fn default() -> Self {
        Self {
            fast_period: 5,
            slow_period: 20,
        }
    }
}

/// Moving-average crossover: BUY on a golden cross, SELL on a death cross.
#[derive(Clone, Debug)]
pub struct SmaCross {
    cfg: SmaCrossConfig,
}

impl SmaCross {
    pub fn new(cfg: SmaCrossConfig) -> StrategyResult<Self> {
        if cfg.fast_period == 0 || cfg.slow_period == 0 {
            return Err(StrategyError::InvalidParameter(
                "period must be greater than zero".into(),
            ));
        }
        if cfg.fast_period >= cfg.slow_period {
            return Err(StrategyError::InvalidParameter(format!(
                "fast period {} must be shorter than slow period {}",
                cfg.fast_period, cfg.slow_period
            )));
        }
        Ok(Self { cfg })
    }

    fn sma(closes: &[Price], period: usize) -> Price {
        closes[closes.len() - period..].iter().sum::<Price>() / period as f64
    }
}

impl DecisionPolicy for SmaCross {
    fn name(&self) -> &str {
        "sma-cross"
    }

    fn decide(&mut self, ctx: &DecisionContext<'_>) -> StrategyResult<Action> {
        let needed = self.cfg.slow_period + 1;
        if ctx.closes.len() < needed {
            return Err(StrategyError::NotReady(format!(
                "need {needed} closes, have {}",
                ctx.closes.len()
            )));
        }
        let previous = &ctx.closes[..ctx.closes.len() - 1];
        let fast_prev = Self::sma(previous, self.cfg.fast_period);
        let slow_prev = Self::sma(previous, self.cfg.slow_period);
        let fast_last = Self::sma(ctx.closes, self.cfg.fast_period);
        let slow_last = Self::sma(ctx.closes, self.cfg.slow_period);

        let action = if fast_prev <= slow_prev && fast_last > slow_last {
            Action::Buy
        } else if fast_prev >= slow_prev && fast_last < slow_last {
            Action::Sell
        } else {
            Action::Hold
        };
        Ok(action)
    }
}

/// Enters on the positive-trend condition used by pair selection and exits when it breaks.
pub struct SignalPolicy {
    signals: Arc<dyn SignalProvider>,
    rsi_floor: f64,
}

impl SignalPolicy {
    pub fn new(signals: Arc<dyn SignalProvider>, rsi_floor: f64) -> Self {
        Self { signals, rsi_floor }
    }
}

impl DecisionPolicy for SignalPolicy {
    fn name(&self) -> &str {
        "signal"
    }

    fn decide(&mut self, ctx: &DecisionContext<'_>) -> StrategyResult<Action> {
        let values = self.signals.indicators(ctx.closes).ok_or_else(|| {
            StrategyError::NotReady(format!("no indicators for {} closes", ctx.closes.len()))
        })?;
        let trending = values.rsi > self.rsi_floor && values.macd > values.macd_signal;
        let action = match (ctx.is_flat(), trending) {
            (true, true) => Action::Buy,
            (false, false) => Action::Sell,
            _ => Action::Hold,
        };
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampart_core::IndicatorValues;
    use rampart_test_utils::FixedSignalProvider;

    fn ctx(closes: &[Price], shares_held: Quantity) -> DecisionContext<'_> {
        DecisionContext {
            account_id: "danny",
            step: closes.len(),
            symbol: "BTC/EUR",
            closes,
            shares_held,
            halted: false,
        }
    }

    #[test]
    fn scripted_policy_replays_then_holds() {
        let mut policy = ScriptedPolicy::from_indices(&[2, 0]).unwrap();
        assert_eq!(policy.decide(&ctx(&[1.0], 0.0)), Ok(Action::Buy));
        assert_eq!(policy.decide(&ctx(&[1.0], 0.0)), Ok(Action::Sell));
        assert_eq!(policy.decide(&ctx(&[1.0], 0.0)), Ok(Action::Hold));
        assert!(ScriptedPolicy::from_indices(&[3]).is_err());
    }

    #[test]
    fn sma_cross_detects_crossings() {
        let mut policy = SmaCross::new(SmaCrossConfig {
            fast_period: 2,
            slow_period: 4,
        })
        .unwrap();
        assert!(matches!(
            policy.decide(&ctx(&[5.0, 5.0, 5.0, 5.0], 0.0)),
            Err(StrategyError::NotReady(_))
        ));
        assert_eq!(
            policy.decide(&ctx(&[5.0, 5.0, 5.0, 5.0, 5.0, 6.0], 0.0)),
            Ok(Action::Buy)
        );
        assert_eq!(
            policy.decide(&ctx(&[5.0, 5.0, 5.0, 5.0, 5.0, 6.0, 3.0], 1.0)),
            Ok(Action::Sell)
        );
        assert_eq!(
            policy.decide(&ctx(&[5.0, 5.0, 5.0, 5.0, 5.0], 0.0)),
            Ok(Action::Hold)
        );
    }

    #[test]
    fn sma_cross_rejects_inverted_periods() {
        assert!(SmaCross::new(SmaCrossConfig {
            fast_period: 10,
            slow_period: 5,
        })
        .is_err());
    }

    #[test]
    fn signal_policy_follows_trend() {
        let mut bullish = SignalPolicy::new(Arc::new(FixedSignalProvider::bullish()), 50.0);
        assert_eq!(bullish.decide(&ctx(&[1.0, 2.0], 0.0)), Ok(Action::Buy));
        assert_eq!(bullish.decide(&ctx(&[1.0, 2.0], 3.0)), Ok(Action::Hold));

        let bearish = FixedSignalProvider {
            values: Some(IndicatorValues {
                rsi: 40.0,
                macd: -1.0,
                macd_signal: 0.0,
            }),
            ..FixedSignalProvider::default()
        };
        let mut bearish = SignalPolicy::new(Arc::new(bearish), 50.0);
        assert_eq!(bearish.decide(&ctx(&[1.0, 2.0], 3.0)), Ok(Action::Sell));
        assert_eq!(bearish.decide(&ctx(&[1.0, 2.0], 0.0)), Ok(Action::Hold));
        assert!(bearish.decide(&ctx(&[], 0.0)).is_err());
    }
}
