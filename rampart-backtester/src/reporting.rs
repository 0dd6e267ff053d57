use std::fmt;

use itertools::Itertools;
use rampart_core::{AccountId, Price};
use serde::Serialize;

use crate::LedgerEntry;

/// Per-account summary produced when a session ends.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub account_id: AccountId,
    pub steps: usize,
    pub initial_net_worth: Price,
    pub ending_net_worth: Price,
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    /// Mean over standard deviation of per-step returns, not annualized.
    pub sharpe_ratio: f64,
    pub total_trades: usize,
    pub halted_steps: usize,
}

impl fmt::Display for PerformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Session Report: {}", self.account_id)?;
        writeln!(f, "------------------------------------")?;
        writeln!(f, "{:<25} {}", "Steps", self.steps)?;
        writeln!(f, "{:<25} {:.2}", "Initial Net Worth", self.initial_net_worth)?;
        writeln!(f, "{:<25} {:.2}", "Ending Net Worth", self.ending_net_worth)?;
        writeln!(f, "{:<25} {:.2}%", "Total Return", self.total_return_pct)?;
        writeln!(f, "{:<25} {:.2}%", "Max Drawdown", self.max_drawdown_pct)?;
        writeln!(f, "{:<25} {:.4}", "Sharpe Ratio", self.sharpe_ratio)?;
        writeln!(f, "------------------------------------")?;
        writeln!(f, "{:<25} {}", "Total Trades", self.total_trades)?;
        writeln!(f, "{:<25} {}", "Halted Steps", self.halted_steps)?;
        writeln!(f, "------------------------------------")
    }
}

/// Derives a [`PerformanceReport`] from one account's ledger entries.
pub struct Reporter<'a> {
    account_id: &'a str,
    initial_net_worth: Price,
    entries: Vec<&'a LedgerEntry>,
}

impl<'a> Reporter<'a> {
    pub fn new(
        account_id: &'a str,
        initial_net_worth: Price,
        entries: impl IntoIterator<Item = &'a LedgerEntry>,
    ) -> Self {
        Self {
            account_id,
            initial_net_worth,
            entries: entries.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn calculate(&self) -> PerformanceReport {
        let ending_net_worth = self
            .entries
            .last()
            .map_or(self.initial_net_worth, |entry| entry.net_worth);
        let total_return_pct = if self.initial_net_worth > 0.0 {
            (ending_net_worth / self.initial_net_worth - 1.0) * 100.0
        } else {
            0.0
        };
        PerformanceReport {
            account_id: self.account_id.to_string(),
            steps: self.entries.len(),
            initial_net_worth: self.initial_net_worth,
            ending_net_worth,
            total_return_pct,
            max_drawdown_pct: self.max_drawdown() * 100.0,
            sharpe_ratio: self.sharpe_ratio(),
            total_trades: self.entries.iter().filter(|entry| entry.is_trade()).count(),
            halted_steps: self.entries.iter().filter(|entry| entry.halted).count(),
        }
    }

    fn equity_curve(&self) -> impl Iterator<Item = Price> + '_ {
        std::iter::once(self.initial_net_worth).chain(self.entries.iter().map(|entry| entry.net_worth))
    }

    fn step_returns(&self) -> Vec<f64> {
        self.equity_curve()
            .tuple_windows()
            .filter(|(previous, _)| *previous > 0.0)
            .map(|(previous, current)| current / previous - 1.0)
            .collect()
    }

    fn sharpe_ratio(&self) -> f64 {
        let returns = self.step_returns();
        let n = returns.len() as f64;
        if n < 2.0 {
            return 0.0;
        }
        let mean = returns.iter().sum::<f64>() / n;
        let std_dev = (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();
        if std_dev > 1e-12 {
            mean / std_dev
        } else {
            0.0
        }
    }

    fn max_drawdown(&self) -> f64 {
        let mut peak = self.initial_net_worth;
        let mut max_drawdown: f64 = 0.0;
        for equity in self.equity_curve() {
            peak = peak.max(equity);
            if peak > 0.0 {
                max_drawdown = max_drawdown.max((peak - equity) / peak);
            }
        }
        max_drawdown
    }
}
