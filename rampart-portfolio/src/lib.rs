//! Capital allocation across the selected trading pairs.

pub mod hrp;
pub mod score;
pub mod sharpe;
pub mod stats;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use rampart_config::AllocationConfig;
use rampart_core::{AllocationVector, Price, PriceHistory, StrategyMode, Symbol};
use rampart_risk::RiskManager;

pub use hrp::hrp_weights;
pub use score::score_allocation;
pub use sharpe::{project_to_simplex, SharpeSolver};

/// Result alias for the optimizers.
pub type AllocationResult<T> = Result<T, AllocationError>;

/// Reasons an optimizer could not produce weights. The allocator recovers from all of them.
#[derive(Debug, Error, PartialEq)]
pub enum AllocationError {
    #[error("degenerate input: {0}")]
    Degenerate(String),
    #[error("optimizer did not converge within {iterations} iterations")]
    NotConverged { iterations: usize },
    #[error("optimizer produced non-finite weights")]
    NonFinite,
}

impl AllocationError {
    pub(crate) fn degenerate(reason: impl Into<String>) -> Self {
        Self::Degenerate(reason.into())
    }
}

/// Market regime used to choose the optimizer.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    /// Short recent window, hierarchical risk parity.
    Scalping,
    /// Full history, shrunk-covariance maximum Sharpe.
    Historical,
}

impl From<StrategyMode> for AllocationMode {
    fn from(mode: StrategyMode) -> Self {
        match mode {
            StrategyMode::Scalping => Self::Scalping,
            StrategyMode::Intraday | StrategyMode::Swing => Self::Historical,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMethod {
    HierarchicalRiskParity,
    MaxSharpe,
    EqualWeight,
}

/// Outcome of one allocation cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct Allocation {
    /// Weights after risk clipping; the only vector downstream code should size with.
    pub weights: AllocationVector,
    /// Optimizer output before clipping.
    pub unclipped: AllocationVector,
    pub method: AllocationMethod,
}

/// Computes allocation weights and routes them through the risk manager's exposure ceiling.
pub struct PortfolioAllocator {
    risk: RiskManager,
    config: AllocationConfig,
}

impl PortfolioAllocator {
    pub fn new(risk: RiskManager, config: AllocationConfig) -> Self {
        Self { risk, config }
    }

    pub fn risk(&self) -> &RiskManager {
        &self.risk
    }

    /// Allocate `balance` across `selected_pairs` using the optimizer for `mode`.
    ///
    /// Degenerate inputs and optimizer failures fall back to equal weights across the selected
    /// pairs. The returned weights are always clipped by [`RiskManager::clip_allocation`].
    pub fn allocate(
        &self,
        selected_pairs: &[Symbol],
        history: &PriceHistory,
        mode: AllocationMode,
        balance: Price,
    ) -> Allocation {
        let (unclipped, method) = match self.optimize(selected_pairs, history, mode) {
            Ok(result) => result,
            Err(err) => {
                warn!(
                    pairs = selected_pairs.len(),
                    ?mode,
                    error = %err,
                    "allocation optimizer failed; using equal weights"
                );
                (
                    AllocationVector::equal_weight(selected_pairs.iter().cloned()),
                    AllocationMethod::EqualWeight,
                )
            }
        };
        let weights = self.risk.clip_allocation(&unclipped, balance);
        debug!(
            ?method,
            raw_sum = unclipped.sum(),
            clipped_sum = weights.sum(),
            "allocation computed"
        );
        Allocation {
            weights,
            unclipped,
            method,
        }
    }

    fn optimize(
        &self,
        selected_pairs: &[Symbol],
        history: &PriceHistory,
        mode: AllocationMode,
    ) -> AllocationResult<(AllocationVector, AllocationMethod)> {
        let window = match mode {
            AllocationMode::Scalping => Some(self.config.scalping_window),
            AllocationMode::Historical => None,
        };
        let aligned = history.aligned(selected_pairs, window);
        if aligned.observations() < 3 {
            return Err(AllocationError::degenerate(format!(
                "{} aligned observations",
                aligned.observations()
            )));
        }
        let symbols: Vec<Symbol> = aligned.symbols().cloned().collect();
        let returns: Vec<Vec<f64>> = symbols
            .iter()
            .filter_map(|symbol| aligned.series(symbol))
            .map(stats::simple_returns)
            .collect();

        let (raw, method) = match mode {
            AllocationMode::Scalping => (hrp_weights(&returns)?, AllocationMethod::HierarchicalRiskParity),
            AllocationMode::Historical => {
                let solver = SharpeSolver {
                    risk_free_rate: self.config.risk_free_rate,
                    max_iterations: self.config.max_iterations,
                    max_volatility: self.config.max_portfolio_volatility,
                };
                (solver.solve(&returns)?, AllocationMethod::MaxSharpe)
            }
        };
        if raw.iter().any(|weight| !weight.is_finite() || *weight < 0.0) {
            return Err(AllocationError::NonFinite);
        }
        // Pairs without usable prices keep an explicit zero so the vector still names them.
        let mut weights: AllocationVector = selected_pairs
            .iter()
            .map(|symbol| (symbol.clone(), 0.0))
            .collect();
        for (symbol, weight) in symbols.into_iter().zip(raw) {
            weights.set(symbol, weight);
        }
        let weights = weights.normalized().ok_or(AllocationError::NonFinite)?;
        Ok((weights, method))
    }
}
