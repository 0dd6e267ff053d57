//! Per-account risk controls: drawdown hysteresis, volatility-adaptive tiers, position sizing
//! and allocation clipping.

use thiserror::Error;

pub mod account;
pub mod manager;
pub mod profile;
pub mod trailing;

pub use account::AccountState;
pub use manager::{DrawdownTransition, RiskManager, StopLevels};
pub use profile::{RiskProfile, RiskTier};
pub use trailing::TrailingStop;

/// Result alias for risk operations.
pub type RiskResult<T> = Result<T, RiskError>;

/// Risk-specific error type. Only raised while constructing accounts and profiles.
#[derive(Debug, Error, PartialEq)]
pub enum RiskError {
    /// A fraction fell outside `(0, 1]`.
    #[error("risk parameter '{parameter}' must lie within (0, 1] (got {value})")]
    InvalidFraction { parameter: &'static str, value: f64 },
    /// Accounts cannot start with a negative or non-finite balance.
    #[error("account '{account}' has an invalid initial balance {balance}")]
    InvalidBalance { account: String, balance: f64 },
}
