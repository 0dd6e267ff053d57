//! Execution loop that steps independent accounts over a price series under risk control.

pub mod ledger;
pub mod reporting;
pub mod session;

use std::path::PathBuf;

use rampart_core::AccountId;
use rampart_risk::RiskError;
use thiserror::Error;

pub use ledger::{LedgerEntry, PerformanceLedger};
pub use reporting::{PerformanceReport, Reporter};
pub use session::{AccountPhase, SessionSettings, SessionSummary, StepStatus, TradingSession};

/// Result alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session needs at least one price")]
    NoPrices,
    #[error("price at step {step} is not a positive finite number ({price})")]
    InvalidPrice { step: usize, price: f64 },
    #[error("account '{0}' is already part of the session")]
    DuplicateAccount(AccountId),
    #[error("session has no accounts")]
    NoAccounts,
    #[error("session already finished after {steps} step(s)")]
    Finished { steps: usize },
    #[error(transparent)]
    Risk(#[from] RiskError),
    #[error("failed to write ledger {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode ledger entry: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
