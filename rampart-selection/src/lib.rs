//! Pair selection: turns raw market snapshots into a ranked, persisted trading-pair list.

use std::path::PathBuf;
use std::time::Duration;

use rampart_broker::ProviderError;
use thiserror::Error;

pub mod candidate;
pub mod filter;
pub mod ranking;
pub mod retry;
pub mod selector;
pub mod storage;
pub mod store;

pub use candidate::{derive_candidate, derive_candidates, CandidateDefect};
pub use filter::PairFilter;
pub use ranking::RankingPolicy;
pub use retry::RetryPolicy;
pub use selector::{PairSelector, SelectionOutcome, SelectionRequest, SelectionStatus};
pub use storage::StorageLocator;
pub use store::PairListStore;

/// Result alias for snapshot acquisition.
pub type SelectionResult<T> = Result<T, SelectionError>;

/// Result alias for pair-list persistence.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Reasons a selection cycle could not obtain live data. Never escapes [`PairSelector`].
#[derive(Debug, Error)]
pub enum SelectionError {
    /// Every attempt failed with a transient error.
    #[error("market snapshot unavailable after {attempts} attempt(s): {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: ProviderError,
    },
    /// The provider returned an error that retrying cannot fix.
    #[error("market snapshot request rejected: {0}")]
    Rejected(#[source] ProviderError),
    /// The caller-supplied deadline elapsed before data arrived.
    #[error("selection timed out after {0:?}")]
    TimedOut(Duration),
}

/// Failures while reading or writing the persisted pair list.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed pair list {}: {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("pair list task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
