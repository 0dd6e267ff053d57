//! Rampart aggregate crate that re-exports the main components for downstream users.

pub use rampart_backtester as backtester;
pub use rampart_broker as broker;
pub use rampart_config as config;
pub use rampart_core as core;
pub use rampart_data as data;
pub use rampart_indicators as indicators;
pub use rampart_portfolio as portfolio;
pub use rampart_risk as risk;
pub use rampart_selection as selection;
pub use rampart_strategy as strategy;

/// Convenience prelude to pull commonly used items into scope.
pub mod prelude {
    pub use rampart_backtester::{
        PerformanceLedger, PerformanceReport, SessionSettings, SessionSummary, StepStatus,
        TradingSession,
    };
    pub use rampart_broker::{
        FailoverProvider, MarketSnapshotProvider, ProviderError, ProviderResult, SignalProvider,
    };
    pub use rampart_config::{load_config, AppConfig};
    pub use rampart_core::*;
    pub use rampart_data::{read_price_history, FileSnapshotProvider};
    pub use rampart_indicators::TechnicalSignalProvider;
    pub use rampart_portfolio::{Allocation, AllocationMode, PortfolioAllocator};
    pub use rampart_risk::{AccountState, RiskManager, RiskProfile, RiskTier};
    pub use rampart_selection::{PairSelector, SelectionOutcome, SelectionRequest, StorageLocator};
    pub use rampart_strategy::{DecisionContext, DecisionPolicy, SignalPolicy};
}
