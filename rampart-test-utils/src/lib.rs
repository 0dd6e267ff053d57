//! Utilities for exercising rampart components against scripted market data.

pub mod fixtures;
pub mod scenario;

pub use fixtures::{
    eligible_snapshot, oscillating_closes, price_history, trending_closes, FixedSignalProvider,
};
pub use scenario::{ScriptedResponse, ScriptedSnapshotProvider};
