//! Offline market data: snapshot files for pair selection and close histories for allocation
//! and simulation.

pub mod history;
pub mod snapshots;

pub use history::{read_price_history, write_price_history, DatasetFormat};
pub use snapshots::FileSnapshotProvider;
