//! Streaming technical indicators used to derive selection signals and volatility forecasts.

pub mod core;
pub mod indicators;
pub mod signal;

pub use crate::core::{Indicator, IndicatorError, IndicatorResult};
pub use indicators::{relative_volatility, BollingerWidth, Ema, Macd, MacdOutput, Rsi};
pub use signal::TechnicalSignalProvider;
