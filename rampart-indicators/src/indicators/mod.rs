mod bollinger;
mod ema;
mod macd;
mod rsi;

pub use bollinger::BollingerWidth;
pub use ema::Ema;
pub use macd::{Macd, MacdOutput};
pub use rsi::Rsi;

use rampart_core::Price;

/// Coefficient of variation of a close series: population standard deviation over the mean.
///
/// Returns `None` for empty series or a non-positive mean.
#[must_use]
pub fn relative_volatility(closes: &[Price]) -> Option<f64> {
    if closes.is_empty() {
        return None;
    }
    let n = closes.len() as f64;
    let mean = closes.iter().sum::<f64>() / n;
    if !mean.is_finite() || mean <= 0.0 {
        return None;
    }
    let variance = closes.iter().map(|close| (close - mean).powi(2)).sum::<f64>() / n;
    let volatility = variance.sqrt() / mean;
    volatility.is_finite().then_some(volatility)
}
