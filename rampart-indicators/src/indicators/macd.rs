use rampart_core::Price;

use crate::core::{Indicator, IndicatorError, IndicatorResult};
use crate::indicators::Ema;

/// Output of the [`Macd`] indicator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MacdOutput {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Moving average convergence/divergence with its signal line.
#[derive(Clone, Debug)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> IndicatorResult<Self> {
        if fast >= slow {
            return Err(IndicatorError::invalid_period("MACD fast", fast));
        }
        Ok(Self {
            fast: Ema::new(fast)?,
            slow: Ema::new(slow)?,
            signal: Ema::new(signal)?,
        })
    }

    /// Standard 12/26/9 configuration.
    pub fn standard() -> IndicatorResult<Self> {
        Self::new(12, 26, 9)
    }
}

impl Indicator for Macd {
    type Output = MacdOutput;

    fn next(&mut self, input: Price) -> Option<MacdOutput> {
        let fast = self.fast.next(input);
        let slow = self.slow.next(input)?;
        let macd = fast? - slow;
        let signal = self.signal.next(macd)?;
        Some(MacdOutput {
            macd,
            signal,
            histogram: macd - signal,
        })
    }

    fn reset(&mut self) {
        self.fast.reset();
        self.slow.reset();
        self.signal.reset();
    }
}
