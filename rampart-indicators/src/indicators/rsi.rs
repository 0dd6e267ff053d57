use rampart_core::Price;

use crate::core::{ensure_period, Indicator, IndicatorResult};

/// Relative strength index with Wilder smoothing.
///
/// The first value is produced after `period + 1` closes.
#[derive(Clone, Debug)]
pub struct Rsi {
    period: usize,
    previous: Option<f64>,
    gains: f64,
    losses: f64,
    changes: usize,
    averages: Option<(f64, f64)>,
}

impl Rsi {
    pub fn new(period: usize) -> IndicatorResult<Self> {
        let period = ensure_period("RSI", period)?;
        Ok(Self {
            period,
            previous: None,
            gains: 0.0,
            losses: 0.0,
            changes: 0,
            averages: None,
        })
    }

    fn value_from(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss == 0.0 {
            if avg_gain == 0.0 {
                50.0
            } else {
                100.0
            }
        } else {
            100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
        }
    }
}

impl Indicator for Rsi {
    type Output = f64;

    fn next(&mut self, input: Price) -> Option<f64> {
        let previous = self.previous.replace(input)?;
        let change = input - previous;
        let (gain, loss) = (change.max(0.0), (-change).max(0.0));
        let period = self.period as f64;

        match self.averages {
            Some((avg_gain, avg_loss)) => {
                let avg_gain = (avg_gain * (period - 1.0) + gain) / period;
                let avg_loss = (avg_loss * (period - 1.0) + loss) / period;
                self.averages = Some((avg_gain, avg_loss));
            }
            None => {
                self.gains += gain;
                self.losses += loss;
                self.changes += 1;
                if self.changes == self.period {
                    self.averages = Some((self.gains / period, self.losses / period));
                }
            }
        }
        self.averages
            .map(|(avg_gain, avg_loss)| Self::value_from(avg_gain, avg_loss))
    }

    fn reset(&mut self) {
        self.previous = None;
        self.gains = 0.0;
        self.losses = 0.0;
        self.changes = 0;
        self.averages = None;
    }
}
