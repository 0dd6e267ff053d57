use rampart_core::Price;

use crate::core::{ensure_period, Indicator, IndicatorResult};

/// Exponential moving average seeded with the simple average of the first `period` inputs.
#[derive(Clone, Debug)]
pub struct Ema {
    period: usize,
    alpha: f64,
    seed_sum: f64,
    seen: usize,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> IndicatorResult<Self> {
        let period = ensure_period("EMA", period)?;
        Ok(Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            seed_sum: 0.0,
            seen: 0,
            value: None,
        })
    }

    #[must_use]
    pub fn period(&self) -> usize {
        self.period
    }

    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

impl Indicator for Ema {
    type Output = f64;

    fn next(&mut self, input: Price) -> Option<f64> {
        match self.value {
            Some(previous) => {
                let next = previous + self.alpha * (input - previous);
                self.value = Some(next);
            }
            None => {
                self.seed_sum += input;
                self.seen += 1;
                if self.seen == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.value
    }

    fn reset(&mut self) {
        self.seed_sum = 0.0;
        self.seen = 0;
        self.value = None;
    }
}
