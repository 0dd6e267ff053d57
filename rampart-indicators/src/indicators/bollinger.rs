use std::collections::VecDeque;

use rampart_core::Price;

use crate::core::{ensure_period, Indicator, IndicatorError, IndicatorResult};

/// Relative Bollinger band width: `(upper - lower) / middle`.
#[derive(Clone, Debug)]
pub struct BollingerWidth {
    period: usize,
    std_multiplier: f64,
    window: VecDeque<f64>,
}

impl BollingerWidth {
    pub fn new(period: usize, std_multiplier: f64) -> IndicatorResult<Self> {
        let period = ensure_period("BollingerWidth", period)?;
        if !std_multiplier.is_finite() || std_multiplier < 0.0 {
            return Err(IndicatorError::invalid_parameter(
                "BollingerWidth",
                "std_multiplier",
                std_multiplier,
            ));
        }
        Ok(Self {
            period,
            std_multiplier,
            window: VecDeque::with_capacity(period),
        })
    }

    #[must_use]
    pub fn std_multiplier(&self) -> f64 {
        self.std_multiplier
    }
}

impl Indicator for BollingerWidth {
    type Output = f64;

    fn next(&mut self, input: Price) -> Option<f64> {
        if self.window.len() == self.period {
            self.window.pop_front();
        }
        self.window.push_back(input);
        if self.window.len() < self.period {
            return None;
        }
        let n = self.period as f64;
        let middle = self.window.iter().sum::<f64>() / n;
        if middle <= 0.0 {
            return None;
        }
        let variance = self
            .window
            .iter()
            .map(|value| (value - middle).powi(2))
            .sum::<f64>()
            / n;
        Some(2.0 * self.std_multiplier * variance.sqrt() / middle)
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_series_has_zero_width() {
        let mut width = BollingerWidth::new(4, 2.0).unwrap();
        assert_eq!(width.last_over(&[10.0; 6]), Some(0.0));
    }

    #[test]
    fn width_is_four_relative_deviations_for_two_sigma() {
        let mut width = BollingerWidth::new(4, 2.0).unwrap();
        let value = width.last_over(&[8.0, 12.0, 8.0, 12.0]).unwrap();
        assert!((value - 0.8).abs() < 1e-12);
    }

    #[test]
    fn rejects_negative_multiplier() {
        assert!(BollingerWidth::new(20, -1.0).is_err());
    }
}
