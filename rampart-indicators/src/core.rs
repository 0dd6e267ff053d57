//! Core traits shared by all indicators.

use rampart_core::Price;
use thiserror::Error;

/// Convenience alias for indicator construction results.
pub type IndicatorResult<T> = Result<T, IndicatorError>;

/// Common configuration errors emitted by indicators.
#[derive(Debug, Error, PartialEq)]
pub enum IndicatorError {
    /// Returned when a period of zero is provided.
    #[error("{name} requires period > 0 (got {period})")]
    InvalidPeriod {
        /// Human-readable indicator name.
        name: &'static str,
        /// User-provided period value.
        period: usize,
    },
    /// Returned when a parameter must be finite and non-negative.
    #[error("{name} parameter '{parameter}' must be non-negative (got {value})")]
    InvalidParameter {
        /// Human-readable indicator name.
        name: &'static str,
        /// Name of the invalid parameter (e.g., `std_multiplier`).
        parameter: &'static str,
        /// Provided parameter value.
        value: f64,
    },
}

impl IndicatorError {
    /// Helper constructor for invalid period errors.
    pub fn invalid_period(name: &'static str, period: usize) -> Self {
        Self::InvalidPeriod { name, period }
    }

    /// Helper constructor for invalid parameter errors.
    pub fn invalid_parameter(name: &'static str, parameter: &'static str, value: f64) -> Self {
        Self::InvalidParameter {
            name,
            parameter,
            value,
        }
    }
}

pub(crate) fn ensure_period(name: &'static str, period: usize) -> IndicatorResult<usize> {
    if period == 0 {
        Err(IndicatorError::invalid_period(name, period))
    } else {
        Ok(period)
    }
}

/// Core abstraction implemented by every indicator in the library.
pub trait Indicator {
    /// Value produced after each update.
    type Output;

    /// Consumes a new close price and returns the most recent value, if available.
    fn next(&mut self, input: Price) -> Option<Self::Output>;

    /// Resets the indicator to its initial state.
    fn reset(&mut self);

    /// Replays a full series from a clean state and returns the final value.
    fn last_over(&mut self, series: &[Price]) -> Option<Self::Output>
    where
        Self: Sized,
    {
        self.reset();
        series.iter().fold(None, |_, price| self.next(*price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(usize);

    impl Indicator for Counter {
        type Output = usize;

        fn next(&mut self, _input: Price) -> Option<usize> {
            self.0 += 1;
            (self.0 >= 2).then_some(self.0)
        }

        fn reset(&mut self) {
            self.0 = 0;
        }
    }

    #[test]
    fn last_over_replays_from_clean_state() {
        let mut counter = Counter(10);
        assert_eq!(counter.last_over(&[1.0, 2.0, 3.0]), Some(3));
        assert_eq!(counter.last_over(&[1.0]), None);
        assert_eq!(counter.last_over(&[]), None);
    }

    #[test]
    fn zero_period_is_rejected() {
        assert_eq!(
            ensure_period("EMA", 0),
            Err(IndicatorError::invalid_period("EMA", 0))
        );
        assert_eq!(ensure_period("EMA", 3), Ok(3));
    }
}
