//! Indicator-backed implementation of the [`SignalProvider`] collaborator.

use rampart_broker::SignalProvider;
use rampart_core::{IndicatorValues, Price, VolatilityFeatures};

use crate::core::{Indicator, IndicatorResult};
use crate::indicators::{BollingerWidth, Macd, Rsi};

/// Default signal provider built from streaming indicators.
///
/// The volatility forecast is a realized-volatility proxy: a `k = 2` Bollinger width spans four
/// relative deviations, so `100 * width / 4` expresses one deviation on the 0-100 scale.
#[derive(Clone, Debug)]
pub struct TechnicalSignalProvider {
    rsi_period: usize,
    macd_periods: (usize, usize, usize),
    bollinger_period: usize,
    bollinger_multiplier: f64,
}

impl TechnicalSignalProvider {
    pub fn new(
        rsi_period: usize,
        macd_periods: (usize, usize, usize),
        bollinger_period: usize,
        bollinger_multiplier: f64,
    ) -> IndicatorResult<Self> {
        // Validate eagerly so later replays cannot fail on configuration.
        Rsi::new(rsi_period)?;
        Macd::new(macd_periods.0, macd_periods.1, macd_periods.2)?;
        BollingerWidth::new(bollinger_period, bollinger_multiplier)?;
        Ok(Self {
            rsi_period,
            macd_periods,
            bollinger_period,
            bollinger_multiplier,
        })
    }
}

impl Default for TechnicalSignalProvider {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_periods: (12, 26, 9),
            bollinger_period: 20,
            bollinger_multiplier: 2.0,
        }
    }
}

impl SignalProvider for TechnicalSignalProvider {
    fn indicators(&self, closes: &[Price]) -> Option<IndicatorValues> {
        let rsi = Rsi::new(self.rsi_period).ok()?.last_over(closes)?;
        let (fast, slow, signal) = self.macd_periods;
        let macd = Macd::new(fast, slow, signal).ok()?.last_over(closes)?;
        let values = IndicatorValues {
            rsi,
            macd: macd.macd,
            macd_signal: macd.signal,
        };
        (values.rsi.is_finite() && values.macd.is_finite() && values.macd_signal.is_finite())
            .then_some(values)
    }

    fn forecast_volatility(&self, features: &VolatilityFeatures) -> Option<f64> {
        let width = features.bollinger_width;
        if !width.is_finite() || width < 0.0 {
            return None;
        }
        let spread_multiplier = 2.0 * self.bollinger_multiplier;
        if spread_multiplier <= 0.0 {
            return None;
        }
        let forecast = 100.0 * width / spread_multiplier;
        forecast.is_finite().then_some(forecast)
    }

    fn bollinger_width(&self, closes: &[Price]) -> Option<f64> {
        BollingerWidth::new(self.bollinger_period, self.bollinger_multiplier)
            .ok()?
            .last_over(closes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending(len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| 100.0 + i as f64 + if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect()
    }

    #[test]
    fn indicators_require_enough_history() {
        let provider = TechnicalSignalProvider::default();
        assert!(provider.indicators(&trending(20)).is_none());
        let values = provider.indicators(&trending(60)).unwrap();
        assert!(values.rsi > 50.0);
        assert!(values.macd > 0.0);
    }

    #[test]
    fn forecast_scales_bollinger_width() {
        let provider = TechnicalSignalProvider::default();
        let features = VolatilityFeatures {
            bollinger_width: 0.4,
            ..VolatilityFeatures::default()
        };
        let forecast = provider.forecast_volatility(&features).unwrap();
        assert!((forecast - 10.0).abs() < 1e-12);

        let broken = VolatilityFeatures {
            bollinger_width: f64::NAN,
            ..VolatilityFeatures::default()
        };
        assert!(provider.forecast_volatility(&broken).is_none());
    }

    #[test]
    fn bollinger_width_matches_indicator() {
        let provider = TechnicalSignalProvider::new(14, (12, 26, 9), 4, 2.0).unwrap();
        let width = provider.bollinger_width(&[8.0, 12.0, 8.0, 12.0]).unwrap();
        assert!((width - 0.8).abs() < 1e-12);
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        assert!(TechnicalSignalProvider::new(0, (12, 26, 9), 20, 2.0).is_err());
        assert!(TechnicalSignalProvider::new(14, (26, 12, 9), 20, 2.0).is_err());
    }
}
