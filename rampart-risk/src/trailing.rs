use rampart_core::Price;
use serde::Serialize;

/// Tracks the most favorable price since entry and fires once the price retreats by the
/// configured fraction.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrailingStop {
    fraction: f64,
    peak: Option<Price>,
}

impl TrailingStop {
    #[must_use]
    pub fn new(fraction: f64) -> Self {
        Self {
            fraction: fraction.clamp(0.0, 1.0),
            peak: None,
        }
    }

    /// Start tracking a freshly opened position.
    pub fn arm(&mut self, entry: Price) {
        if entry.is_finite() && entry > 0.0 {
            self.peak = Some(self.peak.map_or(entry, |peak| peak.max(entry)));
        }
    }

    pub fn disarm(&mut self) {
        self.peak = None;
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.peak.is_some()
    }

    /// Tighten or loosen the stop distance for subsequent updates.
    pub fn set_fraction(&mut self, fraction: f64) {
        if fraction.is_finite() {
            self.fraction = fraction.clamp(0.0, 1.0);
        }
    }

    #[must_use]
    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    /// Current exit level, when armed.
    #[must_use]
    pub fn level(&self) -> Option<Price> {
        self.peak.map(|peak| peak * (1.0 - self.fraction))
    }

    /// Feed a new price. Returns `true` when the stop is hit.
    pub fn update(&mut self, price: Price) -> bool {
        let Some(peak) = self.peak else {
            return false;
        };
        if !price.is_finite() {
            return false;
        }
        if price > peak {
            self.peak = Some(price);
            return false;
        }
        price <= peak * (1.0 - self.fraction)
    }
}
