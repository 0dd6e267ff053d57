//! Venue-agnostic collaborator traits used by the selection and risk layers.

use async_trait::async_trait;
use rampart_core::{IndicatorValues, MarketSnapshot, Price, VolatilityFeatures};
use serde::de::DeserializeOwned;
use thiserror::Error;

pub mod failover;

pub use failover::FailoverProvider;

/// Convenience alias for provider results.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Common error type returned by snapshot provider implementations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Represents transport-level failures (network, connection resets, etc.).
    #[error("transport error: {0}")]
    Transport(String),
    /// The request did not complete within the provider's own deadline.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// The venue asked the caller to slow down.
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Returned when authentication fails or credentials are missing.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// Returned when the request parameters are invalid for the target venue.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Wraps serialization or parsing errors.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Venue responded with a business error (maintenance, unknown market).
    #[error("exchange error: {0}")]
    Exchange(String),
    /// A catch-all branch for other issues.
    #[error("unexpected error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Helper used by providers when mapping any error type into a provider error.
    pub fn from_display(err: impl std::fmt::Display, kind: ProviderErrorKind) -> Self {
        let message = err.to_string();
        match kind {
            ProviderErrorKind::Transport => Self::Transport(message),
            ProviderErrorKind::Timeout => Self::Timeout(message),
            ProviderErrorKind::RateLimited => Self::RateLimited(message),
            ProviderErrorKind::Authentication => Self::Authentication(message),
            ProviderErrorKind::InvalidRequest => Self::InvalidRequest(message),
            ProviderErrorKind::Serialization => Self::Serialization(message),
            ProviderErrorKind::Exchange => Self::Exchange(message),
            ProviderErrorKind::Other => Self::Other(message),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::Transport(_) => ProviderErrorKind::Transport,
            Self::Timeout(_) => ProviderErrorKind::Timeout,
            Self::RateLimited(_) => ProviderErrorKind::RateLimited,
            Self::Authentication(_) => ProviderErrorKind::Authentication,
            Self::InvalidRequest(_) => ProviderErrorKind::InvalidRequest,
            Self::Serialization(_) => ProviderErrorKind::Serialization,
            Self::Exchange(_) => ProviderErrorKind::Exchange,
            Self::Other(_) => ProviderErrorKind::Other,
        }
    }

    /// Whether retrying the same request later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }
}

/// Enumerates the broad families of provider errors.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ProviderErrorKind {
    Transport,
    Timeout,
    RateLimited,
    Authentication,
    InvalidRequest,
    Serialization,
    Exchange,
    Other,
}

impl ProviderErrorKind {
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Transport | Self::Timeout | Self::RateLimited | Self::Exchange
        )
    }
}

/// Source of raw market observations for one quote currency.
#[async_trait]
pub trait MarketSnapshotProvider: Send + Sync {
    /// Human-friendly name of the provider used for logging purposes.
    fn name(&self) -> &str;

    /// Fetch every market quoted in `quote_currency`.
    async fn fetch(&self, quote_currency: &str) -> ProviderResult<Vec<MarketSnapshot>>;
}

/// Technical indicator and volatility oracle.
///
/// Implementations are pure functions of their inputs and return `None` when the series is too
/// short or the result is not finite.
pub trait SignalProvider: Send + Sync {
    /// RSI and MACD/signal for a close series, oldest first.
    fn indicators(&self, closes: &[Price]) -> Option<IndicatorValues>;

    /// Forecast volatility on the 0-100 scale consumed by the risk tiers.
    fn forecast_volatility(&self, features: &VolatilityFeatures) -> Option<f64>;

    /// Relative Bollinger band width, used to assemble [`VolatilityFeatures`].
    fn bollinger_width(&self, _closes: &[Price]) -> Option<f64> {
        None
    }
}

/// Helper trait used by providers to deserialize venue payloads.
pub trait PayloadExt: Sized {
    /// Deserialize JSON bytes into a strongly typed payload.
    fn from_json_bytes(bytes: &[u8]) -> ProviderResult<Self>
    where
        Self: DeserializeOwned,
    {
        serde_json::from_slice(bytes).map_err(|err| {
            ProviderError::Serialization(format!("failed to deserialize payload: {err}"))
        })
    }
}

impl<T> PayloadExt for T where T: DeserializeOwned {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_failures_are_transient() {
        assert!(ProviderError::Transport("reset".into()).is_transient());
        assert!(ProviderError::Timeout("slow".into()).is_transient());
        assert!(ProviderError::RateLimited("429".into()).is_transient());
        assert!(!ProviderError::Authentication("bad key".into()).is_transient());
        assert!(!ProviderError::InvalidRequest("unknown quote".into()).is_transient());
    }

    #[test]
    fn from_display_preserves_kind() {
        let err = ProviderError::from_display("boom", ProviderErrorKind::RateLimited);
        assert_eq!(err.kind(), ProviderErrorKind::RateLimited);
        assert_eq!(err.to_string(), "rate limited: boom");
    }

    #[test]
    fn payload_ext_reports_serialization_errors() {
        let snapshots = Vec::<MarketSnapshot>::from_json_bytes(br#"[{"symbol":"BTC/EUR"}]"#)
            .unwrap();
        assert_eq!(snapshots[0].symbol, "BTC/EUR");
        let err = Vec::<MarketSnapshot>::from_json_bytes(b"{").unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::Serialization);
    }
}
