use std::sync::Arc;

use async_trait::async_trait;
use rampart_core::MarketSnapshot;
use tracing::warn;

use crate::{MarketSnapshotProvider, ProviderError, ProviderResult};

/// Snapshot provider that tries a prioritized list of providers and returns the first success.
///
/// A fetch only fails when every provider failed. The reported error is the first transient one
/// so that callers keep retrying while any venue may still recover.
pub struct FailoverProvider {
    providers: Vec<Arc<dyn MarketSnapshotProvider>>,
    name: String,
}

impl FailoverProvider {
    pub fn new(providers: Vec<Arc<dyn MarketSnapshotProvider>>) -> ProviderResult<Self> {
        if providers.is_empty() {
            return Err(ProviderError::InvalidRequest(
                "failover provider requires at least one provider".into(),
            ));
        }
        let name = providers
            .iter()
            .map(|provider| provider.name())
            .collect::<Vec<_>>()
            .join("|");
        Ok(Self { providers, name })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl MarketSnapshotProvider for FailoverProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, quote_currency: &str) -> ProviderResult<Vec<MarketSnapshot>> {
        let mut first_transient: Option<ProviderError> = None;
        let mut last_error: Option<ProviderError> = None;
        for provider in &self.providers {
            match provider.fetch(quote_currency).await {
                Ok(snapshots) => return Ok(snapshots),
                Err(err) => {
                    warn!(provider = provider.name(), error = %err, "snapshot provider failed");
                    if err.is_transient() && first_transient.is_none() {
                        first_transient = Some(err);
                    } else {
                        last_error = Some(err);
                    }
                }
            }
        }
        Err(first_transient
            .or(last_error)
            .unwrap_or_else(|| ProviderError::Other("no providers configured".into())))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Fixed {
        name: &'static str,
        outcome: fn() -> ProviderResult<Vec<MarketSnapshot>>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(name: &'static str, outcome: fn() -> ProviderResult<Vec<MarketSnapshot>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                outcome,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MarketSnapshotProvider for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, _quote_currency: &str) -> ProviderResult<Vec<MarketSnapshot>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    fn one_market() -> ProviderResult<Vec<MarketSnapshot>> {
        Ok(vec![MarketSnapshot {
            symbol: "ETH/EUR".into(),
            active: true,
            ..MarketSnapshot::default()
        }])
    }

    #[tokio::test]
    async fn returns_first_successful_provider() {
        let primary = Fixed::new("primary", || Err(ProviderError::Transport("down".into())));
        let secondary = Fixed::new("secondary", one_market);
        let tertiary = Fixed::new("tertiary", one_market);
        let failover = FailoverProvider::new(vec![
            primary.clone() as Arc<dyn MarketSnapshotProvider>,
            secondary.clone() as Arc<dyn MarketSnapshotProvider>,
            tertiary.clone() as Arc<dyn MarketSnapshotProvider>,
        ])
        .unwrap();

        let snapshots = failover.fetch("EUR").await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(tertiary.calls.load(Ordering::SeqCst), 0);
        assert_eq!(failover.name(), "primary|secondary|tertiary");
    }

    #[tokio::test]
    async fn prefers_transient_error_when_all_fail() {
        let auth = Fixed::new("auth", || Err(ProviderError::Authentication("key".into())));
        let flaky = Fixed::new("flaky", || Err(ProviderError::Timeout("slow".into())));
        let failover = FailoverProvider::new(vec![
            auth as Arc<dyn MarketSnapshotProvider>,
            flaky as Arc<dyn MarketSnapshotProvider>,
        ])
        .unwrap();
        let err = failover.fetch("EUR").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn rejects_empty_provider_list() {
        assert!(FailoverProvider::new(Vec::new()).is_err());
    }
}
