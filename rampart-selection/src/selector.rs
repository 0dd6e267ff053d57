//! The pair selector: fetch with backoff, filter, rank, persist, fall back.

use std::sync::Arc;
use std::time::Duration;

use rampart_broker::{MarketSnapshotProvider, ProviderError, SignalProvider};
use rampart_config::SelectionConfig;
use rampart_core::{MarketSnapshot, StrategyMode, Symbol, TradingPairList};
use serde::Serialize;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

use crate::candidate::derive_candidates;
use crate::{
    PairFilter, PairListStore, RankingPolicy, RetryPolicy, SelectionError, SelectionResult,
};

/// Parameters of one selection cycle.
#[derive(Clone, Debug)]
pub struct SelectionRequest {
    pub quote_currency: String,
    pub strategy_mode: StrategyMode,
    pub filter: PairFilter,
    pub ranking: RankingPolicy,
    pub top_n: usize,
    pub retry: RetryPolicy,
    /// Deadline for the whole acquisition, after which the cycle falls back.
    pub timeout: Option<Duration>,
}

impl SelectionRequest {
    #[must_use]
    pub fn from_config(config: &SelectionConfig) -> Self {
        Self {
            quote_currency: config.quote_currency.clone(),
            strategy_mode: config.strategy_mode,
            filter: PairFilter::from_config(config),
            ranking: RankingPolicy::for_mode(config.strategy_mode),
            top_n: config.top_n,
            retry: RetryPolicy::from_config(config),
            timeout: config.timeout(),
        }
    }

    /// Switch the strategy mode, picking the matching ranking policy.
    #[must_use]
    pub fn with_mode(mut self, mode: StrategyMode) -> Self {
        self.strategy_mode = mode;
        self.ranking = RankingPolicy::for_mode(mode);
        self
    }
}

/// Where the returned pair list came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStatus {
    /// Computed from live data in this cycle.
    Fresh,
    /// Live data was unavailable; the last persisted list was returned.
    Fallback,
    /// Neither live nor persisted data was available.
    NoData,
}

/// Result of [`PairSelector::select_pairs`].
#[derive(Clone, Debug, Serialize)]
pub struct SelectionOutcome {
    pub pairs: TradingPairList,
    pub status: SelectionStatus,
    pub attempts: u32,
    /// Why live data was not used, when it was not.
    pub error: Option<String>,
    /// Whether this cycle's list reached durable storage.
    pub persisted: bool,
}

impl SelectionOutcome {
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.status == SelectionStatus::Fresh
    }

    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.pairs.symbols
    }
}

/// Selects trading pairs from injected market and signal providers.
pub struct PairSelector {
    provider: Arc<dyn MarketSnapshotProvider>,
    signals: Arc<dyn SignalProvider>,
    store: PairListStore,
}

impl PairSelector {
    pub fn new(
        provider: Arc<dyn MarketSnapshotProvider>,
        signals: Arc<dyn SignalProvider>,
        store: PairListStore,
    ) -> Self {
        Self {
            provider,
            signals,
            store,
        }
    }

    #[must_use]
    pub fn store(&self) -> &PairListStore {
        &self.store
    }

    /// Run one selection cycle. Never fails: problems surface through the outcome status.
    #[instrument(skip_all, fields(quote = %request.quote_currency, mode = %request.strategy_mode))]
    pub async fn select_pairs(&self, request: &SelectionRequest) -> SelectionOutcome {
        let mut attempts = 0;
        let acquired = {
            let acquisition = self.acquire(request, &mut attempts);
            match request.timeout {
                Some(limit) => timeout(limit, acquisition)
                    .await
                    .unwrap_or(Err(SelectionError::TimedOut(limit))),
                None => acquisition.await,
            }
        };

        match acquired {
            Ok(snapshots) => {
                let symbols = self.evaluate(&snapshots, request);
                let pairs = TradingPairList::new(symbols, request.strategy_mode);
                let persisted = match self.store.save_async(&pairs).await {
                    Ok(()) => true,
                    Err(err) => {
                        error!(error = %err, "failed to persist trading pairs; continuing in memory");
                        false
                    }
                };
                info!(
                    pairs = pairs.len(),
                    attempts,
                    persisted,
                    "selected trading pairs"
                );
                SelectionOutcome {
                    pairs,
                    status: SelectionStatus::Fresh,
                    attempts,
                    error: None,
                    persisted,
                }
            }
            Err(err) => self.fall_back(request.strategy_mode, attempts, err).await,
        }
    }

    /// Filter and rank one batch of snapshots without touching the network or the store.
    pub fn evaluate(&self, snapshots: &[MarketSnapshot], request: &SelectionRequest) -> Vec<Symbol> {
        let candidates = derive_candidates(snapshots, self.signals.as_ref());
        let derived = candidates.len();
        let eligible: Vec<_> = candidates
            .into_iter()
            .filter(|candidate| match request.filter.rejection(candidate) {
                Some(reason) => {
                    debug!(symbol = %candidate.symbol, reason, "candidate filtered out");
                    false
                }
                None => true,
            })
            .collect();
        debug!(
            snapshots = snapshots.len(),
            derived,
            eligible = eligible.len(),
            ranking = ?request.ranking,
            "ranking candidates"
        );
        request.ranking.rank(eligible, request.top_n)
    }

    async fn acquire(
        &self,
        request: &SelectionRequest,
        attempts: &mut u32,
    ) -> SelectionResult<Vec<MarketSnapshot>> {
        let mut last_error: Option<ProviderError> = None;
        for attempt in 0..request.retry.retries() {
            *attempts = attempt + 1;
            match self.provider.fetch(&request.quote_currency).await {
                Ok(snapshots) => return Ok(snapshots),
                Err(err) => {
                    let delay = request.retry.delay_for(attempt, &err);
                    warn!(
                        provider = self.provider.name(),
                        attempt = attempt + 1,
                        error = %err,
                        ?delay,
                        "market snapshot fetch failed"
                    );
                    match delay {
                        Some(delay) => {
                            last_error = Some(err);
                            sleep(delay).await;
                        }
                        None if !err.is_transient() => return Err(SelectionError::Rejected(err)),
                        None => {
                            last_error = Some(err);
                            break;
                        }
                    }
                }
            }
        }
        Err(SelectionError::Exhausted {
            attempts: *attempts,
            source: last_error
                .unwrap_or_else(|| ProviderError::Other("no fetch attempted".into())),
        })
    }

    async fn fall_back(
        &self,
        mode: StrategyMode,
        attempts: u32,
        err: SelectionError,
    ) -> SelectionOutcome {
        warn!(error = %err, attempts, "live selection failed; loading persisted pairs");
        let (pairs, status) = match self.store.load_async(mode).await {
            Ok(Some(pairs)) => {
                info!(pairs = pairs.len(), path = %self.store.path().display(), "using persisted pairs");
                (pairs, SelectionStatus::Fallback)
            }
            Ok(None) => {
                warn!(path = %self.store.path().display(), "no persisted pairs available");
                (TradingPairList::empty(mode), SelectionStatus::NoData)
            }
            Err(load_err) => {
                error!(error = %load_err, "failed to load persisted pairs");
                (TradingPairList::empty(mode), SelectionStatus::NoData)
            }
        };
        SelectionOutcome {
            pairs,
            status,
            attempts,
            error: Some(err.to_string()),
            persisted: false,
        }
    }
}
