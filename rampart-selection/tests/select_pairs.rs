use std::fs;
use std::sync::Arc;
use std::time::Duration;

use rampart_broker::{FailoverProvider, MarketSnapshotProvider, ProviderErrorKind};
use rampart_config::SelectionConfig;
use rampart_core::{StrategyMode, Timeframe, TradingPairList};
use rampart_indicators::TechnicalSignalProvider;
use rampart_selection::{PairListStore, PairSelector, SelectionRequest, SelectionStatus};
use rampart_test_utils::{eligible_snapshot, trending_closes, ScriptedResponse, ScriptedSnapshotProvider};
use tempfile::tempdir;
use tokio::time::Instant;

fn selector(provider: &ScriptedSnapshotProvider, store: PairListStore) -> PairSelector {
    let provider: Arc<dyn MarketSnapshotProvider> = Arc::new(provider.clone());
    PairSelector::new(provider, Arc::new(TechnicalSignalProvider::default()), store)
}

fn request(mode: StrategyMode) -> SelectionRequest {
    SelectionRequest::from_config(&SelectionConfig::default()).with_mode(mode)
}

fn market() -> Vec<rampart_core::MarketSnapshot> {
    vec![
        eligible_snapshot("LOWVOL/EUR", 2_000_000.0, 0.01),
        eligible_snapshot("LIQUID/EUR", 9_000_000.0, 0.02),
        eligible_snapshot("WILD/EUR", 3_000_000.0, 0.08),
    ]
}

#[tokio::test(start_paused = true)]
async fn backoff_waits_before_falling_back_to_persisted_list() {
    let dir = tempdir().unwrap();
    let store = PairListStore::in_dir(dir.path(), "trading_pairs.json");
    let previous = TradingPairList::new(
        vec!["BTC/EUR".to_string(), "ETH/EUR".to_string()],
        StrategyMode::Swing,
    );
    store.save(&previous).unwrap();

    let provider = ScriptedSnapshotProvider::always_failing();
    let selector = selector(&provider, store);
    let mut request = request(StrategyMode::Swing);
    request.retry = rampart_selection::RetryPolicy::new(3, Duration::from_secs(2));

    let started = Instant::now();
    let outcome = selector.select_pairs(&request).await;
    let waited = started.elapsed();

    assert!(waited >= Duration::from_secs(14), "waited only {waited:?}");
    assert_eq!(provider.calls(), 3);
    assert_eq!(outcome.status, SelectionStatus::Fallback);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.symbols(), previous.symbols.as_slice());
    assert!(outcome.error.is_some());
}

#[tokio::test(start_paused = true)]
async fn exhaustion_without_persisted_list_reports_no_data() {
    let dir = tempdir().unwrap();
    let store = PairListStore::in_dir(dir.path(), "trading_pairs.json");
    let provider = ScriptedSnapshotProvider::always_failing();
    let outcome = selector(&provider, store)
        .select_pairs(&request(StrategyMode::Swing))
        .await;
    assert_eq!(outcome.status, SelectionStatus::NoData);
    assert!(outcome.pairs.is_empty());
}

#[tokio::test(start_paused = true)]
async fn transient_failure_then_success_is_fresh() {
    let dir = tempdir().unwrap();
    let store = PairListStore::in_dir(dir.path(), "trading_pairs.json");
    let provider = ScriptedSnapshotProvider::serving(market());
    provider.push(ScriptedResponse::transient("reset")).await;

    let outcome = selector(&provider, store.clone())
        .select_pairs(&request(StrategyMode::Swing))
        .await;
    assert_eq!(outcome.status, SelectionStatus::Fresh);
    assert_eq!(outcome.attempts, 2);
    assert!(outcome.persisted);
    let stored = store.load(StrategyMode::Swing).unwrap().unwrap();
    assert_eq!(stored.symbols, outcome.pairs.symbols);
}

#[tokio::test(start_paused = true)]
async fn permanent_failure_skips_remaining_attempts() {
    let dir = tempdir().unwrap();
    let store = PairListStore::in_dir(dir.path(), "trading_pairs.json");
    let provider = ScriptedSnapshotProvider::new(ScriptedResponse::fail(
        ProviderErrorKind::Authentication,
        "bad key",
    ));
    let started = Instant::now();
    let outcome = selector(&provider, store)
        .select_pairs(&request(StrategyMode::Swing))
        .await;
    assert_eq!(provider.calls(), 1);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(outcome.status, SelectionStatus::NoData);
}

#[tokio::test(start_paused = true)]
async fn caller_timeout_behaves_like_exhaustion() {
    let dir = tempdir().unwrap();
    let store = PairListStore::in_dir(dir.path(), "trading_pairs.json");
    store
        .save(&TradingPairList::new(vec!["XRP/EUR".into()], StrategyMode::Swing))
        .unwrap();
    let provider = ScriptedSnapshotProvider::new(ScriptedResponse::delayed(
        Duration::from_secs(60),
        ScriptedResponse::Snapshots(market()),
    ));
    let mut request = request(StrategyMode::Swing);
    request.timeout = Some(Duration::from_secs(5));

    let started = Instant::now();
    let outcome = selector(&provider, store).select_pairs(&request).await;
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(outcome.status, SelectionStatus::Fallback);
    assert_eq!(outcome.symbols(), ["XRP/EUR".to_string()]);
}

#[tokio::test]
async fn ranking_policy_follows_strategy_mode() {
    let dir = tempdir().unwrap();
    let provider = ScriptedSnapshotProvider::serving(market());

    let scalping = selector(&provider, PairListStore::in_dir(dir.path(), "scalping.json"))
        .select_pairs(&request(StrategyMode::Scalping))
        .await;
    assert_eq!(scalping.symbols(), ["WILD/EUR", "LIQUID/EUR", "LOWVOL/EUR"]);

    let swing = selector(&provider, PairListStore::in_dir(dir.path(), "swing.json"))
        .select_pairs(&request(StrategyMode::Swing))
        .await;
    assert_eq!(swing.symbols(), ["LIQUID/EUR", "WILD/EUR", "LOWVOL/EUR"]);
}

#[tokio::test]
async fn only_eligible_markets_are_selected() {
    let dir = tempdir().unwrap();
    let mut thin = eligible_snapshot("THIN/EUR", 10_000.0, 0.05);
    thin.quote_volume = Some(10_000.0);
    let mut wide = eligible_snapshot("WIDE/EUR", 5_000_000.0, 0.05);
    wide.ask = wide.bid.map(|bid| bid * 1.01);
    let mut falling = eligible_snapshot("FALL/EUR", 5_000_000.0, 0.05);
    falling
        .closes
        .insert(Timeframe::OneHour, trending_closes(60, 100.0, -0.01));
    let mut halted = eligible_snapshot("HALT/EUR", 5_000_000.0, 0.05);
    halted.active = false;
    let mut broken = eligible_snapshot("BROKEN/EUR", 5_000_000.0, 0.05);
    broken.bid = None;
    let good = eligible_snapshot("GOOD/EUR", 5_000_000.0, 0.05);

    let provider =
        ScriptedSnapshotProvider::serving(vec![thin, wide, falling, halted, broken, good]);
    let outcome = selector(&provider, PairListStore::in_dir(dir.path(), "pairs.json"))
        .select_pairs(&request(StrategyMode::Intraday))
        .await;
    assert_eq!(outcome.status, SelectionStatus::Fresh);
    assert_eq!(outcome.symbols(), ["GOOD/EUR"]);
}

#[tokio::test]
async fn repeated_runs_are_idempotent() {
    let dir = tempdir().unwrap();
    let store = PairListStore::in_dir(dir.path(), "trading_pairs.json");
    let provider = ScriptedSnapshotProvider::serving(market());
    let selector = selector(&provider, store.clone());
    let request = request(StrategyMode::Swing);

    let first = selector.select_pairs(&request).await;
    let first_bytes = fs::read(store.path()).unwrap();
    let second = selector.select_pairs(&request).await;
    let second_bytes = fs::read(store.path()).unwrap();

    assert_eq!(first.pairs.symbols, second.pairs.symbols);
    assert_eq!(first_bytes, second_bytes);
}

#[tokio::test(start_paused = true)]
async fn failover_source_serves_when_primary_is_down() {
    let dir = tempdir().unwrap();
    let store = PairListStore::in_dir(dir.path(), "trading_pairs.json");
    let primary = ScriptedSnapshotProvider::always_failing().named("primary");
    let backup = ScriptedSnapshotProvider::serving(market()).named("backup");
    let market: Arc<dyn MarketSnapshotProvider> = Arc::new(
        FailoverProvider::new(vec![
            Arc::new(primary.clone()) as Arc<dyn MarketSnapshotProvider>,
            Arc::new(backup.clone()) as Arc<dyn MarketSnapshotProvider>,
        ])
        .unwrap(),
    );
    assert_eq!(market.name(), "primary|backup");

    let selector = PairSelector::new(market, Arc::new(TechnicalSignalProvider::default()), store);
    let outcome = selector.select_pairs(&request(StrategyMode::Swing)).await;
    assert_eq!(outcome.status, SelectionStatus::Fresh);
    assert_eq!(outcome.attempts, 1);
    assert_eq!((primary.calls(), backup.calls()), (1, 1));
}
