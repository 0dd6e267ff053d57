use std::fs;

use rampart_broker::{MarketSnapshotProvider, ProviderErrorKind};
use rampart_core::Timeframe;
use rampart_data::FileSnapshotProvider;
use tempfile::tempdir;

#[tokio::test]
async fn serves_markets_for_the_requested_quote() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshots.json");
    fs::write(
        &path,
        r#"[
            {"symbol": "BTC/EUR", "active": true, "bid": 100.0, "ask": 100.05,
             "quote_volume": 2500000.0, "closes": {"1h": [99.0, 100.0]}},
            {"symbol": "BTC/USDT", "active": true},
            {"symbol": "ETH/EUR", "active": false}
        ]"#,
    )
    .unwrap();

    let provider = FileSnapshotProvider::new(&path);
    let snapshots = provider.fetch("EUR").await.unwrap();
    let symbols: Vec<_> = snapshots.iter().map(|s| s.symbol.as_str()).collect();
    assert_eq!(symbols, ["BTC/EUR", "ETH/EUR"]);
    assert_eq!(snapshots[0].closes(Timeframe::OneHour), &[99.0, 100.0]);
    assert!(provider.name().starts_with("file:"));
}

#[tokio::test]
async fn missing_file_is_not_retried() {
    let dir = tempdir().unwrap();
    let provider = FileSnapshotProvider::new(dir.path().join("absent.json"));
    let err = provider.fetch("EUR").await.unwrap_err();
    assert_eq!(err.kind(), ProviderErrorKind::InvalidRequest);
    assert!(!err.is_transient());
}

#[tokio::test]
async fn malformed_file_is_a_serialization_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshots.json");
    fs::write(&path, "{not json").unwrap();
    let err = FileSnapshotProvider::new(&path).fetch("EUR").await.unwrap_err();
    assert_eq!(err.kind(), ProviderErrorKind::Serialization);
}
