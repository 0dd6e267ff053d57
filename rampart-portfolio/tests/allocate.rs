use rampart_config::AllocationConfig;
use rampart_core::{PriceHistory, Symbol, WEIGHT_EPSILON};
use rampart_portfolio::{AllocationMethod, AllocationMode, PortfolioAllocator};
use rampart_risk::{RiskManager, RiskProfile};
use rampart_test_utils::price_history;

fn allocator(max_exposure: f64) -> PortfolioAllocator {
    let profile = RiskProfile {
        max_exposure_fraction: max_exposure,
        ..RiskProfile::default()
    };
    PortfolioAllocator::new(RiskManager::new(profile).unwrap(), AllocationConfig::default())
}

fn pairs(symbols: &[&str]) -> Vec<Symbol> {
    symbols.iter().map(|symbol| symbol.to_string()).collect()
}

#[test]
fn successful_runs_sum_to_one_before_clipping() {
    let symbols = ["AAA/EUR", "BBB/EUR", "CCC/EUR", "DDD/EUR"];
    let history = price_history(&symbols, 120);
    let allocator = allocator(1.0);
    for (mode, method) in [
        (AllocationMode::Scalping, AllocationMethod::HierarchicalRiskParity),
        (AllocationMode::Historical, AllocationMethod::MaxSharpe),
    ] {
        let allocation = allocator.allocate(&pairs(&symbols), &history, mode, 10_000.0);
        assert_eq!(allocation.method, method);
        let sum = allocation.unclipped.sum();
        assert!(sum <= 1.0 + WEIGHT_EPSILON && sum >= 1.0 - WEIGHT_EPSILON, "sum {sum}");
        assert!(allocation.unclipped.iter().all(|(_, weight)| *weight >= 0.0));
        assert!(allocation.weights.is_bounded());
    }
}

#[test]
fn clipping_never_increases_the_sum() {
    let symbols = ["AAA/EUR", "BBB/EUR", "CCC/EUR"];
    let history = price_history(&symbols, 120);
    let allocator = allocator(0.4);
    for mode in [AllocationMode::Scalping, AllocationMode::Historical] {
        let allocation = allocator.allocate(&pairs(&symbols), &history, mode, 10_000.0);
        assert!(allocation.weights.sum() <= allocation.unclipped.sum() + WEIGHT_EPSILON);
        assert!(allocation
            .weights
            .iter()
            .all(|(_, weight)| *weight >= 0.0 && *weight <= 0.4 + WEIGHT_EPSILON));
    }
}

#[test]
fn single_priced_pair_falls_back_to_equal_weight() {
    let history = price_history(&["AAA/EUR"], 60);
    let selected = pairs(&["AAA/EUR", "BBB/EUR"]);
    let allocation = allocator(0.5).allocate(&selected, &history, AllocationMode::Historical, 500.0);
    assert_eq!(allocation.method, AllocationMethod::EqualWeight);
    assert!((allocation.weights.weight_for("AAA/EUR") - 0.5).abs() < 1e-12);
    assert!((allocation.weights.weight_for("BBB/EUR") - 0.5).abs() < 1e-12);
}

#[test]
fn flat_prices_are_degenerate() {
    let mut history = PriceHistory::new();
    history.insert("AAA/EUR", vec![10.0; 40]);
    history.insert("BBB/EUR", vec![20.0; 40]);
    let selected = pairs(&["AAA/EUR", "BBB/EUR"]);
    for mode in [AllocationMode::Scalping, AllocationMode::Historical] {
        let allocation = allocator(1.0).allocate(&selected, &history, mode, 500.0);
        assert_eq!(allocation.method, AllocationMethod::EqualWeight);
    }
}

#[test]
fn scalping_only_reads_the_recent_window() {
    let symbols = ["AAA/EUR", "BBB/EUR", "CCC/EUR"];
    let history = price_history(&symbols, 100);
    let mut rewritten = PriceHistory::new();
    for symbol in symbols {
        let mut closes = history.series(symbol).unwrap().to_vec();
        let cutoff = closes.len() - AllocationConfig::default().scalping_window;
        for (i, close) in closes.iter_mut().take(cutoff).enumerate() {
            *close *= if i % 2 == 0 { 3.0 } else { 0.2 };
        }
        rewritten.insert(symbol, closes);
    }

    let allocator = allocator(1.0);
    let original = allocator.allocate(&pairs(&symbols), &history, AllocationMode::Scalping, 1_000.0);
    let shocked = allocator.allocate(&pairs(&symbols), &rewritten, AllocationMode::Scalping, 1_000.0);
    for symbol in symbols {
        assert!(
            (original.weights.weight_for(symbol) - shocked.weights.weight_for(symbol)).abs()
                < 1e-12
        );
    }
}

#[test]
fn zero_balance_allocates_nothing() {
    let symbols = ["AAA/EUR", "BBB/EUR"];
    let history = price_history(&symbols, 60);
    let allocation = allocator(0.5).allocate(&pairs(&symbols), &history, AllocationMode::Scalping, 0.0);
    assert_eq!(allocation.weights.sum(), 0.0);
}
