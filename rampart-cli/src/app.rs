use crate::telemetry::init_tracing;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rampart_backtester::{SessionSettings, TradingSession};
use rampart_broker::{FailoverProvider, MarketSnapshotProvider, SignalProvider};
use rampart_config::{load_config, AppConfig};
use rampart_core::{PriceHistory, StrategyMode, Symbol};
use rampart_data::{read_price_history, FileSnapshotProvider};
use rampart_indicators::TechnicalSignalProvider;
use rampart_portfolio::PortfolioAllocator;
use rampart_risk::{RiskManager, RiskProfile};
use rampart_selection::{PairSelector, SelectionRequest, StorageLocator};
use rampart_strategy::{DecisionPolicy, ScriptedPolicy, SignalPolicy, SmaCross, SmaCrossConfig};
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about = "Risk-adaptive pair selection and capital allocation")]
pub struct Cli {
    /// Increases logging verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Selects which configuration environment to load (maps to config/{env}.toml)
    #[arg(long, default_value = "default")]
    env: String,
    /// Additional configuration file layered over the environment files
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides every other log filter source
    #[arg(long)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one pair selection cycle against recorded market snapshots
    Select(SelectArgs),
    /// Print the persisted pair list
    InspectPairs(InspectPairsArgs),
    /// Compute capital weights for a set of pairs from a close history
    Allocate(AllocateArgs),
    /// Replay a close series through the multi-account trading session
    Simulate(SimulateArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModeArg {
    Scalping,
    Intraday,
    Swing,
}

impl From<ModeArg> for StrategyMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Scalping => Self::Scalping,
            ModeArg::Intraday => Self::Intraday,
            ModeArg::Swing => Self::Swing,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PolicyArg {
    /// Enter on RSI/MACD trend, exit when it breaks
    Signal,
    /// Fast/slow moving-average crossover
    SmaCross,
    /// Never trade; only the trailing stop acts
    Hold,
}

impl PolicyArg {
    fn build(
        self,
        signals: &Arc<dyn SignalProvider>,
        rsi_floor: f64,
    ) -> Result<Box<dyn DecisionPolicy>> {
        Ok(match self {
            Self::Signal => Box::new(SignalPolicy::new(signals.clone(), rsi_floor)),
            Self::SmaCross => Box::new(SmaCross::new(SmaCrossConfig::default())?),
            Self::Hold => Box::new(ScriptedPolicy::default()),
        })
    }
}

fn resolve_mode(arg: Option<ModeArg>, config: &AppConfig) -> StrategyMode {
    arg.map(StrategyMode::from)
        .unwrap_or(config.selection.strategy_mode)
}

#[derive(Args)]
pub struct SelectArgs {
    /// Snapshot files tried in order; later files serve as failover sources
    #[arg(long = "snapshots", value_name = "PATH", num_args = 1.., required = true)]
    snapshots: Vec<PathBuf>,
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
    /// Quote currency override (e.g. EUR)
    #[arg(long)]
    quote: Option<String>,
    #[arg(long)]
    top_n: Option<usize>,
    /// Deadline for the whole cycle in seconds
    #[arg(long)]
    timeout: Option<f64>,
}

impl SelectArgs {
    async fn run(&self, config: &AppConfig) -> Result<()> {
        let mode = resolve_mode(self.mode, config);
        let providers: Vec<Arc<dyn MarketSnapshotProvider>> = self
            .snapshots
            .iter()
            .map(|path| Arc::new(FileSnapshotProvider::new(path)) as Arc<dyn MarketSnapshotProvider>)
            .collect();
        let market = FailoverProvider::new(providers)?;
        let store = StorageLocator::from_config(&config.persistence)
            .pair_list_store(&config.persistence.file_name)?;
        let signals: Arc<dyn SignalProvider> = Arc::new(TechnicalSignalProvider::default());
        let selector = PairSelector::new(Arc::new(market), signals, store);

        let mut request = SelectionRequest::from_config(&config.selection).with_mode(mode);
        if let Some(quote) = &self.quote {
            request.quote_currency = quote.trim().to_uppercase();
        }
        if let Some(top_n) = self.top_n {
            if top_n == 0 {
                bail!("--top-n must be greater than zero");
            }
            request.top_n = top_n;
        }
        if let Some(secs) = self.timeout {
            if !(secs.is_finite() && secs > 0.0) {
                bail!("--timeout must be a positive number of seconds");
            }
            request.timeout = Some(Duration::from_secs_f64(secs));
        }

        info!(
            mode = %mode,
            quote = %request.quote_currency,
            sources = self.snapshots.len(),
            "starting pair selection"
        );
        let outcome = selector.select_pairs(&request).await;
        if let Some(error) = &outcome.error {
            warn!(status = ?outcome.status, %error, "live selection unavailable");
        }
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        Ok(())
    }
}

#[derive(Args)]
pub struct InspectPairsArgs {
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
}

impl InspectPairsArgs {
    fn run(&self, config: &AppConfig) -> Result<()> {
        let mode = resolve_mode(self.mode, config);
        let store = StorageLocator::from_config(&config.persistence)
            .pair_list_store(&config.persistence.file_name)?;
        match store.load(mode)? {
            Some(list) => println!("{}", serde_json::to_string_pretty(&list)?),
            None => println!(
                "no persisted pair list for mode {mode} at {}",
                store.path().display()
            ),
        }
        Ok(())
    }
}

#[derive(Args)]
pub struct AllocateArgs {
    /// Close history (CSV with symbol/close columns, or JSON)
    #[arg(long)]
    history: PathBuf,
    /// Comma-separated pairs; defaults to the persisted list, then every symbol in the history
    #[arg(long, value_delimiter = ',')]
    pairs: Vec<Symbol>,
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
    /// Capital to distribute
    #[arg(long, default_value_t = 1000.0)]
    balance: f64,
}

impl AllocateArgs {
    fn run(&self, config: &AppConfig) -> Result<()> {
        if !(self.balance.is_finite() && self.balance >= 0.0) {
            bail!("--balance must be a non-negative number");
        }
        let mode = resolve_mode(self.mode, config);
        let history = read_price_history(&self.history)?;
        let pairs = resolve_pairs(&self.pairs, config, mode, &history)?;
        if pairs.is_empty() {
            bail!("no pairs to allocate");
        }

        let allocator = build_allocator(config)?;
        let allocation = allocator.allocate(&pairs, &history, mode.into(), self.balance);
        info!(
            pairs = pairs.len(),
            method = ?allocation.method,
            weight_sum = allocation.weights.sum(),
            "allocation ready"
        );
        let capital = allocation.weights.capital(self.balance);
        println!("method: {:?}", allocation.method);
        for (symbol, weight) in allocation.weights.iter() {
            let amount = capital.get(symbol).copied().unwrap_or_default();
            println!("{symbol:<16} weight {weight:>8.4}  capital {amount:>12.2}");
        }
        Ok(())
    }
}

#[derive(Args)]
pub struct SimulateArgs {
    /// Close history (CSV with symbol/close columns, or JSON)
    #[arg(long)]
    history: PathBuf,
    /// Symbol whose closes drive the session
    #[arg(long)]
    symbol: Symbol,
    #[arg(long, value_enum, default_value = "signal")]
    policy: PolicyArg,
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
    /// Maximum number of steps; defaults to the configured horizon
    #[arg(long)]
    horizon: Option<usize>,
    /// Where to write the JSONL performance ledger
    #[arg(long)]
    ledger: Option<PathBuf>,
    /// Pairs sharing capital with the simulated symbol (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pairs: Vec<Symbol>,
}

impl SimulateArgs {
    fn run(&self, config: &AppConfig) -> Result<()> {
        let mode = resolve_mode(self.mode, config);
        let history = read_price_history(&self.history)?;
        let closes = history
            .series(&self.symbol)
            .ok_or_else(|| anyhow!("symbol {} not found in {}", self.symbol, self.history.display()))?
            .to_vec();

        let mut pairs = resolve_pairs(&self.pairs, config, mode, &history)?;
        if !pairs.contains(&self.symbol) {
            pairs.push(self.symbol.clone());
        }
        let reference_balance = config
            .session
            .initial_balances
            .values()
            .copied()
            .fold(0.0_f64, f64::max);
        let allocation = build_allocator(config)?.allocate(
            &pairs,
            &history,
            mode.into(),
            reference_balance,
        );

        let mut settings = SessionSettings::from_config(config, self.symbol.clone());
        settings.mode = mode;
        settings.fee_rate = config.session.fee_rate_for(mode);
        if let Some(horizon) = self.horizon {
            settings.horizon = horizon;
        }

        let signals: Arc<dyn SignalProvider> = Arc::new(TechnicalSignalProvider::default());
        let mut session = TradingSession::new(settings, closes)?
            .with_signals(signals.clone())
            .with_allocation(allocation.weights);
        for (account_id, balance) in &config.session.initial_balances {
            let policy = self.policy.build(&signals, config.selection.rsi_floor)?;
            session.add_account(account_id.clone(), *balance, policy)?;
        }

        info!(
            session = %session.id(),
            symbol = %self.symbol,
            mode = %mode,
            horizon = session.horizon(),
            accounts = config.session.initial_balances.len(),
            "starting simulation"
        );
        let summary = session.run()?;
        for report in &summary.reports {
            println!("{report}");
        }

        let ledger_path = self
            .ledger
            .clone()
            .or_else(|| config.persistence.ledger_path.clone());
        if let Some(path) = ledger_path {
            summary
                .ledger
                .export_jsonl(&path)
                .with_context(|| format!("failed to export ledger to {}", path.display()))?;
            info!(path = %path.display(), entries = summary.ledger.len(), "ledger exported");
        }
        Ok(())
    }
}

fn build_allocator(config: &AppConfig) -> Result<PortfolioAllocator> {
    let risk = RiskManager::new(RiskProfile::from(&config.risk))?;
    Ok(PortfolioAllocator::new(risk, config.allocation.clone()))
}

/// Explicit pairs win, then the persisted list for `mode`, then every symbol in the history.
fn resolve_pairs(
    explicit: &[Symbol],
    config: &AppConfig,
    mode: StrategyMode,
    history: &PriceHistory,
) -> Result<Vec<Symbol>> {
    if !explicit.is_empty() {
        let unique: BTreeSet<Symbol> = explicit
            .iter()
            .map(|symbol| symbol.trim())
            .filter(|symbol| !symbol.is_empty())
            .map(str::to_string)
            .collect();
        return Ok(unique.into_iter().collect());
    }
    let store = StorageLocator::from_config(&config.persistence)
        .pair_list_store(&config.persistence.file_name)?;
    match store.load(mode) {
        Ok(Some(list)) if !list.is_empty() => return Ok(list.symbols),
        Ok(_) => {}
        Err(err) => warn!(error = %err, "persisted pair list unreadable; using history symbols"),
    }
    Ok(history.symbols().cloned().collect())
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(Some(&cli.env), cli.config.as_deref())
        .context("failed to load configuration")?;

    let filter = match &cli.log_level {
        Some(level) => level.clone(),
        None => std::env::var("RUST_LOG").unwrap_or_else(|_| match cli.verbose {
            0 => config.log_level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }),
    };
    init_tracing(&filter, config.log_path.as_deref()).context("failed to initialize logging")?;

    match &cli.command {
        Commands::Select(args) => args.run(&config).await?,
        Commands::InspectPairs(args) => args.run(&config)?,
        Commands::Allocate(args) => args.run(&config)?,
        Commands::Simulate(args) => args.run(&config)?,
    }

    Ok(())
}
