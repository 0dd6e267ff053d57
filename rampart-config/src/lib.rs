//! Layered configuration loading utilities.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use rampart_core::StrategyMode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod deserializer;

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, SettingsError>;

/// Configuration failures. These are the only errors that are fatal at startup.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Raised when a source cannot be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    /// Raised when a setting is present but outside its valid range.
    #[error("invalid setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl SettingsError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Root application configuration deserialized from layered sources.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub allocation: AllocationConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_path: None,
            selection: SelectionConfig::default(),
            risk: RiskConfig::default(),
            allocation: AllocationConfig::default(),
            session: SessionConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

/// How the volatility condition of the pair filter is evaluated.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityRule {
    /// At least one timeframe's close volatility reaches the threshold.
    #[default]
    AnyTimeframe,
    /// The absolute price-change ratio reaches the threshold.
    PriceChange,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SelectionConfig {
    #[serde(
        default = "default_quote_currency",
        deserialize_with = "deserializer::uppercase::deserialize"
    )]
    pub quote_currency: String,
    #[serde(default)]
    pub strategy_mode: StrategyMode,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_volatility_threshold")]
    pub volatility_threshold: f64,
    #[serde(default = "default_min_volume")]
    pub min_volume: f64,
    #[serde(default = "default_spread_cap")]
    pub spread_cap: f64,
    #[serde(default = "default_rsi_floor")]
    pub rsi_floor: f64,
    #[serde(default)]
    pub volatility_rule: VolatilityRule,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: f64,
    #[serde(default)]
    pub timeout_secs: Option<f64>,
}

impl SelectionConfig {
    /// Base delay of the exponential backoff.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs_f64(self.base_delay_secs.max(0.0))
    }

    /// Overall deadline for one selection cycle, when configured.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            quote_currency: default_quote_currency(),
            strategy_mode: StrategyMode::default(),
            top_n: default_top_n(),
            volatility_threshold: default_volatility_threshold(),
            min_volume: default_min_volume(),
            spread_cap: default_spread_cap(),
            rsi_floor: default_rsi_floor(),
            volatility_rule: VolatilityRule::default(),
            retries: default_retries(),
            base_delay_secs: default_base_delay_secs(),
            timeout_secs: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RiskConfig {
    #[serde(default = "default_max_drawdown_fraction")]
    pub max_drawdown_fraction: f64,
    #[serde(default = "default_risk_per_trade_fraction")]
    pub risk_per_trade_fraction: f64,
    #[serde(default = "default_max_exposure_fraction")]
    pub max_exposure_fraction: f64,
    #[serde(default = "default_trailing_stop_fraction")]
    pub trailing_stop_fraction: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_drawdown_fraction: default_max_drawdown_fraction(),
            risk_per_trade_fraction: default_risk_per_trade_fraction(),
            max_exposure_fraction: default_max_exposure_fraction(),
            trailing_stop_fraction: default_trailing_stop_fraction(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AllocationConfig {
    #[serde(default = "default_scalping_window")]
    pub scalping_window: usize,
    #[serde(default)]
    pub risk_free_rate: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Upper bound on per-period portfolio volatility for max-Sharpe weights.
    #[serde(default)]
    pub max_portfolio_volatility: Option<f64>,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            scalping_window: default_scalping_window(),
            risk_free_rate: 0.0,
            max_iterations: default_max_iterations(),
            max_portfolio_volatility: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_horizon")]
    pub horizon: usize,
    /// Overrides the strategy mode's default fee when set.
    #[serde(default)]
    pub fee_rate: Option<f64>,
    #[serde(default = "default_momentum_lookback")]
    pub momentum_lookback: usize,
    #[serde(
        default = "default_initial_balances",
        deserialize_with = "deserializer::lowercase_key::deserialize"
    )]
    pub initial_balances: BTreeMap<String, f64>,
}

impl SessionConfig {
    /// Effective proportional fee for the provided strategy mode.
    #[must_use]
    pub fn fee_rate_for(&self, mode: StrategyMode) -> f64 {
        self.fee_rate.unwrap_or_else(|| mode.default_fee_rate())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            horizon: default_horizon(),
            fee_rate: None,
            momentum_lookback: default_momentum_lookback(),
            initial_balances: default_initial_balances(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_pair_file_name")]
    pub file_name: String,
    /// Candidate directories probed in order; the first one that exists wins.
    #[serde(default = "default_mount_paths")]
    pub mount_paths: Vec<PathBuf>,
    /// Directory created when none of the mount paths exist.
    #[serde(default = "default_fallback_dir")]
    pub fallback_dir: PathBuf,
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            file_name: default_pair_file_name(),
            mount_paths: default_mount_paths(),
            fallback_dir: default_fallback_dir(),
            ledger_path: None,
        }
    }
}

impl AppConfig {
    /// Reject settings that would make the engine behave nonsensically.
    pub fn validate(&self) -> ConfigResult<()> {
        let selection = &self.selection;
        if selection.quote_currency.is_empty() {
            return Err(SettingsError::invalid(
                "selection.quote_currency",
                "must not be empty",
            ));
        }
        if selection.top_n == 0 {
            return Err(SettingsError::invalid("selection.top_n", "must be > 0"));
        }
        if selection.retries == 0 {
            return Err(SettingsError::invalid("selection.retries", "must be > 0"));
        }
        non_negative("selection.volatility_threshold", selection.volatility_threshold)?;
        non_negative("selection.min_volume", selection.min_volume)?;
        non_negative("selection.base_delay_secs", selection.base_delay_secs)?;
        fraction("selection.spread_cap", selection.spread_cap)?;
        if !(0.0..=100.0).contains(&selection.rsi_floor) {
            return Err(SettingsError::invalid(
                "selection.rsi_floor",
                format!("must lie within [0, 100] (got {})", selection.rsi_floor),
            ));
        }
        if let Some(timeout) = selection.timeout_secs {
            non_negative("selection.timeout_secs", timeout)?;
        }

        fraction("risk.max_drawdown_fraction", self.risk.max_drawdown_fraction)?;
        fraction("risk.risk_per_trade_fraction", self.risk.risk_per_trade_fraction)?;
        fraction("risk.max_exposure_fraction", self.risk.max_exposure_fraction)?;
        fraction("risk.trailing_stop_fraction", self.risk.trailing_stop_fraction)?;

        if self.allocation.scalping_window < 2 {
            return Err(SettingsError::invalid(
                "allocation.scalping_window",
                "must cover at least two observations",
            ));
        }
        if let Some(cap) = self.allocation.max_portfolio_volatility {
            if !cap.is_finite() || cap <= 0.0 {
                return Err(SettingsError::invalid(
                    "allocation.max_portfolio_volatility",
                    format!("must be a finite, positive number (got {cap})"),
                ));
            }
        }

        if self.session.horizon == 0 {
            return Err(SettingsError::invalid("session.horizon", "must be > 0"));
        }
        if let Some(fee) = self.session.fee_rate {
            if !(0.0..1.0).contains(&fee) {
                return Err(SettingsError::invalid(
                    "session.fee_rate",
                    format!("must lie within [0, 1) (got {fee})"),
                ));
            }
        }
        if self.session.initial_balances.is_empty() {
            return Err(SettingsError::invalid(
                "session.initial_balances",
                "at least one account is required",
            ));
        }
        for balance in self.session.initial_balances.values() {
            non_negative("session.initial_balances", *balance)?;
        }

        if self.persistence.file_name.trim().is_empty() {
            return Err(SettingsError::invalid(
                "persistence.file_name",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

fn non_negative(field: &'static str, value: f64) -> ConfigResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SettingsError::invalid(
            field,
            format!("must be a finite, non-negative number (got {value})"),
        ))
    }
}

fn fraction(field: &'static str, value: f64) -> ConfigResult<()> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(SettingsError::invalid(
            field,
            format!("must lie within (0, 1] (got {value})"),
        ))
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_quote_currency() -> String {
    "EUR".to_string()
}

fn default_top_n() -> usize {
    10
}

fn default_volatility_threshold() -> f64 {
    0.02
}

fn default_min_volume() -> f64 {
    1_000_000.0
}

fn default_spread_cap() -> f64 {
    0.002
}

fn default_rsi_floor() -> f64 {
    50.0
}

fn default_retries() -> u32 {
    3
}

fn default_base_delay_secs() -> f64 {
    2.0
}

fn default_max_drawdown_fraction() -> f64 {
    0.20
}

fn default_risk_per_trade_fraction() -> f64 {
    0.02
}

fn default_max_exposure_fraction() -> f64 {
    0.5
}

fn default_trailing_stop_fraction() -> f64 {
    0.05
}

fn default_scalping_window() -> usize {
    20
}

fn default_max_iterations() -> usize {
    5_000
}

fn default_horizon() -> usize {
    500
}

fn default_momentum_lookback() -> usize {
    10
}

fn default_initial_balances() -> BTreeMap<String, f64> {
    let mut balances = BTreeMap::new();
    balances.insert("danny".to_string(), 100.0);
    balances.insert("giuseppe".to_string(), 100.0);
    balances
}

fn default_pair_file_name() -> String {
    "trading_pairs.json".to_string()
}

fn default_mount_paths() -> Vec<PathBuf> {
    [
        "/mnt/usb_trading_data",
        "/media/usb",
        "/mnt/external_usb",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

fn default_fallback_dir() -> PathBuf {
    PathBuf::from("backup_data")
}

/// Loads configuration by merging files and environment variables.
///
/// Sources (lowest to highest precedence):
/// 1. `config/default.toml`
/// 2. `config/{environment}.toml` (if `environment` is Some)
/// 3. `config/local.toml` (optional, ignored in git)
/// 4. `explicit` (if provided; must exist)
/// 5. Environment variables prefixed with `RAMPART__`
pub fn load_config(env: Option<&str>, explicit: Option<&Path>) -> ConfigResult<AppConfig> {
    load_config_from(Path::new("config"), env, explicit)
}

/// Same as [`load_config`] but rooted at an arbitrary configuration directory.
pub fn load_config_from(
    base_path: &Path,
    env: Option<&str>,
    explicit: Option<&Path>,
) -> ConfigResult<AppConfig> {
    let mut builder =
        Config::builder().add_source(File::from(base_path.join("default.toml")).required(false));
    if let Some(env_name) = env {
        builder = builder
            .add_source(File::from(base_path.join(format!("{env_name}.toml"))).required(false));
    }

    builder = builder.add_source(File::from(base_path.join("local.toml")).required(false));

    if let Some(path) = explicit {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("RAMPART")
            .separator("__")
            .ignore_empty(true),
    );

    let config: AppConfig = builder.build()?.try_deserialize()?;
    config.validate()?;
    Ok(config)
}
