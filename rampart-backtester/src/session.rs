//! Per-step, per-account execution state machine.
//!
//! Each step every account moves `Idle -> Updated -> {Idle, Halted}`: the policy's action is
//! applied at the step's close, then the account's own risk manager evaluates the drawdown
//! rule. The session ends once the step count reaches the horizon.

use std::collections::BTreeMap;
use std::sync::Arc;

use rampart_broker::SignalProvider;
use rampart_config::AppConfig;
use rampart_core::{
    AccountId, Action, AllocationVector, Price, StrategyMode, Symbol, VolatilityFeatures,
};
use rampart_risk::{AccountState, RiskManager, RiskProfile, TrailingStop};
use rampart_strategy::{DecisionContext, DecisionPolicy, StrategyError};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{LedgerEntry, PerformanceLedger, PerformanceReport, Reporter, SessionError, SessionResult};

/// Per-account position in the step state machine.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountPhase {
    Idle,
    Updated,
    Halted,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepStatus {
    Running,
    /// The horizon was reached; further steps are rejected.
    Done,
}

/// Session-constant trading parameters.
#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub symbol: Symbol,
    pub mode: StrategyMode,
    pub horizon: usize,
    pub fee_rate: f64,
    pub momentum_lookback: usize,
    pub risk: RiskProfile,
    /// Forecast used every step when no signal provider is attached.
    pub forecast: Option<f64>,
}

impl SessionSettings {
    pub fn new(symbol: impl Into<Symbol>, mode: StrategyMode) -> Self {
        let defaults = rampart_config::SessionConfig::default();
        Self {
            symbol: symbol.into(),
            mode,
            horizon: defaults.horizon,
            fee_rate: defaults.fee_rate_for(mode),
            momentum_lookback: defaults.momentum_lookback,
            risk: RiskProfile::default(),
            forecast: None,
        }
    }

    pub fn from_config(config: &AppConfig, symbol: impl Into<Symbol>) -> Self {
        let mode = config.selection.strategy_mode;
        Self {
            symbol: symbol.into(),
            mode,
            horizon: config.session.horizon,
            fee_rate: config.session.fee_rate_for(mode),
            momentum_lookback: config.session.momentum_lookback,
            risk: RiskProfile::from(&config.risk),
            forecast: None,
        }
    }
}

struct SessionAccount {
    state: AccountState,
    risk: RiskManager,
    trailing: TrailingStop,
    policy: Box<dyn DecisionPolicy>,
    phase: AccountPhase,
    initial_net_worth: Price,
    previous_net_worth: Price,
}

/// Inputs shared by every account within one step.
struct StepInputs<'a> {
    step: usize,
    symbol: &'a str,
    closes: &'a [Price],
    price: Price,
    momentum: f64,
    forecast: Option<f64>,
    weight: f64,
    fee_rate: f64,
}

/// What a finished session leaves behind.
#[derive(Debug)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub ledger: PerformanceLedger,
    pub reports: Vec<PerformanceReport>,
}

pub struct TradingSession {
    id: Uuid,
    settings: SessionSettings,
    closes: Vec<Price>,
    allocation: AllocationVector,
    signals: Option<Arc<dyn SignalProvider>>,
    accounts: BTreeMap<AccountId, SessionAccount>,
    ledger: PerformanceLedger,
    step: usize,
}

impl TradingSession {
    pub fn new(settings: SessionSettings, closes: Vec<Price>) -> SessionResult<Self> {
        if closes.is_empty() {
            return Err(SessionError::NoPrices);
        }
        if let Some((step, price)) = closes
            .iter()
            .enumerate()
            .find(|(_, price)| !(price.is_finite() && **price > 0.0))
        {
            return Err(SessionError::InvalidPrice {
                step,
                price: *price,
            });
        }
        Ok(Self {
            id: Uuid::new_v4(),
            settings,
            closes,
            allocation: AllocationVector::new(),
            signals: None,
            accounts: BTreeMap::new(),
            ledger: PerformanceLedger::new(),
            step: 0,
        })
    }

    /// Derive the volatility forecast from the closes seen so far instead of the static one.
    #[must_use]
    pub fn with_signals(mut self, signals: Arc<dyn SignalProvider>) -> Self {
        self.signals = Some(signals);
        self
    }

    #[must_use]
    pub fn with_allocation(mut self, allocation: AllocationVector) -> Self {
        self.allocation = allocation;
        self
    }

    /// Replace the allocation used to size subsequent entries.
    pub fn set_allocation(&mut self, allocation: AllocationVector) {
        self.allocation = allocation;
    }

    pub fn add_account(
        &mut self,
        account_id: impl Into<AccountId>,
        initial_balance: Price,
        policy: Box<dyn DecisionPolicy>,
    ) -> SessionResult<()> {
        let account_id = account_id.into();
        if self.accounts.contains_key(&account_id) {
            return Err(SessionError::DuplicateAccount(account_id));
        }
        let state = AccountState::new(account_id.clone(), initial_balance)?;
        let risk = RiskManager::new(self.settings.risk)?;
        let trailing = risk.trailing_stop();
        self.accounts.insert(
            account_id,
            SessionAccount {
                state,
                risk,
                trailing,
                policy,
                phase: AccountPhase::Idle,
                initial_net_worth: initial_balance,
                previous_net_worth: initial_balance,
            },
        );
        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of steps already processed.
    #[must_use]
    pub fn steps_taken(&self) -> usize {
        self.step
    }

    /// Steps the session will run: the configured horizon, bounded by the available prices.
    #[must_use]
    pub fn horizon(&self) -> usize {
        self.settings.horizon.min(self.closes.len())
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.step >= self.horizon()
    }

    #[must_use]
    pub fn ledger(&self) -> &PerformanceLedger {
        &self.ledger
    }

    #[must_use]
    pub fn account(&self, account_id: &str) -> Option<&AccountState> {
        self.accounts.get(account_id).map(|account| &account.state)
    }

    #[must_use]
    pub fn phase(&self, account_id: &str) -> Option<AccountPhase> {
        self.accounts.get(account_id).map(|account| account.phase)
    }

    /// Advance every account by one step.
    pub fn step(&mut self) -> SessionResult<StepStatus> {
        if self.accounts.is_empty() {
            return Err(SessionError::NoAccounts);
        }
        if self.is_done() {
            return Err(SessionError::Finished { steps: self.step });
        }
        let step = self.step;
        let closes = &self.closes[..=step];
        let inputs = StepInputs {
            step,
            symbol: &self.settings.symbol,
            closes,
            price: closes[step],
            momentum: momentum(closes, self.settings.momentum_lookback),
            forecast: self.forecast(closes),
            weight: self.allocation.weight_for(&self.settings.symbol),
            fee_rate: self.settings.fee_rate,
        };
        for account in self.accounts.values_mut() {
            let entry = step_account(account, &inputs);
            self.ledger.record(entry);
        }
        self.step += 1;

        if self.is_done() {
            info!(session = %self.id, steps = self.step, "session complete");
            Ok(StepStatus::Done)
        } else {
            Ok(StepStatus::Running)
        }
    }

    /// Step until the horizon and summarize.
    pub fn run(mut self) -> SessionResult<SessionSummary> {
        info!(
            session = %self.id,
            symbol = %self.settings.symbol,
            accounts = self.accounts.len(),
            horizon = self.horizon(),
            "starting session"
        );
        while self.step()? == StepStatus::Running {}
        Ok(self.finish())
    }

    /// Summarize the steps taken so far.
    #[must_use]
    pub fn finish(self) -> SessionSummary {
        let reports = self
            .accounts
            .iter()
            .map(|(account_id, account)| {
                Reporter::new(
                    account_id,
                    account.initial_net_worth,
                    self.ledger.for_account(account_id),
                )
                .calculate()
            })
            .collect();
        SessionSummary {
            session_id: self.id,
            ledger: self.ledger,
            reports,
        }
    }

    fn forecast(&self, closes: &[Price]) -> Option<f64> {
        let Some(signals) = &self.signals else {
            return self.settings.forecast;
        };
        let bollinger_width = signals.bollinger_width(closes)?;
        let first = closes.first().copied()?;
        let last = closes.last().copied()?;
        let features = VolatilityFeatures {
            quote_volume: 0.0,
            price_change: last - first,
            rsi: signals.indicators(closes).map_or(50.0, |values| values.rsi),
            bollinger_width,
        };
        signals.forecast_volatility(&features)
    }
}

/// Return over the last `lookback` steps, clamped to `[0, 1]`.
fn momentum(closes: &[Price], lookback: usize) -> f64 {
    if lookback == 0 || closes.len() <= lookback {
        return 0.0;
    }
    let current = closes[closes.len() - 1];
    let past = closes[closes.len() - 1 - lookback];
    if past <= 0.0 {
        return 0.0;
    }
    (current / past - 1.0).clamp(0.0, 1.0)
}

fn step_account(account: &mut SessionAccount, inputs: &StepInputs<'_>) -> LedgerEntry {
    let price = inputs.price;
    account.state.mark_price(price);
    account.risk.adjust_for_forecast(inputs.forecast);
    account
        .trailing
        .set_fraction(account.risk.profile().trailing_stop_fraction);

    let halted = account.state.is_halted();
    let stop_triggered = account.state.shares_held() > 0.0 && account.trailing.update(price);

    let ctx = DecisionContext {
        account_id: account.state.account_id(),
        step: inputs.step,
        symbol: inputs.symbol,
        closes: inputs.closes,
        shares_held: account.state.shares_held(),
        halted,
    };
    let requested = match account.policy.decide(&ctx) {
        Ok(action) => action,
        Err(StrategyError::NotReady(reason)) => {
            debug!(account = ctx.account_id, %reason, "policy not ready; holding");
            Action::Hold
        }
        Err(err) => {
            warn!(account = ctx.account_id, policy = account.policy.name(), error = %err, "policy failed; holding");
            Action::Hold
        }
    };

    let intended = if stop_triggered { Action::Sell } else { requested };
    let executed = match intended {
        Action::Buy if halted => {
            debug!(account = account.state.account_id(), step = inputs.step, "entry suppressed while halted");
            Action::Hold
        }
        Action::Buy => {
            let balance = account.state.balance();
            let notional = (account.risk.compute_position_size(balance, inputs.momentum)
                * inputs.weight)
                .min(balance);
            let shares = account.state.apply_buy(notional, price, inputs.fee_rate);
            if shares > 0.0 {
                account.trailing.arm(price);
                Action::Buy
            } else {
                Action::Hold
            }
        }
        Action::Sell if account.state.shares_held() > 0.0 => {
            account.state.apply_sell(price, inputs.fee_rate);
            account.trailing.disarm();
            Action::Sell
        }
        Action::Sell | Action::Hold => Action::Hold,
    };
    account.phase = AccountPhase::Updated;

    let transition = account.risk.update_drawdown_state(&mut account.state);
    account.phase = if account.state.is_halted() {
        AccountPhase::Halted
    } else {
        AccountPhase::Idle
    };

    let net_worth = account.state.net_worth();
    let reward = net_worth - account.previous_net_worth;
    account.previous_net_worth = net_worth;

    if executed != Action::Hold {
        info!(
            account = account.state.account_id(),
            step = inputs.step,
            action = ?executed,
            price,
            balance = account.state.balance(),
            net_worth,
            stop_triggered,
            "trade applied"
        );
    }

    LedgerEntry {
        step: inputs.step,
        account_id: account.state.account_id().to_string(),
        requested,
        executed,
        price,
        balance: account.state.balance(),
        shares_held: account.state.shares_held(),
        net_worth,
        reward,
        drawdown: account.state.drawdown(),
        halted: account.state.is_halted(),
        transition,
        stop_triggered,
    }
}
