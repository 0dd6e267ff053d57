use rampart_core::{AccountId, Price, Quantity};
use serde::Serialize;

use crate::{RiskError, RiskResult};

/// Cash, position and drawdown bookkeeping for one independent account.
///
/// Net worth is always derived from the balance, the shares held and the last marked price.
/// The kill switch can only be flipped by [`RiskManager::update_drawdown_state`].
///
/// [`RiskManager::update_drawdown_state`]: crate::RiskManager::update_drawdown_state
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AccountState {
    account_id: AccountId,
    balance: Price,
    shares_held: Quantity,
    current_price: Price,
    entry_price: Option<Price>,
    highest_balance_seen: Price,
    min_balance_seen: Price,
    kill_switch_active: bool,
}

impl AccountState {
    pub fn new(account_id: impl Into<AccountId>, initial_balance: Price) -> RiskResult<Self> {
        let account_id = account_id.into();
        if !initial_balance.is_finite() || initial_balance < 0.0 {
            return Err(RiskError::InvalidBalance {
                account: account_id,
                balance: initial_balance,
            });
        }
        Ok(Self {
            account_id,
            balance: initial_balance,
            shares_held: 0.0,
            current_price: 0.0,
            entry_price: None,
            highest_balance_seen: initial_balance,
            min_balance_seen: initial_balance,
            kill_switch_active: false,
        })
    }

    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    #[must_use]
    pub fn balance(&self) -> Price {
        self.balance
    }

    #[must_use]
    pub fn shares_held(&self) -> Quantity {
        self.shares_held
    }

    #[must_use]
    pub fn current_price(&self) -> Price {
        self.current_price
    }

    #[must_use]
    pub fn entry_price(&self) -> Option<Price> {
        self.entry_price
    }

    #[must_use]
    pub fn highest_balance_seen(&self) -> Price {
        self.highest_balance_seen
    }

    #[must_use]
    pub fn min_balance_seen(&self) -> Price {
        self.min_balance_seen
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.kill_switch_active
    }

    /// Cash plus the mark-to-market value of the held shares.
    #[must_use]
    pub fn net_worth(&self) -> Price {
        self.balance + self.shares_held * self.current_price
    }

    /// Fractional decline of net worth from the session peak (0 when the peak is zero).
    #[must_use]
    pub fn drawdown(&self) -> f64 {
        if self.highest_balance_seen <= 0.0 {
            return 0.0;
        }
        ((self.highest_balance_seen - self.net_worth()) / self.highest_balance_seen).max(0.0)
    }

    /// Record the latest market price for the held position.
    pub fn mark_price(&mut self, price: Price) {
        if price.is_finite() && price > 0.0 {
            self.current_price = price;
        }
    }

    /// Spend up to `notional` of cash on shares at `price`, paying a proportional fee.
    ///
    /// Returns the number of shares acquired.
    pub fn apply_buy(&mut self, notional: Price, price: Price, fee_rate: f64) -> Quantity {
        self.mark_price(price);
        if !(price.is_finite() && price > 0.0) || !notional.is_finite() || notional <= 0.0 {
            return 0.0;
        }
        let notional = notional.min(self.balance);
        if notional <= 0.0 {
            return 0.0;
        }
        let shares = notional / price * (1.0 - fee_rate);
        let previous_cost = self.entry_price.unwrap_or(price) * self.shares_held;
        self.balance -= notional;
        self.shares_held += shares;
        self.entry_price = Some((previous_cost + price * shares) / self.shares_held);
        shares
    }

    /// Liquidate the whole position at `price`, net of the proportional fee.
    ///
    /// Returns the cash received.
    pub fn apply_sell(&mut self, price: Price, fee_rate: f64) -> Price {
        self.mark_price(price);
        if self.shares_held <= 0.0 || !(price.is_finite() && price > 0.0) {
            return 0.0;
        }
        let proceeds = self.shares_held * price * (1.0 - fee_rate);
        self.balance += proceeds;
        self.shares_held = 0.0;
        self.entry_price = None;
        proceeds
    }

    pub(crate) fn observe_net_worth(&mut self) -> Price {
        let net_worth = self.net_worth();
        self.highest_balance_seen = self.highest_balance_seen.max(net_worth);
        self.min_balance_seen = self.min_balance_seen.min(net_worth);
        net_worth
    }

    pub(crate) fn set_kill_switch(&mut self, active: bool) {
        self.kill_switch_active = active;
    }
}
