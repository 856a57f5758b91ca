//! Risk policy configuration
//!
//! The named limits the policy engine enforces. One policy applies to the
//! whole account; per-symbol overrides were considered and dropped - the
//! pipeline trades a handful of symbols under one risk budget.

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Configured risk limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPolicy {
    /// Caps single-symbol exposure as a fraction of equity
    pub max_position_pct_of_equity: Decimal,
    /// Blocks new orders once daily realized+unrealized loss exceeds this
    /// fraction of equity
    pub max_daily_loss_pct: Decimal,
    /// Caps concurrent in-flight orders
    pub max_open_orders: usize,
    /// Bounds capital at risk per trade as a fraction of equity
    pub per_trade_risk_pct: Decimal,
    /// Quotes older than this are untrusted (exit-only mode)
    pub quote_freshness_secs: i64,
    /// Broker lot size: order quantities are rounded down to a multiple
    pub lot_size: Decimal,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            max_position_pct_of_equity: dec!(0.05),
            max_daily_loss_pct: dec!(0.03),
            max_open_orders: 10,
            per_trade_risk_pct: dec!(0.01),
            quote_freshness_secs: 60,
            lot_size: Decimal::ONE,
        }
    }
}

impl RiskPolicy {
    /// Quote freshness bound as a chrono duration
    pub fn quote_freshness(&self) -> Duration {
        Duration::seconds(self.quote_freshness_secs)
    }

    /// Daily loss threshold in account currency at the given equity
    pub fn daily_loss_limit(&self, equity: Decimal) -> Decimal {
        self.max_daily_loss_pct * equity
    }

    /// Max per-symbol notional at the given equity
    pub fn max_position_notional(&self, equity: Decimal) -> Decimal {
        self.max_position_pct_of_equity * equity
    }

    /// Round a quantity down to the lot size
    pub fn round_to_lot(&self, quantity: Decimal) -> Decimal {
        if self.lot_size <= Decimal::ZERO {
            return quantity;
        }
        (quantity / self.lot_size).floor() * self.lot_size
    }
}
