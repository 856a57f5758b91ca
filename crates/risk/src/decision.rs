//! Risk decision types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Why a signal was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    InsufficientBuyingPower,
    PositionLimitExceeded,
    DailyLossLimitBreached,
    TooManyOpenOrders,
    /// Quote missing or older than the configured freshness bound
    StaleMarketData,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsufficientBuyingPower => "insufficient_buying_power",
            Self::PositionLimitExceeded => "position_limit_exceeded",
            Self::DailyLossLimitBreached => "daily_loss_limit_breached",
            Self::TooManyOpenOrders => "too_many_open_orders",
            Self::StaleMarketData => "stale_market_data",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which limit produced a quantity cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitKind {
    /// max_position_pct_of_equity headroom
    PositionLimit,
    /// Account buying power
    BuyingPower,
}

/// A limit that bounded the approved quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedLimit {
    pub kind: LimitKind,
    /// The quantity this limit alone would allow
    pub cap_quantity: Decimal,
}

/// Result of one risk evaluation
///
/// Ephemeral: produced per evaluation, recorded to the audit log, never
/// consulted again after the decision's order is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskDecision {
    pub approved: bool,
    /// Largest quantity the policy allows for this trade (zero when
    /// rejected); already rounded down to lot size
    pub max_quantity: Decimal,
    pub reason: Option<RejectReason>,
    /// Every limit that was evaluated into the cap, most restrictive wins
    pub limits_applied: Vec<AppliedLimit>,
}

impl RiskDecision {
    pub fn approve(max_quantity: Decimal, limits_applied: Vec<AppliedLimit>) -> Self {
        Self {
            approved: true,
            max_quantity,
            reason: None,
            limits_applied,
        }
    }

    pub fn reject(reason: RejectReason) -> Self {
        Self {
            approved: false,
            max_quantity: Decimal::ZERO,
            reason: Some(reason),
            limits_applied: Vec::new(),
        }
    }

    /// The limit that ended up binding (smallest cap), if any
    pub fn binding_limit(&self) -> Option<AppliedLimit> {
        self.limits_applied
            .iter()
            .copied()
            .min_by(|a, b| a.cap_quantity.cmp(&b.cap_quantity))
    }
}
