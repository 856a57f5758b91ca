//! Position Sizer
//!
//! Turns an approved risk decision into an order quantity. Capital at risk
//! per trade is bounded by `per_trade_risk_pct` of equity against the
//! signal's stop distance, then clamped to the decision's cap and rounded
//! down to the broker lot size.

use crate::decision::RiskDecision;
use crate::policy::RiskPolicy;
use aegis_core::{AccountSnapshot, Direction, Quote, Side, Signal};
use log::debug;
use rust_decimal::Decimal;

/// Sizing outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sizing {
    Quantity(Decimal),
    /// Computed quantity rounded to zero - the signal is a no-op, not an
    /// error
    ZeroQuantity,
}

pub struct PositionSizer;

impl PositionSizer {
    /// quantity = floor(per_trade_risk_pct * equity / stop_distance),
    /// clamped to the risk decision's cap and the lot size.
    ///
    /// Without a stop price the whole notional is treated as at risk, so
    /// the quantity falls back to risk budget / entry price.
    pub fn size(
        signal: &Signal,
        decision: &RiskDecision,
        account: &AccountSnapshot,
        quote: &Quote,
        policy: &RiskPolicy,
    ) -> Sizing {
        if !decision.approved {
            return Sizing::ZeroQuantity;
        }

        let side = match signal.direction {
            Direction::Long => Side::Buy,
            Direction::Short => Side::Sell,
            Direction::Flat => return Sizing::ZeroQuantity,
        };
        let entry = quote.aggressive_price(side);

        let risk_budget = policy.per_trade_risk_pct * account.equity;
        let stop_distance = signal
            .stop_price
            .map(|stop| (entry - stop).abs())
            .filter(|d| *d > Decimal::ZERO)
            .unwrap_or(entry);
        if stop_distance <= Decimal::ZERO {
            return Sizing::ZeroQuantity;
        }

        let raw = risk_budget / stop_distance;
        let quantity = policy.round_to_lot(raw.min(decision.max_quantity));

        debug!(
            "[SIZER] {} risk_budget={} stop_distance={} raw={} capped={}",
            signal.symbol, risk_budget, stop_distance, raw, quantity
        );

        if quantity <= Decimal::ZERO {
            Sizing::ZeroQuantity
        } else {
            Sizing::Quantity(quantity)
        }
    }
}
