//! Risk Policy Engine
//!
//! Evaluates a proposed trade against the configured limits. This module
//! doesn't track state - everything it needs (account snapshot, position,
//! quote, open-order count, daily PnL) is passed in, which keeps
//! evaluation a pure function and exhaustively unit testable.
//!
//! Rejections are checked before caps; when several caps bind at once the
//! most restrictive wins.

use crate::decision::{AppliedLimit, LimitKind, RejectReason, RiskDecision};
use crate::policy::RiskPolicy;
use aegis_core::{AccountSnapshot, Direction, PositionRecord, Quote, Signal};
use chrono::{DateTime, Utc};
use log::warn;
use rust_decimal::Decimal;

/// Everything one evaluation looks at
#[derive(Debug, Clone, Copy)]
pub struct RiskInputs<'a> {
    pub account: &'a AccountSnapshot,
    pub position: Option<&'a PositionRecord>,
    pub quote: Option<&'a Quote>,
    /// Concurrent non-terminal orders across the account
    pub open_orders: usize,
    /// Today's realized + unrealized PnL (negative = loss)
    pub daily_pnl: Decimal,
}

/// Evaluates signals against a risk policy
///
/// Stateless - all tracking lives with the caller.
pub struct RiskEngine;

impl RiskEngine {
    /// Evaluate a position-opening signal.
    ///
    /// Liquidations don't come through here: closing exposure is never
    /// blocked by a limit designed to prevent opening exposure.
    pub fn evaluate(
        signal: &Signal,
        inputs: RiskInputs<'_>,
        policy: &RiskPolicy,
        now: DateTime<Utc>,
    ) -> RiskDecision {
        debug_assert!(signal.opens_exposure());

        // Untrusted pricing: no new entries for this symbol
        let quote = match inputs.quote {
            Some(q) if !q.is_stale(now, policy.quote_freshness()) => q,
            _ => {
                warn!(
                    "[RISK REJECTED] {} {}: stale or missing quote",
                    signal.symbol,
                    signal.strategy_id
                );
                return RiskDecision::reject(RejectReason::StaleMarketData);
            }
        };

        // Daily loss circuit: block new entries once breached
        let equity = inputs.account.equity;
        if inputs.daily_pnl <= -policy.daily_loss_limit(equity) {
            warn!(
                "[RISK REJECTED] {}: daily PnL {} breaches loss limit {}",
                signal.symbol,
                inputs.daily_pnl,
                policy.daily_loss_limit(equity)
            );
            return RiskDecision::reject(RejectReason::DailyLossLimitBreached);
        }

        // In-flight order cap
        if inputs.open_orders >= policy.max_open_orders {
            warn!(
                "[RISK REJECTED] {}: {} open orders at limit {}",
                signal.symbol, inputs.open_orders, policy.max_open_orders
            );
            return RiskDecision::reject(RejectReason::TooManyOpenOrders);
        }

        let side = match signal.direction {
            Direction::Long => aegis_core::Side::Buy,
            Direction::Short => aegis_core::Side::Sell,
            Direction::Flat => unreachable!("liquidations bypass evaluate"),
        };
        let price = quote.aggressive_price(side);
        if price <= Decimal::ZERO {
            return RiskDecision::reject(RejectReason::StaleMarketData);
        }

        // Position-limit headroom: cap notional minus what we already hold
        // in this direction
        let held = match inputs.position {
            // Opposite-direction holdings don't consume headroom; the
            // order reduces exposure first
            Some(p) if same_direction(p, signal.direction) => p.quantity.abs(),
            _ => Decimal::ZERO,
        };
        let cap_qty = policy.max_position_notional(equity) / price;
        let position_cap = policy.round_to_lot((cap_qty - held).max(Decimal::ZERO));

        // Buying-power cap
        let bp_cap = policy.round_to_lot(inputs.account.buying_power / price);

        if bp_cap < policy.lot_size || bp_cap.is_zero() {
            warn!(
                "[RISK REJECTED] {}: buying power {} can't cover one lot at {}",
                signal.symbol, inputs.account.buying_power, price
            );
            return RiskDecision::reject(RejectReason::InsufficientBuyingPower);
        }
        if position_cap < policy.lot_size || position_cap.is_zero() {
            warn!(
                "[RISK REJECTED] {}: position limit exhausted (held {}, cap {})",
                signal.symbol, held, cap_qty
            );
            return RiskDecision::reject(RejectReason::PositionLimitExceeded);
        }

        // Most restrictive wins
        let limits = vec![
            AppliedLimit {
                kind: LimitKind::PositionLimit,
                cap_quantity: position_cap,
            },
            AppliedLimit {
                kind: LimitKind::BuyingPower,
                cap_quantity: bp_cap,
            },
        ];
        let max_quantity = position_cap.min(bp_cap);

        RiskDecision::approve(max_quantity, limits)
    }
}

fn same_direction(position: &PositionRecord, direction: Direction) -> bool {
    match direction {
        Direction::Long => position.is_long(),
        Direction::Short => position.is_short(),
        Direction::Flat => false,
    }
}
