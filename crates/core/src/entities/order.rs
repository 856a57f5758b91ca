use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Fill, OrderStatus, OrderType, Side, SignalId, TimeInForce};

/// Unique identifier for an order (client-generated, doubles as the
/// idempotency key sent to the broker)
pub type OrderId = Uuid;

/// Illegal order state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "illegal order transition {} -> {}",
            self.from.as_str(),
            self.to.as_str()
        )
    }
}

impl std::error::Error for TransitionError {}

/// Outcome of applying a fill to an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// Fill applied normally
    Applied,
    /// Fill applied to an order the manager believed terminal; the broker
    /// is the source of truth, so the order was reopened and refilled
    Reconciled,
    /// Fill (or the excess part of it) exceeded the requested quantity
    /// and was clamped away
    Clamped,
    /// Nothing to apply (order already fully filled)
    Ignored,
}

/// An order owned by the lifecycle manager for its whole life
///
/// The broker is the source of truth for fills, but all local state
/// transitions go through the guard methods below so the lifecycle
/// invariants hold: fills never exceed the requested quantity, terminal
/// states stay terminal (except broker-trusted fill reconciliation), and
/// `updated_at` strictly increases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Broker-assigned ID, recorded on acknowledgement
    pub broker_order_id: Option<String>,
    /// Signal that produced this order (at most one in-flight order per
    /// (symbol, signal id) pair)
    pub signal_id: SignalId,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub filled_quantity: Decimal,
    /// Volume-weighted average fill price (zero until the first fill)
    pub avg_fill_price: Decimal,
    /// Required for Limit orders
    pub limit_price: Option<Decimal>,
    /// Required for Stop orders
    pub stop_price: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub status: OrderStatus,
    /// True for emergency-exit liquidations (bypass position limits)
    pub liquidation: bool,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a new order intent in `Pending` state
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        signal_id: SignalId,
        symbol: impl Into<String>,
        side: Side,
        order_type: OrderType,
        quantity: Decimal,
        limit_price: Option<Decimal>,
        time_in_force: TimeInForce,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            broker_order_id: None,
            signal_id,
            symbol: symbol.into(),
            side,
            order_type,
            quantity,
            filled_quantity: Decimal::ZERO,
            avg_fill_price: Decimal::ZERO,
            limit_price,
            stop_price: None,
            time_in_force,
            status: OrderStatus::Pending,
            liquidation: false,
            submitted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a liquidating market order for an emergency exit
    pub fn liquidation(
        signal_id: SignalId,
        symbol: impl Into<String>,
        side: Side,
        quantity: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        let mut order = Self::new(
            signal_id,
            symbol,
            side,
            OrderType::Market,
            quantity,
            None,
            TimeInForce::Ioc,
            now,
        );
        order.liquidation = true;
        order
    }

    /// Validate price fields against the order type
    pub fn validate(&self) -> bool {
        let limit_ok = !self.order_type.requires_limit_price() || self.limit_price.is_some();
        let stop_ok = !self.order_type.requires_stop_price() || self.stop_price.is_some();
        limit_ok && stop_ok && self.quantity > Decimal::ZERO
    }

    /// Quantity still to be filled
    pub fn remaining_quantity(&self) -> Decimal {
        self.quantity - self.filled_quantity
    }

    pub fn is_filled(&self) -> bool {
        self.filled_quantity >= self.quantity
    }

    /// Deadline from time-in-force, available once submitted
    pub fn expiry_deadline(&self) -> Option<DateTime<Utc>> {
        self.time_in_force.deadline(self.submitted_at?)
    }

    /// Bump `updated_at`, keeping it strictly increasing even when the
    /// caller's clock hasn't advanced between events
    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        };
    }

    /// Pending -> Submitted, recording the broker-assigned id
    pub fn acknowledge(
        &mut self,
        broker_order_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.status != OrderStatus::Pending {
            return Err(TransitionError {
                from: self.status,
                to: OrderStatus::Submitted,
            });
        }
        self.broker_order_id = Some(broker_order_id.into());
        self.status = OrderStatus::Submitted;
        self.submitted_at = Some(now);
        self.touch(now);
        Ok(())
    }

    /// Non-terminal -> Rejected (broker business refusal, never retried)
    pub fn reject(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition_to(OrderStatus::Rejected, now)
    }

    /// Pending -> Failed (transient retries exhausted)
    pub fn fail(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status != OrderStatus::Pending {
            return Err(TransitionError {
                from: self.status,
                to: OrderStatus::Failed,
            });
        }
        self.transition_to(OrderStatus::Failed, now)
    }

    /// Non-terminal -> Canceled (best effort; later fills reconcile)
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition_to(OrderStatus::Canceled, now)
    }

    /// Non-terminal -> Expired (time-in-force elapsed)
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition_to(OrderStatus::Expired, now)
    }

    fn transition_to(
        &mut self,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.touch(now);
        Ok(())
    }

    /// Apply a fill, clamping the applied quantity so the cumulative
    /// filled quantity never exceeds the requested quantity.
    ///
    /// A fill against a `Canceled` or `Expired` order is accepted and
    /// reconciled (the broker won the race); the returned outcome lets the
    /// caller log the anomaly.
    pub fn apply_fill(&mut self, fill: &Fill) -> (Decimal, FillOutcome) {
        let was_terminal = self.status.is_terminal();

        // Fills can only ever reconcile Canceled/Expired races; a fill for
        // a Rejected or Failed order means the broker never had it
        if matches!(self.status, OrderStatus::Rejected | OrderStatus::Failed) {
            return (Decimal::ZERO, FillOutcome::Ignored);
        }

        let applied = fill.quantity.min(self.remaining_quantity());
        if applied <= Decimal::ZERO {
            return (Decimal::ZERO, FillOutcome::Ignored);
        }

        // Volume-weighted average fill price
        let prior_notional = self.filled_quantity * self.avg_fill_price;
        self.filled_quantity += applied;
        self.avg_fill_price = (prior_notional + applied * fill.price) / self.filled_quantity;

        self.status = if self.is_filled() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.touch(fill.timestamp);

        let outcome = if was_terminal {
            FillOutcome::Reconciled
        } else if applied < fill.quantity {
            FillOutcome::Clamped
        } else {
            FillOutcome::Applied
        };
        (applied, outcome)
    }
}
