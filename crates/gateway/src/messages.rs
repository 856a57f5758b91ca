//! Wire-shape messages exchanged with a broker
//!
//! Requests carry the client order id as the idempotency key: a broker
//! that sees the same id twice must treat the second submission as a
//! duplicate, not a new order.

use aegis_core::{AccountSnapshot, Fill, Order, OrderId, OrderStatus, OrderType, Side, TimeInForce};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order submission request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Idempotency key - the internal order id
    pub client_order_id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub time_in_force: TimeInForce,
}

impl SubmitRequest {
    pub fn from_order(order: &Order) -> Self {
        Self {
            client_order_id: order.id,
            symbol: order.symbol.clone(),
            side: order.side,
            order_type: order.order_type,
            quantity: order.quantity,
            limit_price: order.limit_price,
            stop_price: order.stop_price,
            time_in_force: order.time_in_force,
        }
    }
}

/// Broker acknowledgement of a submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    pub client_order_id: OrderId,
    pub broker_order_id: String,
    pub status: OrderStatus,
    pub acked_at: DateTime<Utc>,
}

/// Cancellation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    pub client_order_id: OrderId,
    pub broker_order_id: String,
}

/// Broker acknowledgement of a cancellation
///
/// Cancellation is best-effort: the order may already be terminal, or a
/// fill may still race in after this ack. `status` is the broker's view
/// at ack time, not a guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAck {
    pub client_order_id: OrderId,
    pub status: OrderStatus,
}

/// Out-of-band order status change reported by the broker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub client_order_id: OrderId,
    pub broker_order_id: String,
    pub status: OrderStatus,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Asynchronous event pushed by the broker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BrokerEvent {
    Fill(Fill),
    Status(StatusUpdate),
    Account(AccountSnapshot),
}
