use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{OrderId, Side};

/// Execution report from the broker
///
/// Append-only: an order accumulates fills until fully filled or canceled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    /// Client order ID the fill belongs to
    pub order_id: OrderId,
    /// Broker-assigned order ID (if known)
    pub broker_order_id: Option<String>,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    pub fn new(
        order_id: OrderId,
        symbol: impl Into<String>,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            broker_order_id: None,
            symbol: symbol.into(),
            side,
            quantity,
            price,
            timestamp,
        }
    }

    pub fn with_broker_order_id(mut self, broker_order_id: impl Into<String>) -> Self {
        self.broker_order_id = Some(broker_order_id.into());
        self
    }

    /// Signed quantity: positive for buys, negative for sells
    pub fn signed_quantity(&self) -> Decimal {
        match self.side {
            Side::Buy => self.quantity,
            Side::Sell => -self.quantity,
        }
    }

    /// Notional value of the fill
    pub fn notional(&self) -> Decimal {
        self.quantity * self.price
    }
}
