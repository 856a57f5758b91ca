use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Point-in-time view of the brokerage account
///
/// Owned by the market state cache. Consumers never mutate a snapshot;
/// new information replaces the whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Total account equity (cash + position value)
    pub equity: Decimal,
    /// Capital available for new orders
    pub buying_power: Decimal,
    /// Settled cash
    pub cash: Decimal,
    /// Account base currency
    pub currency: String,
    /// When the broker computed this snapshot
    pub as_of: DateTime<Utc>,
}

impl AccountSnapshot {
    pub fn new(equity: Decimal, buying_power: Decimal, cash: Decimal) -> Self {
        Self {
            equity,
            buying_power,
            cash,
            currency: "USD".to_string(),
            as_of: Utc::now(),
        }
    }

    pub fn with_as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = as_of;
        self
    }
}
