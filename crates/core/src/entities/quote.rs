use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Normalized market quote pushed by the market-data collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub bid: Decimal,
    pub ask: Decimal,
    /// Last traded price
    pub last: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    pub fn new(
        symbol: impl Into<String>,
        bid: Decimal,
        ask: Decimal,
        last: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            bid,
            ask,
            last,
            timestamp,
        }
    }

    /// Midpoint of bid and ask
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }

    /// Price a marketable order of the given side would pay
    pub fn aggressive_price(&self, side: super::Side) -> Decimal {
        match side {
            super::Side::Buy => self.ask,
            super::Side::Sell => self.bid,
        }
    }

    /// Age of the quote at `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }

    /// True if the quote is older than the given freshness bound
    pub fn is_stale(&self, now: DateTime<Utc>, freshness: Duration) -> bool {
        self.age(now) > freshness
    }
}
