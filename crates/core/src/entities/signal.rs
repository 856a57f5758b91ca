//! Signal - what strategies output
//!
//! Strategies don't place orders directly. They emit signals expressing a
//! directional view with a confidence score. The pipeline consumes each
//! signal exactly once (the signal id is the idempotency key) and decides
//! whether an order results.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a signal (idempotency key for the pipeline)
pub type SignalId = Uuid;

/// Directional view expressed by a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Open or grow a long position
    Long,
    /// Open or grow a short position
    Short,
    /// Close out the position entirely
    Flat,
}

/// Signal from a strategy
///
/// Immutable once issued. The pipeline deduplicates by `id` so a replayed
/// or retried signal never produces a second order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Idempotency key
    pub id: SignalId,
    /// Which strategy generated this signal
    pub strategy_id: String,
    /// Symbol to trade
    pub symbol: String,
    /// Directional view
    pub direction: Direction,
    /// Confidence in the signal (0.0 - 1.0)
    pub confidence: Decimal,
    /// Protective stop for the intended entry; the distance from the
    /// current price to this stop bounds capital at risk when sizing
    pub stop_price: Option<Decimal>,
    /// When the signal was generated
    pub generated_at: DateTime<Utc>,
}

impl Signal {
    pub fn new(
        strategy_id: impl Into<String>,
        symbol: impl Into<String>,
        direction: Direction,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy_id: strategy_id.into(),
            symbol: symbol.into(),
            direction,
            confidence: Decimal::ONE,
            stop_price: None,
            generated_at: Utc::now(),
        }
    }

    /// Create a "go flat" signal (liquidate the position)
    pub fn flatten(strategy_id: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self::new(strategy_id, symbol, Direction::Flat)
    }

    /// Builder: set confidence (clamped to [0, 1])
    pub fn with_confidence(mut self, confidence: Decimal) -> Self {
        self.confidence = confidence.clamp(Decimal::ZERO, Decimal::ONE);
        self
    }

    /// Builder: set the protective stop price
    pub fn with_stop(mut self, stop_price: Decimal) -> Self {
        self.stop_price = Some(stop_price);
        self
    }

    /// Builder: override the generation timestamp (for replay/testing)
    pub fn with_generated_at(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = generated_at;
        self
    }

    /// Is this a position-opening signal?
    pub fn opens_exposure(&self) -> bool {
        matches!(self.direction, Direction::Long | Direction::Short)
    }

    /// Is this a liquidating signal?
    pub fn is_flatten(&self) -> bool {
        self.direction == Direction::Flat
    }

    /// Age of the signal at `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.generated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signal_creation() {
        let signal = Signal::new("trend-follower", "AAPL", Direction::Long)
            .with_confidence(dec!(0.8))
            .with_stop(dec!(178));

        assert_eq!(signal.strategy_id, "trend-follower");
        assert_eq!(signal.symbol, "AAPL");
        assert_eq!(signal.confidence, dec!(0.8));
        assert_eq!(signal.stop_price, Some(dec!(178)));
        assert!(signal.opens_exposure());
    }

    #[test]
    fn test_flatten_signal() {
        let signal = Signal::flatten("trend-follower", "AAPL");
        assert!(signal.is_flatten());
        assert!(!signal.opens_exposure());
    }

    #[test]
    fn test_confidence_clamping() {
        let signal = Signal::new("s", "AAPL", Direction::Long).with_confidence(dec!(1.5));
        assert_eq!(signal.confidence, Decimal::ONE);

        let signal = Signal::new("s", "AAPL", Direction::Short).with_confidence(dec!(-0.2));
        assert_eq!(signal.confidence, Decimal::ZERO);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Signal::new("s", "AAPL", Direction::Long);
        let b = Signal::new("s", "AAPL", Direction::Long);
        assert_ne!(a.id, b.id);
    }
}
