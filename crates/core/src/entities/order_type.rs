use serde::{Deserialize, Serialize};

/// Order types supported by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    /// Execute at current market price
    Market,
    /// Execute at specified price or better
    Limit,
    /// Market order triggered when price reaches stop price
    Stop,
}

impl OrderType {
    /// Validate that the right prices are present for this order type
    pub fn requires_limit_price(&self) -> bool {
        matches!(self, OrderType::Limit)
    }

    pub fn requires_stop_price(&self) -> bool {
        matches!(self, OrderType::Stop)
    }
}
