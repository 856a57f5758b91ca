//! Aegis Core Domain
//!
//! Pure domain types for the Aegis execution pipeline.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;

// Re-export commonly used types at crate root
pub use entities::{
    AccountSnapshot,
    Direction,
    Fill,
    FillOutcome,
    // Core trading entities
    Order,
    OrderId,
    OrderStatus,
    OrderType,
    PositionRecord,
    Quote,
    Side,
    Signal,
    SignalId,
    TimeInForce,
    TransitionError,
};
