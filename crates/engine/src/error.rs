//! Engine error types

use aegis_core::{OrderId, SignalId, TransitionError};
use aegis_gateway::GatewayError;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Order failed validation before submission (missing limit price,
    /// non-positive quantity)
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    /// An order for this (symbol, signal id) pair is already in flight
    #[error("duplicate signal {0}")]
    DuplicateSignal(SignalId),

    #[error("no such order {0}")]
    UnknownOrder(OrderId),

    /// The order has no broker id, so the broker can't be asked about it
    #[error("order {0} was never acknowledged")]
    NotAcknowledged(OrderId),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}
