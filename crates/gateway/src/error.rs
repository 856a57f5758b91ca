//! Gateway error taxonomy
//!
//! Errors split along one line that matters to the caller: transient
//! (retry may succeed) versus business (the broker said no, retrying is
//! pointless). `is_transient` is the single source of truth for the
//! retry loop.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The broker did not answer within the call deadline. The request
    /// may or may not have reached it - resubmission relies on the
    /// client order id for dedup.
    #[error("gateway call timed out after {0} ms")]
    Timeout(u64),

    /// Connection-level failure (reset, refused, DNS)
    #[error("transport failure: {0}")]
    Transport(String),

    /// The broker is throttling us
    #[error("rate limited by broker")]
    RateLimited,

    /// The broker refused the order outright
    #[error("order rejected by broker: {reason}")]
    Rejected { reason: String },

    /// Account can't cover the order
    #[error("insufficient funds at broker")]
    InsufficientFunds,

    /// Symbol not tradable at this broker
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    /// The gateway's event channel is gone; the session is over
    #[error("gateway event channel closed")]
    ChannelClosed,
}

impl GatewayError {
    /// Whether a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Transport(_) | Self::RateLimited
        )
    }
}
