//! # Execution Gateway
//!
//! The boundary between the pipeline and a broker. Everything broker-shaped
//! lives behind the [`ExecutionGateway`] trait:
//!
//! ```text
//!   pipeline ──SubmitRequest──▶ ┌──────────────────┐
//!   pipeline ──CancelRequest──▶ │ ExecutionGateway │ ──▶ broker
//!   pipeline ◀──BrokerEvent──── └──────────────────┘
//! ```
//!
//! Acks answer requests synchronously; fills, status changes and account
//! updates arrive asynchronously on a bounded event channel. Submissions
//! are idempotent on the client order id, which is what makes
//! [`retry::submit_with_retry`] safe after a timeout.
//!
//! [`PaperGateway`] is the in-process adapter used by tests and paper
//! trading sessions.

mod error;
mod gateway;
mod messages;
mod paper;
pub mod retry;

pub use error::GatewayError;
pub use gateway::ExecutionGateway;
pub use messages::{BrokerEvent, CancelAck, CancelRequest, OrderAck, StatusUpdate, SubmitRequest};
pub use paper::PaperGateway;
pub use retry::{RetryPolicy, submit_with_retry};
