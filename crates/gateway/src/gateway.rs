//! Broker capability trait

use crate::error::GatewayError;
use crate::messages::{BrokerEvent, CancelAck, CancelRequest, OrderAck, SubmitRequest};
use aegis_core::{AccountSnapshot, PositionRecord};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// The narrow set of broker capabilities the pipeline depends on.
///
/// Implementations own their transport; callers see requests, acks and
/// a bounded event stream. Submissions must be idempotent on
/// `client_order_id`: a resubmitted id returns the original ack.
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Submit an order. Bounded by the adapter's call deadline; a
    /// timeout means the broker may still have accepted the order.
    async fn submit(&self, request: SubmitRequest) -> Result<OrderAck, GatewayError>;

    /// Request cancellation of a working order. Best-effort - fills can
    /// race past this.
    async fn cancel(&self, request: CancelRequest) -> Result<CancelAck, GatewayError>;

    /// Current account snapshot as the broker sees it
    async fn account(&self) -> Result<AccountSnapshot, GatewayError>;

    /// Open positions as the broker sees them (startup reconciliation)
    async fn positions(&self) -> Result<Vec<PositionRecord>, GatewayError>;

    /// Take the asynchronous event stream. Single consumer: the second
    /// call returns `ChannelClosed`.
    fn events(&self) -> Result<mpsc::Receiver<BrokerEvent>, GatewayError>;
}
