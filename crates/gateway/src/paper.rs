//! In-process paper broker
//!
//! Deterministic stand-in for a real broker adapter: acknowledges
//! submissions, dedups on client order id, and lets tests script fills,
//! status changes and failures. No market simulation - fills happen
//! when the driver says so.

use crate::error::GatewayError;
use crate::gateway::ExecutionGateway;
use crate::messages::{
    BrokerEvent, CancelAck, CancelRequest, OrderAck, StatusUpdate, SubmitRequest,
};
use aegis_core::{AccountSnapshot, Fill, OrderId, OrderStatus, PositionRecord};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use log::{debug, info};
use rust_decimal::Decimal;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::mpsc;

struct PaperOrder {
    request: SubmitRequest,
    ack: OrderAck,
}

pub struct PaperGateway {
    orders: DashMap<OrderId, PaperOrder>,
    account: Mutex<AccountSnapshot>,
    positions: Mutex<Vec<PositionRecord>>,
    events_tx: mpsc::Sender<BrokerEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<BrokerEvent>>>,
    next_broker_id: AtomicU64,
    /// Submissions to fail with a timeout before anything is recorded
    fail_before: AtomicUsize,
    /// Submissions to record, then fail with a timeout anyway - the
    /// "broker accepted but we never heard back" case
    fail_after_accept: AtomicUsize,
    /// Reject every submission with this reason while set
    reject_reason: Mutex<Option<String>>,
}

impl PaperGateway {
    /// `capacity` bounds the event channel; a full channel blocks the
    /// scripted producer rather than dropping events.
    pub fn new(capacity: usize) -> Self {
        let (events_tx, events_rx) = mpsc::channel(capacity);
        Self {
            orders: DashMap::new(),
            account: Mutex::new(AccountSnapshot::new(
                Decimal::ZERO,
                Decimal::ZERO,
                Decimal::ZERO,
            )),
            positions: Mutex::new(Vec::new()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            next_broker_id: AtomicU64::new(1),
            fail_before: AtomicUsize::new(0),
            fail_after_accept: AtomicUsize::new(0),
            reject_reason: Mutex::new(None),
        }
    }

    pub fn with_account(self, account: AccountSnapshot) -> Self {
        *self.account.lock().unwrap_or_else(|p| p.into_inner()) = account;
        self
    }

    pub fn set_account(&self, account: AccountSnapshot) {
        *self.account.lock().unwrap_or_else(|p| p.into_inner()) = account;
    }

    pub fn set_positions(&self, positions: Vec<PositionRecord>) {
        *self.positions.lock().unwrap_or_else(|p| p.into_inner()) = positions;
    }

    /// Fail the next `n` submissions with a timeout, before recording
    /// anything
    pub fn fail_submissions(&self, n: usize) {
        self.fail_before.store(n, Ordering::SeqCst);
    }

    /// Accept the next `n` submissions but report a timeout anyway.
    /// A retry with the same client order id gets the original ack.
    pub fn drop_acks(&self, n: usize) {
        self.fail_after_accept.store(n, Ordering::SeqCst);
    }

    /// Reject every submission until cleared with `None`
    pub fn reject_with(&self, reason: Option<&str>) {
        *self.reject_reason.lock().unwrap_or_else(|p| p.into_inner()) =
            reason.map(str::to_string);
    }

    /// The request recorded for an order id, if the broker saw it
    pub fn recorded_request(&self, id: OrderId) -> Option<SubmitRequest> {
        self.orders.get(&id).map(|o| o.request.clone())
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Script a (possibly partial) fill for a recorded order
    pub async fn emit_fill(
        &self,
        id: OrderId,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<(), GatewayError> {
        let fill = {
            let order = self
                .orders
                .get(&id)
                .ok_or_else(|| GatewayError::UnknownSymbol(id.to_string()))?;
            Fill::new(
                id,
                &order.request.symbol,
                order.request.side,
                quantity,
                price,
                Utc::now(),
            )
            .with_broker_order_id(&order.ack.broker_order_id)
        };
        debug!("[PAPER] fill {} {} @ {}", id, quantity, price);
        self.events_tx
            .send(BrokerEvent::Fill(fill))
            .await
            .map_err(|_| GatewayError::ChannelClosed)
    }

    /// Script an out-of-band status change
    pub async fn emit_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        reason: Option<&str>,
    ) -> Result<(), GatewayError> {
        let broker_order_id = self
            .orders
            .get(&id)
            .map(|o| o.ack.broker_order_id.clone())
            .unwrap_or_default();
        self.events_tx
            .send(BrokerEvent::Status(StatusUpdate {
                client_order_id: id,
                broker_order_id,
                status,
                reason: reason.map(str::to_string),
                timestamp: Utc::now(),
            }))
            .await
            .map_err(|_| GatewayError::ChannelClosed)
    }

    /// Script an account snapshot push
    pub async fn emit_account(&self, account: AccountSnapshot) -> Result<(), GatewayError> {
        self.set_account(account.clone());
        self.events_tx
            .send(BrokerEvent::Account(account))
            .await
            .map_err(|_| GatewayError::ChannelClosed)
    }

    fn take_one(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ExecutionGateway for PaperGateway {
    async fn submit(&self, request: SubmitRequest) -> Result<OrderAck, GatewayError> {
        // Duplicate id: hand back the original ack, record nothing
        if let Some(existing) = self.orders.get(&request.client_order_id) {
            info!(
                "[PAPER] duplicate submission {} deduplicated",
                request.client_order_id
            );
            return Ok(existing.ack.clone());
        }

        if Self::take_one(&self.fail_before) {
            return Err(GatewayError::Timeout(0));
        }
        if let Some(reason) = self
            .reject_reason
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
        {
            return Err(GatewayError::Rejected { reason });
        }

        let broker_order_id = format!("paper-{}", self.next_broker_id.fetch_add(1, Ordering::SeqCst));
        let ack = OrderAck {
            client_order_id: request.client_order_id,
            broker_order_id,
            status: OrderStatus::Submitted,
            acked_at: Utc::now(),
        };
        self.orders.insert(
            request.client_order_id,
            PaperOrder {
                request,
                ack: ack.clone(),
            },
        );

        if Self::take_one(&self.fail_after_accept) {
            return Err(GatewayError::Timeout(0));
        }
        Ok(ack)
    }

    async fn cancel(&self, request: CancelRequest) -> Result<CancelAck, GatewayError> {
        if !self.orders.contains_key(&request.client_order_id) {
            return Err(GatewayError::Rejected {
                reason: "unknown order".to_string(),
            });
        }
        self.emit_status(request.client_order_id, OrderStatus::Canceled, None)
            .await?;
        Ok(CancelAck {
            client_order_id: request.client_order_id,
            status: OrderStatus::Canceled,
        })
    }

    async fn account(&self) -> Result<AccountSnapshot, GatewayError> {
        Ok(self
            .account
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone())
    }

    async fn positions(&self) -> Result<Vec<PositionRecord>, GatewayError> {
        Ok(self
            .positions
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone())
    }

    fn events(&self) -> Result<mpsc::Receiver<BrokerEvent>, GatewayError> {
        self.events_rx
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
            .ok_or(GatewayError::ChannelClosed)
    }
}
