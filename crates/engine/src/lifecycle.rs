//! Order lifecycle management
//!
//! Owns every order from intent to terminal state. Mutations for one
//! symbol are serialized behind a per-symbol async mutex; the lock is
//! held only across local state transitions, never across a gateway
//! round-trip, so a slow broker can't stall fills for other symbols.
//!
//! The broker is the source of truth for fills. Local transitions guard
//! the rest: terminal states stay terminal, fills are clamped to the
//! requested quantity, and fills that race past a cancel reconcile the
//! order back open.

use crate::error::{EngineError, EngineResult};
use aegis_core::{Fill, FillOutcome, Order, OrderId, OrderStatus, SignalId};
use aegis_gateway::{
    BrokerEvent, CancelRequest, ExecutionGateway, RetryPolicy, StatusUpdate, SubmitRequest,
    submit_with_retry,
};
use aegis_market::MarketStateCache;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

pub struct OrderLifecycleManager {
    gateway: Arc<dyn ExecutionGateway>,
    cache: Arc<MarketStateCache>,
    orders: DashMap<OrderId, Order>,
    /// At most one in-flight order per (symbol, signal id)
    in_flight: DashMap<(String, SignalId), OrderId>,
    symbol_locks: DashMap<String, Arc<AsyncMutex<()>>>,
    retry: RetryPolicy,
    /// Realized PnL accumulated from fills since the last daily reset
    realized_today: Mutex<Decimal>,
}

impl OrderLifecycleManager {
    pub fn new(gateway: Arc<dyn ExecutionGateway>, cache: Arc<MarketStateCache>) -> Self {
        Self {
            gateway,
            cache,
            orders: DashMap::new(),
            in_flight: DashMap::new(),
            symbol_locks: DashMap::new(),
            retry: RetryPolicy::default(),
            realized_today: Mutex::new(Decimal::ZERO),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn symbol_lock(&self, symbol: &str) -> Arc<AsyncMutex<()>> {
        self.symbol_locks
            .entry(symbol.to_string())
            .or_default()
            .clone()
    }

    /// Submit an order to the broker, retrying transient failures.
    ///
    /// The order is registered before the round-trip so a fill event that
    /// beats the ack still finds it. On exhausted transient retries the
    /// order goes `Failed`; on a broker refusal it goes `Rejected`. Both
    /// release the (symbol, signal id) slot.
    pub async fn submit(&self, order: Order) -> EngineResult<OrderId> {
        if !order.validate() {
            return Err(EngineError::InvalidOrder(format!(
                "{} {} {:?} qty {}",
                order.symbol,
                order.side.as_str(),
                order.order_type,
                order.quantity
            )));
        }

        let key = (order.symbol.clone(), order.signal_id);
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(_) => return Err(EngineError::DuplicateSignal(order.signal_id)),
            Entry::Vacant(slot) => {
                slot.insert(order.id);
            }
        }

        let id = order.id;
        let symbol = order.symbol.clone();
        let request = SubmitRequest::from_order(&order);
        self.orders.insert(id, order);

        // No symbol lock here: the broker round-trip must not serialize
        // against fill processing
        match submit_with_retry(self.gateway.as_ref(), request, self.retry).await {
            Ok(ack) => {
                let lock = self.symbol_lock(&symbol);
                let _guard = lock.lock().await;
                if let Some(mut order) = self.orders.get_mut(&id) {
                    match order.acknowledge(&ack.broker_order_id, Utc::now()) {
                        Ok(()) => {
                            info!("[ORDER ACK] {} -> {}", id, ack.broker_order_id);
                        }
                        // A fill beat the ack; keep the fill-driven status
                        // and just record the broker id
                        Err(_) if order.filled_quantity > Decimal::ZERO => {
                            order.broker_order_id.get_or_insert(ack.broker_order_id);
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok(id)
            }
            Err(e) => {
                {
                    let lock = self.symbol_lock(&symbol);
                    let _guard = lock.lock().await;
                    if let Some(mut order) = self.orders.get_mut(&id) {
                        let result = if e.is_transient() {
                            error!("[ORDER FAILED] {}: retries exhausted ({e})", id);
                            order.fail(Utc::now())
                        } else {
                            warn!("[ORDER REJECTED] {}: {e}", id);
                            order.reject(Utc::now())
                        };
                        if let Err(t) = result {
                            debug!("[ORDER] {} already terminal: {t}", id);
                        }
                    }
                }
                self.in_flight.remove(&key);
                Err(e.into())
            }
        }
    }

    /// Best-effort cancellation. The local transition happens on the
    /// broker's ack; a fill can still race in afterwards and reconcile.
    pub async fn cancel(&self, id: OrderId) -> EngineResult<()> {
        let (symbol, broker_order_id) = {
            let order = self.orders.get(&id).ok_or(EngineError::UnknownOrder(id))?;
            let broker_id = order
                .broker_order_id
                .clone()
                .ok_or(EngineError::NotAcknowledged(id))?;
            (order.symbol.clone(), broker_id)
        };

        self.gateway
            .cancel(CancelRequest {
                client_order_id: id,
                broker_order_id,
            })
            .await?;

        let lock = self.symbol_lock(&symbol);
        let _guard = lock.lock().await;
        if let Some(mut order) = self.orders.get_mut(&id) {
            if let Err(e) = order.cancel(Utc::now()) {
                debug!("[CANCEL] {}: {e}", id);
            } else {
                info!("[ORDER CANCELED] {}", id);
            }
            self.release_if_terminal(&order);
        }
        Ok(())
    }

    /// Apply one broker event
    pub async fn handle_event(&self, event: BrokerEvent) {
        match event {
            BrokerEvent::Fill(fill) => self.handle_fill(fill).await,
            BrokerEvent::Status(update) => self.handle_status(update).await,
            BrokerEvent::Account(snapshot) => self.cache.apply_account(snapshot),
        }
    }

    async fn handle_fill(&self, fill: Fill) {
        let lock = self.symbol_lock(&fill.symbol);
        let _guard = lock.lock().await;

        let applied = match self.orders.get_mut(&fill.order_id) {
            Some(mut order) => {
                let (applied, outcome) = order.apply_fill(&fill);
                match outcome {
                    FillOutcome::Applied => {
                        info!(
                            "[FILL] {} {} {} @ {} ({}/{})",
                            fill.order_id,
                            order.side.as_str(),
                            applied,
                            fill.price,
                            order.filled_quantity,
                            order.quantity
                        );
                    }
                    FillOutcome::Reconciled => {
                        warn!(
                            "[FILL RECONCILED] {} filled {} after local terminal state",
                            fill.order_id, applied
                        );
                    }
                    FillOutcome::Clamped => {
                        warn!(
                            "[FILL CLAMPED] {} reported {} but only {} remained",
                            fill.order_id, fill.quantity, applied
                        );
                    }
                    FillOutcome::Ignored => {
                        debug!("[FILL IGNORED] {} ({:?})", fill.order_id, order.status);
                    }
                }
                self.release_if_terminal(&order);
                applied
            }
            None => {
                // Broker knows an order we don't; trust its fill for the
                // position, investigate the order separately
                error!("[FILL] unknown order {}", fill.order_id);
                fill.quantity
            }
        };

        if applied > Decimal::ZERO {
            let mut booked = fill.clone();
            booked.quantity = applied;
            let realized = self.cache.apply_fill(&booked);
            if realized != Decimal::ZERO {
                let mut total = self
                    .realized_today
                    .lock()
                    .unwrap_or_else(|p| p.into_inner());
                *total += realized;
                debug!("[PNL] realized {} (today {})", realized, total);
            }
        }
    }

    async fn handle_status(&self, update: StatusUpdate) {
        let Some(symbol) = self
            .orders
            .get(&update.client_order_id)
            .map(|o| o.symbol.clone())
        else {
            warn!("[STATUS] unknown order {}", update.client_order_id);
            return;
        };

        let lock = self.symbol_lock(&symbol);
        let _guard = lock.lock().await;
        let Some(mut order) = self.orders.get_mut(&update.client_order_id) else {
            return;
        };

        let now = update.timestamp;
        let result = match update.status {
            OrderStatus::Canceled => order.cancel(now),
            OrderStatus::Expired => order.expire(now),
            OrderStatus::Rejected => order.reject(now),
            // Fill-driven states arrive via fill events; everything else
            // carries no local transition
            _ => Ok(()),
        };
        match result {
            Ok(()) => debug!(
                "[STATUS] {} -> {}",
                update.client_order_id,
                update.status.as_str()
            ),
            Err(e) => debug!("[STATUS] {} ignored: {e}", update.client_order_id),
        }
        self.release_if_terminal(&order);
    }

    /// Expire every active order whose time-in-force deadline has passed,
    /// then ask the broker to cancel each (best effort).
    pub async fn expire_due(&self, now: DateTime<Utc>) -> Vec<OrderId> {
        let due: Vec<(OrderId, String, Option<String>)> = self
            .orders
            .iter()
            .filter(|o| o.status.is_active())
            .filter(|o| o.expiry_deadline().is_some_and(|d| d <= now))
            .map(|o| (o.id, o.symbol.clone(), o.broker_order_id.clone()))
            .collect();

        let mut expired = Vec::new();
        for (id, symbol, broker_order_id) in due {
            {
                let lock = self.symbol_lock(&symbol);
                let _guard = lock.lock().await;
                let Some(mut order) = self.orders.get_mut(&id) else {
                    continue;
                };
                if let Err(e) = order.expire(now) {
                    debug!("[EXPIRE] {}: {e}", id);
                    continue;
                }
                info!("[ORDER EXPIRED] {} ({})", id, symbol);
                self.release_if_terminal(&order);
            }
            expired.push(id);

            // The broker may still hold it; a late fill reconciles
            if let Some(broker_order_id) = broker_order_id {
                if let Err(e) = self
                    .gateway
                    .cancel(CancelRequest {
                        client_order_id: id,
                        broker_order_id,
                    })
                    .await
                {
                    warn!("[EXPIRE] broker cancel for {} failed: {e}", id);
                }
            }
        }
        expired
    }

    fn release_if_terminal(&self, order: &Order) {
        if order.status.is_terminal() {
            self.in_flight
                .remove(&(order.symbol.clone(), order.signal_id));
        }
    }

    pub fn order(&self, id: OrderId) -> Option<Order> {
        self.orders.get(&id).map(|o| o.clone())
    }

    pub fn open_orders(&self) -> Vec<Order> {
        self.orders
            .iter()
            .filter(|o| o.status.is_active())
            .map(|o| o.clone())
            .collect()
    }

    pub fn open_order_count(&self) -> usize {
        self.orders.iter().filter(|o| o.status.is_active()).count()
    }

    pub fn realized_pnl_today(&self) -> Decimal {
        *self
            .realized_today
            .lock()
            .unwrap_or_else(|p| p.into_inner())
    }

    /// Start-of-day reset
    pub fn reset_daily_pnl(&self) {
        *self
            .realized_today
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Decimal::ZERO;
    }
}
