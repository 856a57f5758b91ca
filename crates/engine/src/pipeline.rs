//! Signal-to-order pipeline
//!
//! One entry point per signal. The pipeline consumes each signal id
//! exactly once, evaluates risk against the market state cache, sizes
//! the order, and hands it to the lifecycle manager. Flatten signals
//! skip risk evaluation entirely - closing exposure is always allowed,
//! even after the daily loss limit has tripped or the kill switch is
//! engaged.

use crate::error::{EngineError, EngineResult};
use crate::exit::{EmergencyExitController, ExitAction, ExitTrigger};
use crate::kill_switch::KillSwitch;
use crate::lifecycle::OrderLifecycleManager;
use aegis_core::{
    Direction, Order, OrderId, OrderType, PositionRecord, Side, Signal, SignalId, TimeInForce,
};
use aegis_gateway::BrokerEvent;
use aegis_market::MarketStateCache;
use aegis_risk::{
    AuditLog, MemoryAuditLog, PositionSizer, RejectReason, RiskAuditRecord, RiskDecision,
    RiskEngine, RiskInputs, RiskPolicy, Sizing,
};
use chrono::Utc;
use dashmap::DashMap;
use log::{info, warn};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// What happened to a consumed signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// An order was submitted
    Accepted(OrderId),
    /// Signal id already consumed; nothing was done
    Duplicate,
    /// Approved but sized to zero (or a flatten with no position)
    ZeroQuantity,
    /// Refused by the risk policy
    Rejected(RejectReason),
    /// Kill switch engaged; only flattens get through
    Halted,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Time-in-force stamped on entry orders
    pub time_in_force: TimeInForce,
    pub expiry_scan_interval: Duration,
    pub exit_scan_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            time_in_force: TimeInForce::Day,
            expiry_scan_interval: Duration::from_millis(500),
            exit_scan_interval: Duration::from_secs(1),
        }
    }
}

pub struct ExecutionPipeline {
    cache: Arc<MarketStateCache>,
    lifecycle: Arc<OrderLifecycleManager>,
    exit: Arc<EmergencyExitController>,
    kill_switch: KillSwitch,
    policy: RiskPolicy,
    audit: Arc<dyn AuditLog>,
    consumed_signals: DashMap<SignalId, ()>,
    config: PipelineConfig,
}

impl ExecutionPipeline {
    pub fn new(
        cache: Arc<MarketStateCache>,
        lifecycle: Arc<OrderLifecycleManager>,
        exit: Arc<EmergencyExitController>,
        kill_switch: KillSwitch,
    ) -> Self {
        Self {
            cache,
            lifecycle,
            exit,
            kill_switch,
            policy: RiskPolicy::default(),
            audit: Arc::new(MemoryAuditLog::new()),
            consumed_signals: DashMap::new(),
            config: PipelineConfig::default(),
        }
    }

    pub fn with_policy(mut self, policy: RiskPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Consume one signal. Idempotent on the signal id: replays return
    /// `Duplicate` without touching the broker.
    pub async fn submit_signal(&self, signal: Signal) -> EngineResult<SignalOutcome> {
        if self.consumed_signals.insert(signal.id, ()).is_some() {
            info!("[SIGNAL] {} already consumed, ignoring", signal.id);
            return Ok(SignalOutcome::Duplicate);
        }

        if signal.is_flatten() {
            return self.handle_flatten(&signal).await;
        }
        if self.kill_switch.is_engaged() {
            warn!("[SIGNAL] {} refused: kill switch engaged", signal.id);
            return Ok(SignalOutcome::Halted);
        }
        self.handle_entry(&signal).await
    }

    async fn handle_flatten(&self, signal: &Signal) -> EngineResult<SignalOutcome> {
        let Some(position) = self.cache.position(&signal.symbol) else {
            info!("[SIGNAL] {} flatten with no position", signal.id);
            return Ok(SignalOutcome::ZeroQuantity);
        };

        let order = Order::liquidation(
            signal.id,
            position.symbol.clone(),
            position.closing_side(),
            position.quantity.abs(),
            Utc::now(),
        );
        info!(
            "[SIGNAL] {} flattening {} {}",
            signal.id,
            position.symbol,
            position.quantity.abs()
        );
        match self.lifecycle.submit(order).await {
            Ok(order_id) => Ok(SignalOutcome::Accepted(order_id)),
            Err(EngineError::DuplicateSignal(_)) => Ok(SignalOutcome::Duplicate),
            Err(e) => Err(e),
        }
    }

    async fn handle_entry(&self, signal: &Signal) -> EngineResult<SignalOutcome> {
        let now = Utc::now();
        let view = self.cache.view(&signal.symbol);

        // No trusted account state yet; treat like untrusted market data
        let Some(account) = view.account.clone() else {
            let decision = RiskDecision::reject(RejectReason::StaleMarketData);
            self.audit
                .record(RiskAuditRecord::from_decision(signal, &decision, None, now));
            return Ok(SignalOutcome::Rejected(RejectReason::StaleMarketData));
        };

        let inputs = RiskInputs {
            account: &account,
            position: view.position.as_ref(),
            quote: view.quote.as_ref(),
            open_orders: self.lifecycle.open_order_count(),
            daily_pnl: self.daily_pnl(),
        };
        let decision = RiskEngine::evaluate(signal, inputs, &self.policy, now);

        if !decision.approved {
            let reason = decision.reason.unwrap_or(RejectReason::StaleMarketData);
            self.audit
                .record(RiskAuditRecord::from_decision(signal, &decision, None, now));
            return Ok(SignalOutcome::Rejected(reason));
        }

        // Approval implies a fresh quote existed
        let Some(quote) = view.quote.as_ref() else {
            return Ok(SignalOutcome::Rejected(RejectReason::StaleMarketData));
        };

        let quantity =
            match PositionSizer::size(signal, &decision, &account, quote, &self.policy) {
                Sizing::Quantity(q) => q,
                Sizing::ZeroQuantity => {
                    self.audit.record(RiskAuditRecord::from_decision(
                        signal,
                        &decision,
                        Some(Decimal::ZERO),
                        now,
                    ));
                    return Ok(SignalOutcome::ZeroQuantity);
                }
            };
        self.audit.record(RiskAuditRecord::from_decision(
            signal,
            &decision,
            Some(quantity),
            now,
        ));

        let side = match signal.direction {
            Direction::Long => Side::Buy,
            Direction::Short => Side::Sell,
            Direction::Flat => unreachable!("flattens handled above"),
        };
        let order = Order::new(
            signal.id,
            signal.symbol.clone(),
            side,
            OrderType::Market,
            quantity,
            None,
            self.config.time_in_force,
            now,
        );
        match self.lifecycle.submit(order).await {
            Ok(order_id) => Ok(SignalOutcome::Accepted(order_id)),
            Err(EngineError::DuplicateSignal(_)) => Ok(SignalOutcome::Duplicate),
            Err(e) => Err(e),
        }
    }

    /// Liquidate one symbol, or everything, on operator demand
    pub async fn trigger_emergency_exit(&self, symbol: Option<&str>) -> Vec<ExitAction> {
        let now = Utc::now();
        match symbol {
            Some(symbol) => self
                .exit
                .liquidate_symbol(symbol, ExitTrigger::Manual, now)
                .await
                .into_iter()
                .collect(),
            None => self.exit.liquidate_all(ExitTrigger::Manual, now).await,
        }
    }

    /// Realized PnL today plus unrealized PnL of open positions, marked
    /// at each symbol's latest quote mid
    pub fn daily_pnl(&self) -> Decimal {
        let unrealized: Decimal = self
            .cache
            .positions()
            .iter()
            .filter_map(|p| {
                self.cache
                    .quote(&p.symbol)
                    .map(|q| p.unrealized_pnl(q.mid()))
            })
            .sum();
        self.lifecycle.realized_pnl_today() + unrealized
    }

    pub fn open_orders(&self) -> Vec<Order> {
        self.lifecycle.open_orders()
    }

    pub fn positions(&self) -> Vec<PositionRecord> {
        self.cache.positions()
    }

    pub fn kill_switch(&self) -> &KillSwitch {
        &self.kill_switch
    }

    /// Drive the pipeline: broker events, time-in-force expiry, and the
    /// emergency-exit watchdog. Returns when the event channel closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<BrokerEvent>) {
        let mut expiry = tokio::time::interval(self.config.expiry_scan_interval);
        let mut exit_scan = tokio::time::interval(self.config.exit_scan_interval);
        info!("[PIPELINE] running");
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.lifecycle.handle_event(event).await,
                    None => {
                        info!("[PIPELINE] event channel closed, stopping");
                        break;
                    }
                },
                _ = expiry.tick() => {
                    self.lifecycle.expire_due(Utc::now()).await;
                }
                _ = exit_scan.tick() => {
                    self.exit.scan(Utc::now()).await;
                }
            }
        }
    }
}
