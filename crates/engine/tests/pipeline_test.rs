//! End-to-end pipeline tests against the paper broker

use aegis_core::{
    AccountSnapshot, Direction, Order, OrderId, OrderStatus, OrderType, Quote, Side, Signal,
    TimeInForce,
};
use aegis_engine::{
    EmergencyExitController, EngineError, ExecutionPipeline, ExitConfig, ExitTrigger, KillSwitch,
    OrderLifecycleManager, SignalOutcome,
};
use aegis_gateway::{BrokerEvent, ExecutionGateway, PaperGateway, RetryPolicy};
use aegis_market::MarketStateCache;
use aegis_risk::{AuditLog, MemoryAuditLog, RejectReason, RiskPolicy};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

struct Harness {
    gateway: Arc<PaperGateway>,
    cache: Arc<MarketStateCache>,
    lifecycle: Arc<OrderLifecycleManager>,
    exit: Arc<EmergencyExitController>,
    pipeline: Arc<ExecutionPipeline>,
    audit: Arc<MemoryAuditLog>,
    kill_switch: KillSwitch,
    events: mpsc::Receiver<BrokerEvent>,
}

fn harness() -> Harness {
    harness_with_policy(RiskPolicy::default())
}

fn harness_with_policy(policy: RiskPolicy) -> Harness {
    let _ = env_logger::try_init();
    let gateway = Arc::new(PaperGateway::new(64));
    let events = gateway.events().unwrap();
    let cache = Arc::new(MarketStateCache::new());
    let lifecycle = Arc::new(
        OrderLifecycleManager::new(gateway.clone() as Arc<dyn ExecutionGateway>, cache.clone())
            .with_retry(RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 1,
                max_delay_ms: 2,
            }),
    );
    let kill_switch = KillSwitch::new();
    let exit = Arc::new(EmergencyExitController::new(
        cache.clone(),
        lifecycle.clone(),
        kill_switch.clone(),
        ExitConfig::default(),
    ));
    let audit = Arc::new(MemoryAuditLog::new());
    let pipeline = Arc::new(
        ExecutionPipeline::new(
            cache.clone(),
            lifecycle.clone(),
            exit.clone(),
            kill_switch.clone(),
        )
        .with_policy(policy)
        .with_audit(audit.clone() as Arc<dyn AuditLog>),
    );
    Harness {
        gateway,
        cache,
        lifecycle,
        exit,
        pipeline,
        audit,
        kill_switch,
        events,
    }
}

impl Harness {
    fn seed_account(&self, equity: Decimal, buying_power: Decimal) {
        self.cache
            .apply_account(AccountSnapshot::new(equity, buying_power, equity));
    }

    fn seed_quote(&self, symbol: &str, price: Decimal) {
        self.cache
            .apply_quote(Quote::new(symbol, price, price, price, Utc::now()));
    }

    /// Pump every queued broker event through the lifecycle manager
    async fn drain(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.lifecycle.handle_event(event).await;
        }
    }

    /// Submit a market order directly (bypassing risk) and fill it
    async fn filled_order(
        &mut self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> OrderId {
        let order = Order::new(
            Uuid::new_v4(),
            symbol,
            side,
            OrderType::Market,
            quantity,
            None,
            TimeInForce::Gtc,
            Utc::now(),
        );
        let id = self.lifecycle.submit(order).await.unwrap();
        self.gateway.emit_fill(id, quantity, price).await.unwrap();
        self.drain().await;
        id
    }
}

fn entry_signal(symbol: &str, stop: Decimal) -> Signal {
    Signal::new("trend", symbol, Direction::Long).with_stop(stop)
}

#[tokio::test]
async fn test_signal_to_sized_order() {
    let mut h = harness();
    h.seed_account(dec!(100_000), dec!(200_000));
    h.seed_quote("AAPL", dec!(180));

    // Position cap binds: 5% of 100k / 180 = 27 shares
    let outcome = h.pipeline.submit_signal(entry_signal("AAPL", dec!(178))).await.unwrap();
    let SignalOutcome::Accepted(order_id) = outcome else {
        panic!("expected accepted, got {outcome:?}");
    };

    let order = h.lifecycle.order(order_id).unwrap();
    assert_eq!(order.quantity, dec!(27));
    assert_eq!(order.status, OrderStatus::Submitted);
    assert!(order.broker_order_id.is_some());

    // Audit captured the approval and the sized quantity
    let records = h.audit.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].approved);
    assert_eq!(records[0].sized_quantity, Some(dec!(27)));
}

#[tokio::test]
async fn test_partial_fills_accumulate_into_position() {
    let mut h = harness();
    let order = Order::new(
        Uuid::new_v4(),
        "AAPL",
        Side::Buy,
        OrderType::Market,
        dec!(100),
        None,
        TimeInForce::Gtc,
        Utc::now(),
    );
    let id = h.lifecycle.submit(order).await.unwrap();

    h.gateway.emit_fill(id, dec!(60), dec!(180)).await.unwrap();
    h.drain().await;
    let order = h.lifecycle.order(id).unwrap();
    assert_eq!(order.status, OrderStatus::PartiallyFilled);
    assert_eq!(h.cache.position("AAPL").unwrap().quantity, dec!(60));

    h.gateway.emit_fill(id, dec!(40), dec!(181)).await.unwrap();
    h.drain().await;
    let order = h.lifecycle.order(id).unwrap();
    assert_eq!(order.status, OrderStatus::Filled);
    assert_eq!(order.filled_quantity, dec!(100));
    assert_eq!(order.avg_fill_price, dec!(180.4));
    assert_eq!(h.cache.position("AAPL").unwrap().quantity, dec!(100));
    assert_eq!(h.lifecycle.open_order_count(), 0);
}

#[tokio::test]
async fn test_overfill_is_clamped() {
    let mut h = harness();
    let order = Order::new(
        Uuid::new_v4(),
        "AAPL",
        Side::Buy,
        OrderType::Market,
        dec!(100),
        None,
        TimeInForce::Gtc,
        Utc::now(),
    );
    let id = h.lifecycle.submit(order).await.unwrap();

    // Broker misreports more than requested
    h.gateway.emit_fill(id, dec!(150), dec!(180)).await.unwrap();
    h.drain().await;

    let order = h.lifecycle.order(id).unwrap();
    assert_eq!(order.filled_quantity, dec!(100));
    // The booked position reflects the clamped quantity, not the report
    assert_eq!(h.cache.position("AAPL").unwrap().quantity, dec!(100));
}

#[tokio::test]
async fn test_duplicate_signal_consumed_once() {
    let h = harness();
    h.seed_account(dec!(100_000), dec!(200_000));
    h.seed_quote("AAPL", dec!(180));

    let signal = entry_signal("AAPL", dec!(178));
    let first = h.pipeline.submit_signal(signal.clone()).await.unwrap();
    let second = h.pipeline.submit_signal(signal).await.unwrap();

    assert!(matches!(first, SignalOutcome::Accepted(_)));
    assert_eq!(second, SignalOutcome::Duplicate);
    assert_eq!(h.gateway.order_count(), 1);
}

#[tokio::test]
async fn test_concurrent_duplicates_produce_one_order() {
    let h = harness();
    h.seed_account(dec!(100_000), dec!(200_000));
    h.seed_quote("AAPL", dec!(180));

    let signal = entry_signal("AAPL", dec!(178));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let pipeline = h.pipeline.clone();
        let signal = signal.clone();
        handles.push(tokio::spawn(
            async move { pipeline.submit_signal(signal).await },
        ));
    }

    let mut accepted = 0;
    for handle in handles {
        if let SignalOutcome::Accepted(_) = handle.await.unwrap().unwrap() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(h.gateway.order_count(), 1);
}

#[tokio::test]
async fn test_stale_quote_rejects_entry() {
    let h = harness();
    h.seed_account(dec!(100_000), dec!(200_000));
    h.cache.apply_quote(Quote::new(
        "AAPL",
        dec!(180),
        dec!(180),
        dec!(180),
        Utc::now() - Duration::seconds(120),
    ));

    let outcome = h.pipeline.submit_signal(entry_signal("AAPL", dec!(178))).await.unwrap();
    assert_eq!(
        outcome,
        SignalOutcome::Rejected(RejectReason::StaleMarketData)
    );
    assert_eq!(h.gateway.order_count(), 0);

    let records = h.audit.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].approved);
}

#[tokio::test]
async fn test_daily_loss_blocks_entries_not_flattens() {
    let mut h = harness();
    h.seed_account(dec!(100_000), dec!(200_000));
    h.seed_quote("AAPL", dec!(180));
    h.seed_quote("MSFT", dec!(200));

    // Realize a 5k loss (over the 3% of 100k limit)
    h.filled_order("MSFT", Side::Buy, dec!(100), dec!(200)).await;
    h.filled_order("MSFT", Side::Sell, dec!(100), dec!(150)).await;
    assert_eq!(h.lifecycle.realized_pnl_today(), dec!(-5_000));

    // Keep an open AAPL position to flatten
    h.filled_order("AAPL", Side::Buy, dec!(10), dec!(180)).await;

    let outcome = h.pipeline.submit_signal(entry_signal("AAPL", dec!(178))).await.unwrap();
    assert_eq!(
        outcome,
        SignalOutcome::Rejected(RejectReason::DailyLossLimitBreached)
    );

    // Going flat is still allowed
    let outcome = h
        .pipeline
        .submit_signal(Signal::flatten("trend", "AAPL"))
        .await
        .unwrap();
    let SignalOutcome::Accepted(order_id) = outcome else {
        panic!("flatten refused: {outcome:?}");
    };
    let order = h.lifecycle.order(order_id).unwrap();
    assert!(order.liquidation);
    assert_eq!(order.side, Side::Sell);
    assert_eq!(order.quantity, dec!(10));
}

#[tokio::test]
async fn test_retry_after_lost_ack_is_idempotent() {
    let h = harness();
    h.seed_account(dec!(100_000), dec!(200_000));
    h.seed_quote("AAPL", dec!(180));

    // First attempt lands at the broker but the ack is lost
    h.gateway.drop_acks(1);
    let outcome = h.pipeline.submit_signal(entry_signal("AAPL", dec!(178))).await.unwrap();
    let SignalOutcome::Accepted(order_id) = outcome else {
        panic!("expected accepted, got {outcome:?}");
    };

    // The retry was deduplicated broker-side: exactly one order exists
    assert_eq!(h.gateway.order_count(), 1);
    let order = h.lifecycle.order(order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Submitted);
}

#[tokio::test]
async fn test_exhausted_retries_mark_order_failed() {
    let h = harness();
    h.seed_account(dec!(100_000), dec!(200_000));
    h.seed_quote("AAPL", dec!(180));
    h.gateway.fail_submissions(10);

    let err = h
        .pipeline
        .submit_signal(entry_signal("AAPL", dec!(178)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Gateway(ref e) if e.is_transient()));

    // The order intent is terminal and its slot released; the broker
    // never saw it
    assert_eq!(h.lifecycle.open_order_count(), 0);
    assert!(h.pipeline.open_orders().is_empty());
    assert_eq!(h.gateway.order_count(), 0);
}

#[tokio::test]
async fn test_broker_rejection_is_not_retried() {
    let h = harness();
    h.seed_account(dec!(100_000), dec!(200_000));
    h.seed_quote("AAPL", dec!(180));
    h.gateway.reject_with(Some("symbol halted"));

    let err = h
        .pipeline
        .submit_signal(entry_signal("AAPL", dec!(178)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Gateway(ref e) if !e.is_transient()));
    assert_eq!(h.lifecycle.open_order_count(), 0);
}

#[tokio::test]
async fn test_fill_after_cancel_reconciles() {
    let mut h = harness();
    let order = Order::new(
        Uuid::new_v4(),
        "AAPL",
        Side::Buy,
        OrderType::Market,
        dec!(100),
        None,
        TimeInForce::Gtc,
        Utc::now(),
    );
    let id = h.lifecycle.submit(order).await.unwrap();

    h.lifecycle.cancel(id).await.unwrap();
    assert_eq!(h.lifecycle.order(id).unwrap().status, OrderStatus::Canceled);

    // The broker filled part of it before honoring the cancel
    h.gateway.emit_fill(id, dec!(30), dec!(180)).await.unwrap();
    h.drain().await;

    let order = h.lifecycle.order(id).unwrap();
    assert_eq!(order.status, OrderStatus::PartiallyFilled);
    assert_eq!(order.filled_quantity, dec!(30));
    assert_eq!(h.cache.position("AAPL").unwrap().quantity, dec!(30));
}

#[tokio::test]
async fn test_time_in_force_expiry() {
    let h = harness();
    let order = Order::new(
        Uuid::new_v4(),
        "AAPL",
        Side::Buy,
        OrderType::Market,
        dec!(100),
        None,
        TimeInForce::Gtd(Utc::now() + Duration::milliseconds(10)),
        Utc::now(),
    );
    let id = h.lifecycle.submit(order).await.unwrap();
    assert_eq!(h.lifecycle.open_order_count(), 1);

    let expired = h.lifecycle.expire_due(Utc::now() + Duration::seconds(1)).await;
    assert_eq!(expired, vec![id]);
    assert_eq!(h.lifecycle.order(id).unwrap().status, OrderStatus::Expired);
    assert_eq!(h.lifecycle.open_order_count(), 0);
}

#[tokio::test]
async fn test_stale_pricing_liquidates_once_per_symbol() {
    let mut h = harness();
    h.seed_account(dec!(100_000), dec!(200_000));
    h.seed_quote("AAPL", dec!(180));
    h.filled_order("AAPL", Side::Buy, dec!(50), dec!(180)).await;

    // Quote goes stale
    h.cache.apply_quote(Quote::new(
        "AAPL",
        dec!(180),
        dec!(180),
        dec!(180),
        Utc::now() - Duration::seconds(120),
    ));

    let actions = h.exit.scan(Utc::now()).await;
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].trigger, ExitTrigger::StalePricingDetected);
    let liquidation = h.lifecycle.order(actions[0].order_id).unwrap();
    assert!(liquidation.liquidation);
    assert_eq!(liquidation.side, Side::Sell);
    assert_eq!(liquidation.quantity, dec!(50));

    // Second scan must not double-liquidate while the first is working
    let actions = h.exit.scan(Utc::now()).await;
    assert!(actions.is_empty());

    // Fill the liquidation; the position flattens and the guard releases
    h.gateway
        .emit_fill(liquidation.id, dec!(50), dec!(179))
        .await
        .unwrap();
    h.drain().await;
    assert!(h.cache.position("AAPL").is_none());
    let actions = h.exit.scan(Utc::now()).await;
    assert!(actions.is_empty());
}

#[tokio::test]
async fn test_drawdown_liquidates_everything() {
    let mut h = harness();
    h.seed_account(dec!(100_000), dec!(200_000));
    h.seed_quote("AAPL", dec!(180));
    h.seed_quote("MSFT", dec!(200));
    h.filled_order("AAPL", Side::Buy, dec!(50), dec!(180)).await;
    h.filled_order("MSFT", Side::Sell, dec!(20), dec!(200)).await;

    h.exit.set_baseline_equity(dec!(100_000));
    // Equity down 15% against the baseline
    h.seed_account(dec!(85_000), dec!(170_000));

    let mut actions = h.exit.scan(Utc::now()).await;
    actions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    assert_eq!(actions.len(), 2);
    assert!(
        actions
            .iter()
            .all(|a| a.trigger == ExitTrigger::AccountDrawdownExceeded)
    );

    // The short gets bought back, the long sold
    let aapl = h.lifecycle.order(actions[0].order_id).unwrap();
    let msft = h.lifecycle.order(actions[1].order_id).unwrap();
    assert_eq!(aapl.side, Side::Sell);
    assert_eq!(msft.side, Side::Buy);
    assert_eq!(msft.quantity, dec!(20));
}

#[tokio::test]
async fn test_kill_switch_halts_entries_and_liquidates() {
    let mut h = harness();
    h.seed_account(dec!(100_000), dec!(200_000));
    h.seed_quote("AAPL", dec!(180));
    h.filled_order("AAPL", Side::Buy, dec!(10), dec!(180)).await;

    h.kill_switch.engage();

    let outcome = h.pipeline.submit_signal(entry_signal("AAPL", dec!(178))).await.unwrap();
    assert_eq!(outcome, SignalOutcome::Halted);

    let actions = h.exit.scan(Utc::now()).await;
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].trigger, ExitTrigger::KillSwitchEngaged);
}

/// Delegates to a paper broker after a fixed submit latency
struct SlowGateway {
    inner: Arc<PaperGateway>,
    submit_delay: std::time::Duration,
}

#[async_trait::async_trait]
impl ExecutionGateway for SlowGateway {
    async fn submit(
        &self,
        request: aegis_gateway::SubmitRequest,
    ) -> Result<aegis_gateway::OrderAck, aegis_gateway::GatewayError> {
        tokio::time::sleep(self.submit_delay).await;
        self.inner.submit(request).await
    }

    async fn cancel(
        &self,
        request: aegis_gateway::CancelRequest,
    ) -> Result<aegis_gateway::CancelAck, aegis_gateway::GatewayError> {
        self.inner.cancel(request).await
    }

    async fn account(&self) -> Result<AccountSnapshot, aegis_gateway::GatewayError> {
        self.inner.account().await
    }

    async fn positions(
        &self,
    ) -> Result<Vec<aegis_core::PositionRecord>, aegis_gateway::GatewayError> {
        self.inner.positions().await
    }

    fn events(&self) -> Result<mpsc::Receiver<BrokerEvent>, aegis_gateway::GatewayError> {
        self.inner.events()
    }
}

#[tokio::test]
async fn test_concurrent_exit_triggers_liquidate_once() {
    let _ = env_logger::try_init();
    let paper = Arc::new(PaperGateway::new(64));
    let mut events = paper.events().unwrap();
    let gateway = Arc::new(SlowGateway {
        inner: paper.clone(),
        submit_delay: std::time::Duration::from_millis(50),
    });
    let cache = Arc::new(MarketStateCache::new());
    let lifecycle = Arc::new(OrderLifecycleManager::new(
        gateway as Arc<dyn ExecutionGateway>,
        cache.clone(),
    ));
    let exit = Arc::new(EmergencyExitController::new(
        cache.clone(),
        lifecycle.clone(),
        KillSwitch::new(),
        ExitConfig::default(),
    ));

    // One open long, built against the slow broker
    let order = Order::new(
        Uuid::new_v4(),
        "AAPL",
        Side::Buy,
        OrderType::Market,
        dec!(50),
        None,
        TimeInForce::Gtc,
        Utc::now(),
    );
    let id = lifecycle.submit(order).await.unwrap();
    paper.emit_fill(id, dec!(50), dec!(180)).await.unwrap();
    while let Ok(event) = events.try_recv() {
        lifecycle.handle_event(event).await;
    }

    // Watchdog and manual trigger race; only one may pass the guard
    let now = Utc::now();
    let (first, second) = tokio::join!(
        exit.liquidate_symbol("AAPL", ExitTrigger::StalePricingDetected, now),
        exit.liquidate_symbol("AAPL", ExitTrigger::Manual, now),
    );
    assert_eq!(
        first.is_some() as u8 + second.is_some() as u8,
        1,
        "exactly one liquidation may be in flight"
    );
    assert_eq!(lifecycle.open_order_count(), 1);
    assert_eq!(paper.order_count(), 2); // entry + single liquidation
}

#[tokio::test]
async fn test_manual_exit_for_one_symbol() {
    let mut h = harness();
    h.seed_account(dec!(100_000), dec!(200_000));
    h.seed_quote("AAPL", dec!(180));
    h.seed_quote("MSFT", dec!(200));
    h.filled_order("AAPL", Side::Buy, dec!(10), dec!(180)).await;
    h.filled_order("MSFT", Side::Buy, dec!(5), dec!(200)).await;

    let actions = h.pipeline.trigger_emergency_exit(Some("AAPL")).await;
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].symbol, "AAPL");
    assert_eq!(actions[0].trigger, ExitTrigger::Manual);
    // MSFT untouched
    assert!(h.cache.position("MSFT").is_some());
}

#[tokio::test]
async fn test_open_order_cap_rejects() {
    let policy = RiskPolicy {
        max_open_orders: 1,
        ..Default::default()
    };
    let h = harness_with_policy(policy);
    h.seed_account(dec!(100_000), dec!(200_000));
    h.seed_quote("AAPL", dec!(180));
    h.seed_quote("MSFT", dec!(200));

    let first = h.pipeline.submit_signal(entry_signal("AAPL", dec!(178))).await.unwrap();
    assert!(matches!(first, SignalOutcome::Accepted(_)));

    // First order is still working; the cap refuses a second
    let second = h.pipeline.submit_signal(entry_signal("MSFT", dec!(198))).await.unwrap();
    assert_eq!(
        second,
        SignalOutcome::Rejected(RejectReason::TooManyOpenOrders)
    );
}

#[tokio::test]
async fn test_random_fill_sequences_never_overfill() {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);

    for _ in 0..20 {
        let mut h = harness();
        let order = Order::new(
            Uuid::new_v4(),
            "AAPL",
            Side::Buy,
            OrderType::Market,
            dec!(100),
            None,
            TimeInForce::Gtc,
            Utc::now(),
        );
        let id = h.lifecycle.submit(order).await.unwrap();

        // Random fill sizes, deliberately allowed to overshoot the order
        let mut reported = Decimal::ZERO;
        while reported < dec!(150) {
            let qty = Decimal::from(rng.gen_range(1..=40));
            reported += qty;
            h.gateway.emit_fill(id, qty, dec!(180)).await.unwrap();
        }
        h.drain().await;

        let order = h.lifecycle.order(id).unwrap();
        assert_eq!(order.filled_quantity, dec!(100));
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(h.cache.position("AAPL").unwrap().quantity, dec!(100));
    }
}
