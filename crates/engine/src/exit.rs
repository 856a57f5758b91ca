//! Emergency exit
//!
//! Watches account drawdown, quote freshness and the kill switch, and
//! liquidates positions with market orders when a trigger fires.
//! Liquidations bypass risk evaluation entirely: closing exposure must
//! never be blocked by a limit that exists to prevent opening it.

use crate::kill_switch::KillSwitch;
use crate::lifecycle::OrderLifecycleManager;
use aegis_core::{Order, OrderId, PositionRecord};
use aegis_market::MarketStateCache;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::{error, info, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// What fired the exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTrigger {
    AccountDrawdownExceeded,
    StalePricingDetected,
    KillSwitchEngaged,
    Manual,
}

impl ExitTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountDrawdownExceeded => "account_drawdown_exceeded",
            Self::StalePricingDetected => "stale_pricing_detected",
            Self::KillSwitchEngaged => "kill_switch_engaged",
            Self::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExitConfig {
    /// Liquidate everything once equity drops this far below the session
    /// baseline
    pub max_drawdown_pct: Decimal,
    /// A position whose quote is older than this gets liquidated
    pub quote_freshness_secs: i64,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            max_drawdown_pct: dec!(0.10),
            quote_freshness_secs: 60,
        }
    }
}

impl ExitConfig {
    fn quote_freshness(&self) -> Duration {
        Duration::seconds(self.quote_freshness_secs)
    }
}

/// One liquidation the controller kicked off
#[derive(Debug, Clone)]
pub struct ExitAction {
    pub symbol: String,
    pub trigger: ExitTrigger,
    pub order_id: OrderId,
}

pub struct EmergencyExitController {
    cache: Arc<MarketStateCache>,
    lifecycle: Arc<OrderLifecycleManager>,
    kill_switch: KillSwitch,
    config: ExitConfig,
    /// Session-start equity; drawdown is measured against this
    baseline_equity: Mutex<Option<Decimal>>,
    /// One in-flight liquidation per symbol
    exits_in_flight: DashMap<String, OrderId>,
}

impl EmergencyExitController {
    pub fn new(
        cache: Arc<MarketStateCache>,
        lifecycle: Arc<OrderLifecycleManager>,
        kill_switch: KillSwitch,
        config: ExitConfig,
    ) -> Self {
        Self {
            cache,
            lifecycle,
            kill_switch,
            config,
            baseline_equity: Mutex::new(None),
            exits_in_flight: DashMap::new(),
        }
    }

    /// Pin the drawdown baseline (otherwise the first account snapshot
    /// seen by a scan becomes the baseline)
    pub fn set_baseline_equity(&self, equity: Decimal) {
        *self
            .baseline_equity
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(equity);
    }

    /// One watchdog pass: release finished liquidations, evaluate
    /// triggers, kick off whatever liquidations are due.
    pub async fn scan(&self, now: DateTime<Utc>) -> Vec<ExitAction> {
        self.release_completed();

        if self.kill_switch.is_engaged() {
            return self.liquidate_all(ExitTrigger::KillSwitchEngaged, now).await;
        }
        if self.drawdown_breached() {
            return self
                .liquidate_all(ExitTrigger::AccountDrawdownExceeded, now)
                .await;
        }

        // Per-symbol: untrusted pricing means we can't manage the
        // position, so we close it
        let mut actions = Vec::new();
        for position in self.cache.positions() {
            let stale = self
                .cache
                .quote(&position.symbol)
                .map(|q| q.is_stale(now, self.config.quote_freshness()))
                .unwrap_or(true);
            if stale {
                if let Some(action) = self
                    .liquidate_position(&position, ExitTrigger::StalePricingDetected, now)
                    .await
                {
                    actions.push(action);
                }
            }
        }
        actions
    }

    /// Liquidate every open position
    pub async fn liquidate_all(&self, trigger: ExitTrigger, now: DateTime<Utc>) -> Vec<ExitAction> {
        let mut actions = Vec::new();
        for position in self.cache.positions() {
            if let Some(action) = self.liquidate_position(&position, trigger, now).await {
                actions.push(action);
            }
        }
        actions
    }

    /// Liquidate one symbol's position, if any
    pub async fn liquidate_symbol(
        &self,
        symbol: &str,
        trigger: ExitTrigger,
        now: DateTime<Utc>,
    ) -> Option<ExitAction> {
        let position = self.cache.position(symbol)?;
        self.liquidate_position(&position, trigger, now).await
    }

    async fn liquidate_position(
        &self,
        position: &PositionRecord,
        trigger: ExitTrigger,
        now: DateTime<Utc>,
    ) -> Option<ExitAction> {
        if position.is_flat() {
            return None;
        }
        let side = position.closing_side();
        let order = Order::liquidation(
            Uuid::new_v4(),
            position.symbol.clone(),
            side,
            position.quantity.abs(),
            now,
        );

        // Reserve the symbol before the broker round-trip so a concurrent
        // trigger can't slip past the one-liquidation guard
        match self.exits_in_flight.entry(position.symbol.clone()) {
            Entry::Occupied(_) => return None,
            Entry::Vacant(slot) => {
                slot.insert(order.id);
            }
        }
        warn!(
            "[EMERGENCY EXIT] {} liquidating {} {} ({})",
            position.symbol,
            side.as_str(),
            position.quantity.abs(),
            trigger.as_str()
        );

        match self.lifecycle.submit(order).await {
            Ok(order_id) => {
                info!("[EMERGENCY EXIT] {} order {}", position.symbol, order_id);
                Some(ExitAction {
                    symbol: position.symbol.clone(),
                    trigger,
                    order_id,
                })
            }
            Err(e) => {
                // Next scan retries with a fresh order
                error!("[EMERGENCY EXIT] {} submit failed: {e}", position.symbol);
                self.exits_in_flight.remove(&position.symbol);
                None
            }
        }
    }

    fn drawdown_breached(&self) -> bool {
        let Some(account) = self.cache.account_snapshot() else {
            return false;
        };
        let mut baseline = self
            .baseline_equity
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        let baseline = *baseline.get_or_insert(account.equity);
        if baseline <= Decimal::ZERO {
            return false;
        }
        (baseline - account.equity) / baseline >= self.config.max_drawdown_pct
    }

    fn release_completed(&self) {
        self.exits_in_flight.retain(|_, order_id| {
            match self.lifecycle.order(*order_id) {
                Some(order) => !order.status.is_terminal(),
                None => false,
            }
        });
    }
}
