//! Risk decision audit trail
//!
//! Every evaluation is recorded so a rejected signal can be explained
//! after the fact. Records are serde-serializable; the JSON-lines sink
//! gives durability across restarts without committing to a database.

use crate::decision::{RejectReason, RiskDecision};
use aegis_core::{Signal, SignalId};
use chrono::{DateTime, Utc};
use log::error;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Mutex;

/// One audited risk decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAuditRecord {
    pub signal_id: SignalId,
    pub strategy_id: String,
    pub symbol: String,
    pub approved: bool,
    pub reason: Option<RejectReason>,
    pub max_quantity: Decimal,
    /// Quantity actually sized, when sizing happened
    pub sized_quantity: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl RiskAuditRecord {
    pub fn from_decision(
        signal: &Signal,
        decision: &RiskDecision,
        sized_quantity: Option<Decimal>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            signal_id: signal.id,
            strategy_id: signal.strategy_id.clone(),
            symbol: signal.symbol.clone(),
            approved: decision.approved,
            reason: decision.reason,
            max_quantity: decision.max_quantity,
            sized_quantity,
            timestamp,
        }
    }
}

/// Sink for audit records
pub trait AuditLog: Send + Sync {
    fn record(&self, record: RiskAuditRecord);
}

/// Keeps records in memory (tests, short-lived sessions)
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<RiskAuditRecord>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<RiskAuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditLog for MemoryAuditLog {
    fn record(&self, record: RiskAuditRecord) {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record);
    }
}

/// Writes one JSON object per line to any writer (file, stdout)
pub struct JsonlAuditLog<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonlAuditLog<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> AuditLog for JsonlAuditLog<W> {
    fn record(&self, record: RiskAuditRecord) {
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match serde_json::to_string(&record) {
            Ok(line) => {
                if let Err(e) = writeln!(writer, "{line}") {
                    error!("[AUDIT] write failed: {e}");
                }
            }
            Err(e) => error!("[AUDIT] serialize failed: {e}"),
        }
    }
}
