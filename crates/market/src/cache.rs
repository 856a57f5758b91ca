//! In-memory market state keyed by symbol

use aegis_core::{AccountSnapshot, Fill, PositionRecord, Quote};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use log::debug;
use rust_decimal::Decimal;
use std::sync::RwLock;

/// Per-symbol state: latest quote and current position
#[derive(Debug, Clone, Default)]
pub struct SymbolState {
    pub quote: Option<Quote>,
    pub position: Option<PositionRecord>,
    /// Bumped once per external event applied to this symbol
    pub version: u64,
}

/// Consistent point-in-time view of one symbol
#[derive(Debug, Clone)]
pub struct MarketView {
    pub symbol: String,
    pub quote: Option<Quote>,
    pub position: Option<PositionRecord>,
    pub account: Option<AccountSnapshot>,
    pub version: u64,
}

impl MarketView {
    /// Age of the symbol's quote at `now`, if a quote exists
    pub fn quote_age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.quote.as_ref().map(|q| q.age(now))
    }

    /// True when no quote exists or the quote is older than the bound
    pub fn is_stale(&self, now: DateTime<Utc>, freshness: Duration) -> bool {
        match &self.quote {
            Some(q) => q.is_stale(now, freshness),
            None => true,
        }
    }
}

/// Market state cache
///
/// Single logical writer per symbol (the pipeline serializes mutations per
/// symbol); many concurrent readers. No network calls, no persistence.
#[derive(Debug, Default)]
pub struct MarketStateCache {
    symbols: DashMap<String, SymbolState>,
    account: RwLock<Option<AccountSnapshot>>,
}

impl MarketStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a quote update for its symbol
    pub fn apply_quote(&self, quote: Quote) {
        let mut entry = self.symbols.entry(quote.symbol.clone()).or_default();
        entry.quote = Some(quote);
        entry.version += 1;
    }

    /// Replace the account snapshot wholesale
    pub fn apply_account(&self, snapshot: AccountSnapshot) {
        let mut guard = self
            .account
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(snapshot);
    }

    /// Apply a fill to the symbol's position, returning the realized PnL
    /// from any closed portion.
    ///
    /// A position record is created on the first fill and dropped when the
    /// net quantity returns to zero.
    pub fn apply_fill(&self, fill: &Fill) -> Decimal {
        let mut entry = self.symbols.entry(fill.symbol.clone()).or_default();
        let position = entry
            .position
            .get_or_insert_with(|| PositionRecord::new(fill.symbol.clone(), fill.timestamp));

        let realized = position.apply_fill(fill.side, fill.quantity, fill.price);
        if position.is_flat() {
            debug!("[CACHE] {} position flat, dropping record", fill.symbol);
            entry.position = None;
        }
        entry.version += 1;
        realized
    }

    /// Overwrite the position for a symbol (startup reconciliation against
    /// the broker's own position list)
    pub fn set_position(&self, position: PositionRecord) {
        let mut entry = self.symbols.entry(position.symbol.clone()).or_default();
        entry.position = if position.is_flat() {
            None
        } else {
            Some(position)
        };
        entry.version += 1;
    }

    /// Consistent point-in-time view of one symbol
    pub fn view(&self, symbol: &str) -> MarketView {
        let (quote, position, version) = match self.symbols.get(symbol) {
            Some(entry) => (entry.quote.clone(), entry.position.clone(), entry.version),
            None => (None, None, 0),
        };
        MarketView {
            symbol: symbol.to_string(),
            quote,
            position,
            account: self.account_snapshot(),
            version,
        }
    }

    /// Latest account snapshot, if any has been applied
    pub fn account_snapshot(&self) -> Option<AccountSnapshot> {
        self.account
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Latest quote for a symbol
    pub fn quote(&self, symbol: &str) -> Option<Quote> {
        self.symbols.get(symbol).and_then(|e| e.quote.clone())
    }

    /// Current position for a symbol
    pub fn position(&self, symbol: &str) -> Option<PositionRecord> {
        self.symbols.get(symbol).and_then(|e| e.position.clone())
    }

    /// Snapshot of all open positions (emergency-exit scan)
    pub fn positions(&self) -> Vec<PositionRecord> {
        self.symbols
            .iter()
            .filter_map(|entry| entry.position.clone())
            .collect()
    }

    /// Sum of realized + unrealized PnL across all open positions, marked
    /// at each symbol's latest quote mid. Symbols without a quote
    /// contribute only realized PnL.
    pub fn open_position_pnl(&self) -> Decimal {
        self.symbols
            .iter()
            .filter_map(|entry| {
                let pos = entry.position.as_ref()?;
                Some(match &entry.quote {
                    Some(q) => pos.total_pnl(q.mid()),
                    None => pos.realized_pnl,
                })
            })
            .sum()
    }
}
