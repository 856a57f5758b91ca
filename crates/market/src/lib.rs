//! Aegis Market State Cache
//!
//! Holds the latest known quote and position per symbol plus the most
//! recent account snapshot. The cache is the pipeline's only source of
//! market truth: every risk evaluation and emergency-exit scan reads from
//! here, never from the network.
//!
//! ## Consistency
//!
//! Quote and position for one symbol live in a single map entry and are
//! updated and read under that entry's guard, with a version bump per
//! external event. A reader therefore never observes a quote/position pair
//! from two different updates. The account snapshot is replaced wholesale
//! under its own lock; consumers get the latest snapshot attached to the
//! per-symbol view.
//!
//! Readers don't block writers for whole-book scans: `positions()` walks
//! the map entry by entry, so the emergency-exit controller's periodic
//! sweep never stalls order processing on other symbols.

mod cache;

pub use cache::{MarketStateCache, MarketView, SymbolState};
