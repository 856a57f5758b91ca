//! Aegis Risk
//!
//! Pre-trade risk gating for the execution pipeline:
//!
//! - **Risk Policy Engine**: pure evaluation of a signal against configured
//!   limits, producing an approve/reject decision with a quantity cap
//! - **Position Sizer**: converts an approved decision into an order
//!   quantity bounded by capital at risk and lot size
//! - **Audit Trail**: serializable records of every decision, for the
//!   "why did/didn't we trade" question after the fact
//!
//! ## Architecture
//!
//! ```text
//! Signal ──► RiskEngine::evaluate ──► RiskDecision ──► PositionSizer::size
//!                 │                                          │
//!                 │ (account, position, quote,               │ Quantity or
//!                 │  open orders, daily PnL)                 │ ZeroQuantity
//!                 ▼                                          ▼
//!            AuditLog::record                         Order Lifecycle
//! ```
//!
//! Evaluation is deterministic and does no I/O: identical inputs always
//! yield identical decisions. All state it needs (market view, open-order
//! count, daily PnL) is passed in by the caller.

pub mod audit;
pub mod decision;
pub mod engine;
pub mod policy;
pub mod sizer;

// Re-export main types
pub use audit::{AuditLog, JsonlAuditLog, MemoryAuditLog, RiskAuditRecord};
pub use decision::{AppliedLimit, LimitKind, RejectReason, RiskDecision};
pub use engine::{RiskEngine, RiskInputs};
pub use policy::RiskPolicy;
pub use sizer::{PositionSizer, Sizing};
