//! # Aegis Execution Engine
//!
//! Turns strategy signals into risk-gated broker orders and tracks each
//! order to a terminal state:
//!
//! ```text
//!  Signal ──▶ ┌───────────────────┐   approved &   ┌──────────────────────┐
//!             │ ExecutionPipeline │ ──── sized ──▶ │ OrderLifecycleManager│
//!             │  dedup -> risk -> │                │  per-symbol serialized│
//!             │  size -> submit   │                │  submit / fills / TIF │
//!             └───────────────────┘                └──────────┬───────────┘
//!                      ▲                                      │ orders
//!        MarketStateCache (quotes, positions, account)   ExecutionGateway
//!                      ▲                                      │ events
//!             ┌────────┴──────────────┐                       ▼
//!             │EmergencyExitController│ ◀──── fills / status / account
//!             │ drawdown, staleness,  │
//!             │ kill switch           │
//!             └───────────────────────┘
//! ```
//!
//! Every signal id is consumed exactly once. Entry orders pass through
//! the risk engine and position sizer; flattens and emergency
//! liquidations bypass both, because closing exposure must never be
//! blocked by a limit designed to prevent opening it.

mod error;
mod exit;
mod kill_switch;
mod lifecycle;
mod pipeline;

pub use error::{EngineError, EngineResult};
pub use exit::{EmergencyExitController, ExitAction, ExitConfig, ExitTrigger};
pub use kill_switch::KillSwitch;
pub use lifecycle::OrderLifecycleManager;
pub use pipeline::{ExecutionPipeline, PipelineConfig, SignalOutcome};
