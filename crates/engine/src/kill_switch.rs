//! Manual kill switch
//!
//! Engaging it flips the whole pipeline to exit-only: opening signals
//! are refused and the next emergency-exit scan liquidates everything.

use log::warn;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
pub struct KillSwitch {
    engaged: Arc<AtomicBool>,
}

impl KillSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engage(&self) {
        if !self.engaged.swap(true, Ordering::SeqCst) {
            warn!("[KILL SWITCH] engaged - pipeline is exit-only");
        }
    }

    pub fn release(&self) {
        self.engaged.store(false, Ordering::SeqCst);
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::SeqCst)
    }
}
