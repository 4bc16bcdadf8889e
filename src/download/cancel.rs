//! Cooperative cancellation shared by the dispatcher and its workers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Once set, workers take no new tasks and no new attempts start.
/// Attempts already running are allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
