use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared, set-once style cancellation flag.
///
/// Clones observe the same flag, so a clone can be handed to another thread,
/// a signal handler or a reporter while the walk keeps polling its own copy.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.set(true);
    }

    pub fn set(&self, cancelled: bool) {
        self.0.store(cancelled, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
