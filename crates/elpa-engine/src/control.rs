//! Cooperative cancel/pause signalling. A cancellation token plus a pause
//! flag, cloneable so a caller can hold onto a handle and signal a
//! scheduler loop that's being driven by a concurrently running
//! `execute`/`resume` future.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct ExecutionControl {
    cancel: CancellationToken,
    pause_requested: Arc<AtomicBool>,
}

impl ExecutionControl {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            pause_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn request_pause(&self) {
        self.pause_requested.store(true, Ordering::SeqCst);
    }

    /// Consumes the pending pause request, if any — checked at every node
    /// boundary alongside cancellation.
    pub fn take_pause_request(&self) -> bool {
        self.pause_requested.swap(false, Ordering::SeqCst)
    }
}

impl Default for ExecutionControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_request_is_consumed_once() {
        let control = ExecutionControl::new();
        assert!(!control.take_pause_request());
        control.request_pause();
        assert!(control.take_pause_request());
        assert!(!control.take_pause_request());
    }

    #[test]
    fn clones_share_the_same_cancellation() {
        let control = ExecutionControl::new();
        let clone = control.clone();
        clone.cancel();
        assert!(control.is_cancelled());
    }
}
