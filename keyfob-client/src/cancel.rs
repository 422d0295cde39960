//! Cancellation of an in-progress authorization.
//!
//! A broadcast channel whose receivers are subscribed per-wait, so a signal
//! can be cloned into the flow once and fired from anywhere. The flag covers
//! the window before the first subscription: cancelling before the flow
//! starts still aborts it promptly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Cancel signal that can be cloned and awaited.
#[derive(Clone)]
pub struct CancelSignal {
    sender: broadcast::Sender<()>,
    cancelled: Arc<AtomicBool>,
}

impl CancelSignal {
    /// Wait until cancellation is requested.
    pub async fn recv(&self) {
        if self.cancelled.load(Ordering::SeqCst) {
            return;
        }
        let mut receiver = self.sender.subscribe();
        if self.cancelled.load(Ordering::SeqCst) {
            return;
        }
        let _ = receiver.recv().await;
    }

    /// Whether cancellation has already been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Owner side of a cancellation signal.
pub struct CancelCoordinator {
    sender: broadcast::Sender<()>,
    cancelled: Arc<AtomicBool>,
}

impl CancelCoordinator {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a signal to hand to an authorization flow.
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            sender: self.sender.clone(),
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let _ = self.sender.send(());
    }
}

impl Default for CancelCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
