//! Cooperative cancellation shared between a job and its caller.

use tokio::sync::watch;

/// Cloneable cancellation flag.
///
/// Loops poll [`is_cancelled`](Self::is_cancelled) at their checkpoints; a
/// supervisor (Ctrl-C handler, test) calls [`cancel`](Self::cancel). Clones
/// share the same flag.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the signal is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}
