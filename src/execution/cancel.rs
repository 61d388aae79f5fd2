//! Cancellation signal shared by wait steps and the orchestrator

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::warn;

/// A cloneable, one-way cancellation flag
///
/// Every clone observes the same flag. Once cancelled it stays cancelled.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal is cancelled; pends forever otherwise
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as `self`, so this only returns on cancel
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Cancel automatically after `after` elapses (run-level deadline)
    pub fn cancel_after(&self, after: Duration) -> tokio::task::JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if !signal.is_cancelled() {
                warn!("Run deadline of {}s reached, cancelling", after.as_secs());
                signal.cancel();
            }
        })
    }

    /// Cancel on Ctrl-C
    pub fn cancel_on_interrupt(&self) -> tokio::task::JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling release");
                signal.cancel();
            }
        })
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}
