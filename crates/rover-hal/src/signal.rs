//! Operator interrupt plumbing.
//!
//! [`shutdown_channel`] returns a [`ShutdownTrigger`] (held by whoever handles
//! Ctrl-C) and a [`ShutdownSignal`] that long-running operations clone and
//! await. Triggering is sticky: once fired, every current and future clone
//! observes it.

use std::sync::Arc;

use tokio::sync::watch;

/// Create a linked trigger/signal pair.
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger(Arc::new(tx)), ShutdownSignal(rx))
}

/// Fires the interrupt. Safe to call from a signal-handler thread.
#[derive(Clone)]
pub struct ShutdownTrigger(Arc<watch::Sender<bool>>);

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }
}

/// Observes the interrupt.
#[derive(Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    /// A signal with no trigger; it never fires.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // The receiver keeps the last value after the sender is gone.
        drop(tx);
        Self(rx)
    }

    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolve once the trigger fires. Pends forever if the trigger was
    /// dropped without firing.
    pub async fn triggered(&mut self) {
        let closed = self.0.wait_for(|fired| *fired).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}
