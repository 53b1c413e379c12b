//! Cooperative cancellation shared between a run and whoever may abort it

use crate::error::MeasureError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Cancellation flag checked at every suspension point of a measurement.
///
/// Clones observe the same flag. Once cancelled a token stays cancelled.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
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

    /// Resolves once the token has been cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives inside every clone, so `changed` cannot fail here
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Fails fast if the token is already cancelled
    pub fn check(&self) -> Result<(), MeasureError> {
        if self.is_cancelled() {
            Err(MeasureError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run `fut` to completion unless the token fires first
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, MeasureError> {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(MeasureError::Cancelled),
            out = fut => Ok(out),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
        assert_eq!(observer.check(), Err(MeasureError::Cancelled));
    }

    #[tokio::test]
    async fn guard_passes_output_through() {
        let token = CancelToken::new();
        let out = token.guard(async { 7 }).await;
        assert_eq!(out, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn guard_aborts_pending_future() {
        let token = CancelToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let out = token
            .guard(tokio::time::sleep(Duration::from_secs(3600)))
            .await;
        assert_eq!(out, Err(MeasureError::Cancelled));
    }

    #[tokio::test]
    async fn guard_refuses_after_cancel() {
        let token = CancelToken::new();
        token.cancel();
        let out = token.guard(async { 1 }).await;
        assert_eq!(out, Err(MeasureError::Cancelled));
    }
}
