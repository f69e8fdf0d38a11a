//! Stream cancellation
//!
//! A [`CancelHandle`] / [`CancelToken`] pair is created per dispatched turn.
//! The handle lives in the [`StreamController`] so the front-end can stop the
//! stream; the token is observed by the read loop at its next suspension
//! point. Cancelling is effective exactly once.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

/// Create a linked handle/token pair
#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

/// Sending half: raises the cancellation signal
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Raise the signal. Returns `true` only for the call that actually
    /// cancelled; later calls are no-ops.
    pub fn cancel(&self) -> bool {
        self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    /// Whether the signal has been raised
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Receiving half: observed by the stream loop
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Whether the signal has been raised
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the signal is raised.
    ///
    /// If the handle is dropped without cancelling, this never resolves.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Front-end handle on the in-flight stream
///
/// Cloneable and cheap; every clone sees the same stream. This is what a
/// send/stop toggle talks to.
#[derive(Debug, Clone, Default)]
pub struct StreamController {
    active: Arc<Mutex<Option<CancelHandle>>>,
}

impl StreamController {
    /// Create an idle controller
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a stream is in flight
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Cancel the in-flight stream. Returns `false` if nothing is streaming or
    /// the stream was already cancelled.
    pub fn cancel(&self) -> bool {
        let guard = self.active.lock();
        match guard.as_ref() {
            Some(handle) => {
                let cancelled = handle.cancel();
                if cancelled {
                    tracing::debug!("Stream cancellation requested");
                }
                cancelled
            }
            None => false,
        }
    }

    /// Register a new stream. Returns `None` while another one is in flight.
    pub(crate) fn arm(&self) -> Option<CancelToken> {
        let mut guard = self.active.lock();
        if guard.is_some() {
            return None;
        }
        let (handle, token) = cancel_pair();
        *guard = Some(handle);
        Some(token)
    }

    /// Forget the finished stream
    pub(crate) fn disarm(&self) {
        self.active.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancel_is_effective_once() {
        let (handle, token) = cancel_pair();
        assert!(!token.is_cancelled());

        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(token.is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_token_resolves_after_cancel() {
        let (handle, mut token) = cancel_pair();
        let waiter = tokio::spawn(async move {
            token.cancelled().await;
        });

        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_never_resolves() {
        let (handle, mut token) = cancel_pair();
        drop(handle);

        let waited = tokio::time::timeout(Duration::from_secs(5), token.cancelled()).await;
        assert!(waited.is_err());
    }

    #[test]
    fn test_controller_single_active_stream() {
        let controller = StreamController::new();
        assert!(!controller.is_active());
        assert!(!controller.cancel());

        let token = controller.arm().unwrap();
        assert!(controller.is_active());
        assert!(controller.arm().is_none());

        let remote = controller.clone();
        assert!(remote.cancel());
        assert!(!remote.cancel());
        assert!(token.is_cancelled());

        controller.disarm();
        assert!(!controller.is_active());
        assert!(controller.arm().is_some());
    }
}
