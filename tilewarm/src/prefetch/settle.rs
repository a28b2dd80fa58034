//! Settle debounce: at most one pending planning task.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Runs a task once the viewport has been quiet for a delay.
///
/// Every [`arm`](SettleTimer::arm) cancels the previously armed task, so
/// only the most recent one can fire.
#[derive(Debug)]
pub struct SettleTimer {
    pending: Mutex<Option<CancellationToken>>,
    runtime: Handle,
}

impl SettleTimer {
    pub fn new(runtime: Handle) -> Self {
        Self {
            pending: Mutex::new(None),
            runtime,
        }
    }

    /// Cancel any pending task and schedule `task` to run after `delay`.
    pub fn arm<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        if let Some(previous) = self.pending.lock().replace(token.clone()) {
            previous.cancel();
        }

        self.runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    trace!("Settle task superseded");
                }
                _ = tokio::time::sleep(delay) => {
                    task.await;
                }
            }
        });
    }

    /// Cancel the pending task, if any.
    pub fn cancel(&self) {
        if let Some(token) = self.pending.lock().take() {
            token.cancel();
        }
    }

    /// Whether the most recently armed task is still live.
    pub fn is_armed(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }
}

impl Drop for SettleTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
