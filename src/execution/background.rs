//! # Background Task Dispatcher
//!
//! Decouples slow multi-call workflows from the request path. Units of work
//! are queued on an mpsc channel and a dispatcher task spawns each of them
//! onto a [`JoinSet`]. Callers never observe the outcome: a failed unit of
//! work is terminal and only logged, which makes the log the dead-letter sink.
//!
//! ```rust,no_run
//! use kg_integration::execution::BackgroundDispatcher;
//!
//! # async fn example() {
//! let dispatcher = BackgroundDispatcher::new();
//! dispatcher.dispatch("sync_collab_users", async move {
//!     // remote calls...
//!     Ok(())
//! });
//! dispatcher.wait_idle().await;
//! # }
//! ```

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::error::GatewayResult;

struct QueuedWork {
    name: String,
    work: BoxFuture<'static, GatewayResult<()>>,
}

#[derive(Debug, Clone)]
pub struct BackgroundDispatcher {
    queue: mpsc::UnboundedSender<QueuedWork>,
    pending: Arc<watch::Sender<usize>>,
}

impl BackgroundDispatcher {
    /// Create the dispatcher and start its worker. Requires a tokio runtime.
    pub fn new() -> Self {
        let (queue, queue_rx) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0usize);
        let pending = Arc::new(pending);

        tokio::spawn(Self::run(queue_rx, Arc::clone(&pending)));
        debug!("Background dispatcher started");

        Self { queue, pending }
    }

    /// Queue a unit of work detached from the response. It may start before
    /// the response is sent, so state the response depends on must be
    /// committed before dispatching.
    pub fn dispatch<F>(&self, name: impl Into<String>, work: F)
    where
        F: Future<Output = GatewayResult<()>> + Send + 'static,
    {
        let name = name.into();
        self.pending.send_modify(|pending| *pending += 1);

        let queued = QueuedWork {
            name,
            work: Box::pin(work),
        };
        if let Err(mpsc::error::SendError(rejected)) = self.queue.send(queued) {
            self.pending.send_modify(|pending| *pending -= 1);
            error!(task = %rejected.name, "Background dispatcher is stopped, work dropped");
        }
    }

    /// Number of queued or running units of work
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Resolve once every dispatched unit of work has finished
    pub async fn wait_idle(&self) {
        let mut pending = self.pending.subscribe();
        // The sender lives in self, so the channel cannot close here
        let _ = pending.wait_for(|count| *count == 0).await;
    }

    async fn run(
        mut queue_rx: mpsc::UnboundedReceiver<QueuedWork>,
        pending: Arc<watch::Sender<usize>>,
    ) {
        let mut running = JoinSet::new();

        loop {
            tokio::select! {
                Some(queued) = queue_rx.recv() => {
                    running.spawn(Self::execute(queued));
                }
                Some(joined) = running.join_next(), if !running.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Background task panicked or was cancelled");
                    }
                    pending.send_modify(|count| *count = count.saturating_sub(1));
                }
                else => break,
            }
        }

        debug!("Background dispatcher stopped");
    }

    async fn execute(queued: QueuedWork) {
        let QueuedWork { name, work } = queued;
        let started = Instant::now();
        debug!(task = %name, "Background task started");

        match work.await {
            Ok(()) => info!(
                task = %name,
                duration_ms = started.elapsed().as_millis() as u64,
                "Background task completed"
            ),
            Err(e) => error!(
                task = %name,
                error = %e,
                duration_ms = started.elapsed().as_millis() as u64,
                "Background task failed"
            ),
        }
    }
}

impl Default for BackgroundDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_dispatched_work_runs_to_completion() {
        let dispatcher = BackgroundDispatcher::new();
        let counter = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let counter = counter.clone();
            dispatcher.dispatch("increment", async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        dispatcher.wait_idle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(dispatcher.pending(), 0);
    }

    #[tokio::test]
    async fn test_failing_work_does_not_stop_the_dispatcher() {
        let dispatcher = BackgroundDispatcher::new();
        let counter = Arc::new(AtomicU32::new(0));

        dispatcher.dispatch("fails", async { Err(GatewayError::unhandled("boom")) });
        let after = counter.clone();
        dispatcher.dispatch("after_failure", async move {
            after.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        dispatcher.wait_idle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispatch_returns_without_awaiting_work() {
        let dispatcher = BackgroundDispatcher::new();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        dispatcher.dispatch("blocked", async move {
            let _ = release_rx.await;
            Ok(())
        });
        assert_eq!(dispatcher.pending(), 1);

        release_tx.send(()).unwrap();
        dispatcher.wait_idle().await;
        assert_eq!(dispatcher.pending(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_returns_immediately_without_work() {
        let dispatcher = BackgroundDispatcher::new();
        dispatcher.wait_idle().await;
        assert_eq!(dispatcher.pending(), 0);
    }
}
