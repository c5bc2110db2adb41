use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::ComparisonOutcome;
use crate::services::store::RatingStore;

/// Non-blocking sink for comparison outcomes
///
/// `submit` only enqueues. A background task forwards each outcome to the
/// rating store; failures and timeouts are logged and dropped, never retried.
#[derive(Clone)]
pub struct ComparisonDispatcher {
    outcome_tx: mpsc::UnboundedSender<ComparisonOutcome>,
}

/// Handle for stopping the dispatcher task
///
/// Dropping the handle detaches the task; it then runs until every
/// `ComparisonDispatcher` clone is gone.
pub struct DispatcherHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Stops the worker after it has forwarded everything already queued
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Comparison dispatcher task failed");
        }
        tracing::info!("Comparison dispatcher stopped");
    }
}

impl ComparisonDispatcher {
    /// Spawns the forwarding task on the current runtime
    pub fn spawn(store: Arc<dyn RatingStore>, submit_timeout: Duration) -> (Self, DispatcherHandle) {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let task = tokio::spawn(async move {
            Self::dispatch_task(store, submit_timeout, outcome_rx, shutdown_rx).await;
        });

        (
            Self { outcome_tx },
            DispatcherHandle { shutdown_tx, task },
        )
    }

    /// Queues an outcome for submission and returns immediately
    pub fn submit(&self, outcome: ComparisonOutcome) {
        if let Err(e) = self.outcome_tx.send(outcome) {
            tracing::warn!(
                new_item_id = %e.0.new_item_id,
                existing_item_id = %e.0.existing_item_id,
                "Comparison dispatcher is stopped, dropping outcome"
            );
        }
    }

    async fn dispatch_task(
        store: Arc<dyn RatingStore>,
        submit_timeout: Duration,
        mut outcome_rx: mpsc::UnboundedReceiver<ComparisonOutcome>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!(store = store.name(), "Comparison dispatcher started");

        loop {
            tokio::select! {
                Some(outcome) = outcome_rx.recv() => {
                    Self::forward(store.as_ref(), submit_timeout, &outcome).await;
                }
                Some(()) = shutdown_rx.recv() => {
                    // Senders live as long as the engine, so drain what is
                    // queued now instead of waiting for the channel to close.
                    let mut flushed = 0usize;
                    while let Ok(outcome) = outcome_rx.try_recv() {
                        Self::forward(store.as_ref(), submit_timeout, &outcome).await;
                        flushed += 1;
                    }
                    tracing::info!(flushed, "Comparison dispatcher shutting down");
                    break;
                }
                else => break,
            }
        }
    }

    async fn forward(store: &dyn RatingStore, submit_timeout: Duration, outcome: &ComparisonOutcome) {
        match tokio::time::timeout(submit_timeout, store.submit_comparison(outcome)).await {
            Ok(Ok(())) => {
                tracing::debug!(
                    new_item_id = %outcome.new_item_id,
                    existing_item_id = %outcome.existing_item_id,
                    new_item_won = outcome.new_item_won(),
                    decided_at = %outcome.decided_at,
                    "Comparison recorded"
                );
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    error = %e,
                    new_item_id = %outcome.new_item_id,
                    existing_item_id = %outcome.existing_item_id,
                    decided_at = %outcome.decided_at,
                    "Failed to record comparison, dropping"
                );
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = submit_timeout.as_millis() as u64,
                    new_item_id = %outcome.new_item_id,
                    existing_item_id = %outcome.existing_item_id,
                    decided_at = %outcome.decided_at,
                    "Timed out recording comparison, dropping"
                );
            }
        }
    }
}
