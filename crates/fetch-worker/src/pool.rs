use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use transit_object_store::Storage;
use transit_queue::Queue;

use crate::fetch;

/// A pool of N workers consuming `FetchTask`s from a queue. The pool size
/// (default 1) bounds concurrent outbound HTTP connections (§5.2).
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl WorkerPool {
    /// Spawn `workers` tasks, each looping `queue.dequeue()` → `fetch::execute`
    /// until the queue is closed or shutdown is signaled.
    pub fn spawn<Q, S>(queue: Arc<Q>, storage: Arc<S>, workers: usize) -> Self
    where
        Q: Queue + 'static,
        S: Storage + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers.max(1) {
            let queue = Arc::clone(&queue);
            let storage = Arc::clone(&storage);
            let mut shutdown_rx = shutdown_rx.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                tracing::info!(worker_id, "worker shutting down");
                                break;
                            }
                        }
                        task = queue.dequeue() => {
                            match task {
                                Ok(Some(task)) => {
                                    let metrics = task.metrics();
                                    let result = fetch::execute(
                                        storage.as_ref(),
                                        task.tick,
                                        task.config.clone(),
                                        task.page.clone(),
                                        task.dry,
                                    )
                                    .await;
                                    if let Err(err) = result {
                                        let exc_type = if err.is_transient() {
                                            "FetchTransient"
                                        } else {
                                            "FetchPermanent"
                                        };
                                        metrics.task_signal("error", Some(exc_type));
                                        tracing::warn!(worker_id, error = %err, "fetch task failed");
                                    }
                                }
                                Ok(None) => {
                                    tracing::info!(worker_id, "queue closed, worker exiting");
                                    break;
                                }
                                Err(err) => {
                                    tracing::error!(worker_id, error = %err, "queue error");
                                    break;
                                }
                            }
                        }
                    }
                }
            }));
        }
        Self { handles, shutdown_tx }
    }

    /// Signal all workers to stop after their current task and await them.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
