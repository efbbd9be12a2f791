use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Notify};

use crate::error::QueueError;
use crate::model::FetchTask;
use crate::queue::Queue;

/// An in-process FIFO queue. Used by `ticker`/`consumer` when no external
/// broker is configured, and by tests.
pub struct InMemoryQueue {
    tasks: Mutex<VecDeque<FetchTask>>,
    notify: Notify,
    closed: AtomicBool,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn enqueue(&self, task: FetchTask) -> Result<(), QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }
        task.metrics().task_signal("enqueued", None);
        self.tasks.lock().await.push_back(task);
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<FetchTask>, QueueError> {
        loop {
            {
                let mut tasks = self.tasks.lock().await;
                while let Some(task) = tasks.pop_front() {
                    if task.is_expired(Utc::now()) {
                        task.metrics().task_signal("expired", None);
                        tracing::warn!(
                            feed = %task.config.name,
                            tick = %task.tick,
                            "dropping expired fetch task"
                        );
                        continue;
                    }
                    task.metrics().task_signal("executing", None);
                    return Ok(Some(task));
                }
            }
            if self.closed.load(Ordering::SeqCst) {
                return Ok(None);
            }
            self.notify.notified().await;
        }
    }

    async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }
}
