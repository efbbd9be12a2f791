use async_trait::async_trait;

use crate::error::QueueError;
use crate::model::FetchTask;

/// The task broker collaborator: accepts scheduled fetches and hands them
/// to workers. A real deployment backs this with Redis/huey; this trait
/// models only the contract the rest of the pipeline depends on.
#[async_trait]
pub trait Queue: Send + Sync {
    async fn enqueue(&self, task: FetchTask) -> Result<(), QueueError>;

    /// Pop the next non-expired task. Implementations drop (and signal
    /// `expired` for) any task whose TTL elapsed before it reached the
    /// front of the queue.
    async fn dequeue(&self) -> Result<Option<FetchTask>, QueueError>;

    async fn len(&self) -> usize;
}
