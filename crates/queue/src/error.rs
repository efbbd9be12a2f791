use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,
}
