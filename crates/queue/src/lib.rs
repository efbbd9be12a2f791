//! transit-queue: the fetch-task broker contract and an in-process
//! implementation used when no external broker is configured.

pub mod error;
pub mod memory;
pub mod model;
pub mod queue;

pub use error::QueueError;
pub use memory::InMemoryQueue;
pub use model::FetchTask;
pub use queue::Queue;
