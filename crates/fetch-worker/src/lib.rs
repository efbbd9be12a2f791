//! transit-fetch-worker: executes one scheduled fetch task (§4.E) and a
//! pool that drains tasks from a `transit-queue::Queue` concurrently.

pub mod error;
pub mod fetch;
pub mod pool;

pub use error::FetchError;
pub use fetch::execute;
pub use pool::WorkerPool;
