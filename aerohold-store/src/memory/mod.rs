//! Single-process implementations of the backing stores.
//!
//! Same observable semantics as the Redis and Postgres implementations,
//! for tests and for running the workflow without infrastructure.

mod lock;
mod queue;
mod storage;

pub use lock::MemoryLock;
pub use queue::MemoryQueue;
pub use storage::MemoryStorage;
