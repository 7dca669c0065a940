pub mod app_config;
pub mod database;
pub mod memory;
pub mod redis_lock;
pub mod redis_queue;
pub mod redis_repo;
pub mod storage_repo;

pub use database::DbClient;
pub use memory::{MemoryLock, MemoryQueue, MemoryStorage};
pub use redis_lock::RedisLock;
pub use redis_queue::RedisQueue;
pub use redis_repo::RedisClient;
pub use storage_repo::PgStorage;
