//! 库存服务
//!
//! 消费订单 topic，在至少一次投递下保证每个订单只持久化一次：
//! 缓存与存储两级判重，存储唯一约束兜底并发重复，失败订单转入死信队列。

pub mod consumer;
pub mod error;
pub mod guard;
pub mod processor;
pub mod query;
pub mod store;

pub use error::InventoryError;
pub use guard::{DuplicateCheck, IdempotencyGuard, OrderCache};
pub use processor::{HandleOutcome, OrderProcessor};
pub use store::{InMemoryProcessedOrderStore, PgProcessedOrderStore, ProcessedOrderStore};
