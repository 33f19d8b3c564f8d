//! 共享库
//!
//! 包含订单服务与库存服务共用的订单模型、配置、错误处理、数据库连接、
//! Kafka 消息通道、死信队列以及可观测性等基础设施代码。

pub mod config;
pub mod database;
pub mod dlq;
pub mod error;
pub mod kafka;
pub mod observability;
pub mod orders;
pub mod test_utils;
