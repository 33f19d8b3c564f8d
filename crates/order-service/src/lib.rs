//! 订单接入服务
//!
//! 接收 JSON 或 XML 格式的订单负载，归一化为统一的订单模型后
//! 写入 Kafka 订单 topic，交由库存服务异步处理。

pub mod error;
pub mod intake;
pub mod normalizer;
pub mod publisher;

pub use error::IntakeError;
pub use intake::OrderIntake;
pub use normalizer::{PayloadFormat, PayloadNormalizer};
pub use publisher::OrderPublisher;
