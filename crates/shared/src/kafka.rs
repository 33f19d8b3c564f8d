//! Kafka 基础设施封装
//!
//! 将 rdkafka 的底层 API 封装为业务友好的 Producer/Consumer 抽象，
//! 统一消息序列化、错误映射和优雅关闭语义。
//! 生产端通过 `MessageSink` trait 发送，测试中可替换为内存实现。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Headers, Message};
use rdkafka::producer::{FutureProducer, FutureRecord};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::KafkaConfig;
use crate::error::OrderError;

// ---------------------------------------------------------------------------
// Topic 常量
// ---------------------------------------------------------------------------

/// 集中管理所有 Kafka topic 名称
pub mod topics {
    /// 归一化订单，由订单服务发布、库存服务消费
    pub const ORDERS: &str = "orders.queue";
    /// 库存服务处理失败的订单
    pub const INVENTORY_DLQ: &str = "inventory.dlq";
}

/// 投递元数据中携带重试次数的 header
pub const RETRY_COUNT_HEADER: &str = "x-retry-count";

// ---------------------------------------------------------------------------
// MessageSink: 消息发送抽象
// ---------------------------------------------------------------------------

/// 消息发送抽象
///
/// 发布者和死信 sink 只依赖此 trait，不直接依赖 rdkafka。
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), OrderError>;
}

/// 将值序列化为 JSON 后发送
///
/// 序列化与网络发送拆分为两步，便于独立定位故障原因。
pub async fn send_json<T: Serialize>(
    sink: &dyn MessageSink,
    topic: &str,
    key: &str,
    value: &T,
) -> Result<(), OrderError> {
    let payload = serde_json::to_vec(value)?;
    sink.send(topic, key, &payload).await
}

// ---------------------------------------------------------------------------
// ConsumerMessage
// ---------------------------------------------------------------------------

/// 消费到的 Kafka 消息的统一表示
///
/// 将 rdkafka 的 `BorrowedMessage`（带生命周期约束）转换为拥有所有权的结构体，
/// 使消息可以安全地跨 await 点传递给异步处理函数。
#[derive(Debug, Clone)]
pub struct ConsumerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl ConsumerMessage {
    fn from_borrowed(msg: &BorrowedMessage<'_>) -> Self {
        let key = msg
            .key()
            .and_then(|k| std::str::from_utf8(k).ok())
            .map(String::from);

        let payload = msg.payload().map(|p| p.to_vec()).unwrap_or_default();

        let mut headers = HashMap::new();
        if let Some(h) = msg.headers() {
            for idx in 0..h.count() {
                let header = h.get(idx);
                if let Some(raw) = header.value
                    && let Ok(value) = std::str::from_utf8(raw)
                {
                    headers.insert(header.key.to_string(), value.to_string());
                }
            }
        }

        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key,
            payload,
            headers,
        }
    }

    /// 将 JSON 格式负载反序列化为目标类型
    pub fn deserialize_payload<T: DeserializeOwned>(&self) -> Result<T, OrderError> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| OrderError::Kafka(format!("负载反序列化失败: {e}")))
    }

    /// 投递元数据中的重试次数，header 缺失或无法解析时返回 None
    pub fn retry_count(&self) -> Option<u32> {
        self.headers
            .get(RETRY_COUNT_HEADER)
            .and_then(|v| v.trim().parse().ok())
    }
}

// ---------------------------------------------------------------------------
// KafkaProducer
// ---------------------------------------------------------------------------

/// 面向业务的 Kafka 生产者
///
/// 内部已派生 Clone（`FutureProducer` 本身是 Arc 包装的）。
#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
}

impl KafkaProducer {
    /// 根据配置创建生产者
    ///
    /// `message.timeout.ms` 为 5 秒，超时后由调用方决定拒绝请求或写入死信。
    pub fn new(config: &KafkaConfig) -> Result<Self, OrderError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| OrderError::Kafka(format!("创建生产者失败: {e}")))?;

        info!(brokers = %config.brokers, "Kafka 生产者已初始化");
        Ok(Self { producer })
    }

    /// 发送原始字节消息，返回 (partition, offset)
    pub async fn send_raw(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
    ) -> Result<(i32, i64), OrderError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        let delivery = self
            .producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| OrderError::Kafka(format!("发送消息失败: {e}")))?;

        debug!(
            topic,
            key,
            partition = delivery.partition,
            offset = delivery.offset,
            "消息已发送"
        );
        Ok((delivery.partition, delivery.offset))
    }
}

#[async_trait]
impl MessageSink for KafkaProducer {
    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), OrderError> {
        self.send_raw(topic, key, payload).await.map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// KafkaConsumer
// ---------------------------------------------------------------------------

/// 面向业务的 Kafka 消费者
///
/// 封装 `StreamConsumer` 并提供基于 `watch` channel 的优雅关闭语义。
pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl KafkaConsumer {
    /// 创建消费者，同一服务的多个实例共用 `consumer_group` 分摊分区
    pub fn new(config: &KafkaConfig) -> Result<Self, OrderError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.consumer_group)
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.auto.commit", "true")
            .create()
            .map_err(|e| OrderError::Kafka(format!("创建消费者失败: {e}")))?;

        info!(
            brokers = %config.brokers,
            group_id = %config.consumer_group,
            "Kafka 消费者已初始化"
        );
        Ok(Self { consumer })
    }

    /// 订阅指定的 topic 列表
    pub fn subscribe(&self, topics: &[&str]) -> Result<(), OrderError> {
        self.consumer
            .subscribe(topics)
            .map_err(|e| OrderError::Kafka(format!("订阅 topic 失败: {e}")))?;

        info!(?topics, "已订阅 Kafka topics");
        Ok(())
    }

    /// 启动消费循环
    ///
    /// 使用 `tokio::select!` 同时监听消息流和关闭信号：
    /// - 收到消息时调用 handler 处理；handler 返回错误只记录日志而不中断循环。
    /// - 关闭信号变为 `true` 时退出循环，正在执行的 handler 会先完成。
    pub async fn start<F, Fut>(self, mut shutdown: watch::Receiver<bool>, handler: F)
    where
        F: Fn(ConsumerMessage) -> Fut,
        Fut: std::future::Future<Output = Result<(), OrderError>>,
    {
        use futures::StreamExt;

        let stream = self.consumer.stream();
        futures::pin_mut!(stream);

        info!("Kafka 消费循环已启动");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("收到关闭信号，Kafka 消费循环退出");
                        break;
                    }
                }

                msg_result = stream.next() => {
                    let Some(msg_result) = msg_result else {
                        warn!("Kafka 消息流意外结束");
                        break;
                    };

                    match msg_result {
                        Ok(borrowed_msg) => {
                            let msg = ConsumerMessage::from_borrowed(&borrowed_msg);
                            debug!(
                                topic = %msg.topic,
                                partition = msg.partition,
                                offset = msg.offset,
                                "收到 Kafka 消息"
                            );

                            if let Err(e) = handler(msg).await {
                                error!(error = %e, "处理 Kafka 消息失败");
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "接收 Kafka 消息出错");
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn message_with_headers(headers: HashMap<String, String>) -> ConsumerMessage {
        ConsumerMessage {
            topic: topics::ORDERS.to_string(),
            partition: 0,
            offset: 0,
            key: None,
            payload: Vec::new(),
            headers,
        }
    }

    #[test]
    fn test_topic_constants() {
        assert_eq!(topics::ORDERS, "orders.queue");
        assert_eq!(topics::INVENTORY_DLQ, "inventory.dlq");
        assert_ne!(topics::ORDERS, topics::INVENTORY_DLQ);
    }

    #[test]
    fn test_consumer_message_deserialize() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        #[serde(rename_all = "camelCase")]
        struct Order {
            order_id: String,
        }

        let msg = ConsumerMessage {
            payload: br#"{"orderId":"A1"}"#.to_vec(),
            ..message_with_headers(HashMap::new())
        };

        let order: Order = msg.deserialize_payload().unwrap();
        assert_eq!(
            order,
            Order {
                order_id: "A1".to_string()
            }
        );
    }

    #[test]
    fn test_consumer_message_deserialize_invalid_json() {
        let msg = ConsumerMessage {
            payload: b"not json".to_vec(),
            ..message_with_headers(HashMap::new())
        };

        let result: Result<serde_json::Value, _> = msg.deserialize_payload();
        assert!(matches!(result, Err(OrderError::Kafka(_))));
    }

    #[test]
    fn test_retry_count_header() {
        let msg = message_with_headers(HashMap::from([(
            RETRY_COUNT_HEADER.to_string(),
            "2".to_string(),
        )]));
        assert_eq!(msg.retry_count(), Some(2));

        let msg = message_with_headers(HashMap::from([(
            RETRY_COUNT_HEADER.to_string(),
            "many".to_string(),
        )]));
        assert_eq!(msg.retry_count(), None);

        assert_eq!(message_with_headers(HashMap::new()).retry_count(), None);
    }
}
