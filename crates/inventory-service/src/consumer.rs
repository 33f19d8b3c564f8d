//! Kafka 订单消费者
//!
//! 从订单 topic 拉取消息，解码后交给 OrderProcessor。
//! 处理结果（包括失败）都不会中断消费循环。

use std::sync::Arc;

use order_shared::config::AppConfig;
use order_shared::kafka::{ConsumerMessage, KafkaConsumer, topics};
use order_shared::observability::metrics::names;
use order_shared::orders::CanonicalOrder;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::InventoryError;
use crate::processor::{HandleOutcome, OrderProcessor};

pub struct InventoryConsumer {
    consumer: KafkaConsumer,
    processor: Arc<OrderProcessor>,
}

impl InventoryConsumer {
    pub fn new(config: &AppConfig, processor: Arc<OrderProcessor>) -> Result<Self, InventoryError> {
        let consumer = KafkaConsumer::new(&config.kafka)?;
        Ok(Self {
            consumer,
            processor,
        })
    }

    /// 启动消费循环，直到收到 shutdown 信号
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), InventoryError> {
        self.consumer.subscribe(&[topics::ORDERS])?;

        info!(topic = topics::ORDERS, "订单消费者已启动");

        let processor = self.processor;

        self.consumer
            .start(shutdown, |msg| {
                let processor = &processor;
                async move {
                    if let Err(e) = handle_message(processor, &msg).await {
                        error!(
                            error = %e,
                            topic = %msg.topic,
                            partition = msg.partition,
                            offset = msg.offset,
                            "订单消息被丢弃"
                        );
                    }
                    Ok(())
                }
            })
            .await;

        info!("订单消费者已停止");
        Ok(())
    }
}

/// 处理单条消息：解码 -> 交给处理器
///
/// 只有解码失败会返回错误，处理器的结果原样返回。
pub async fn handle_message(
    processor: &OrderProcessor,
    msg: &ConsumerMessage,
) -> Result<HandleOutcome, InventoryError> {
    let order: CanonicalOrder = msg.deserialize_payload().map_err(|e| {
        metrics::counter!(names::ORDER_MESSAGES_REJECTED).increment(1);
        warn!(error = %e, key = ?msg.key, "订单消息解码失败");
        InventoryError::UndecodableMessage {
            topic: msg.topic.clone(),
            partition: msg.partition,
            offset: msg.offset,
            reason: e.to_string(),
        }
    })?;

    info!(
        order_id = %order.order_id,
        order_type = %order.order_type,
        "收到订单"
    );

    Ok(processor
        .handle_with_retry_count(&order, msg.retry_count())
        .await)
}
