//! 死信队列
//!
//! 订单处理失败时，消费端把原始订单连同失败原因包装成 `DeadLetterEntry`
//! 写入独立的死信 topic，而不是丢弃或让消费循环崩溃。
//! 死信投递本身失败时没有下一级兜底，只记录日志并把错误返回给调用方。

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::OrderError;
use crate::kafka::{MessageSink, send_json, topics};
use crate::observability::metrics::names;
use crate::orders::{CanonicalOrder, DeadLetterEntry};

/// 死信 sink
pub struct DeadLetterSink {
    sink: Arc<dyn MessageSink>,
    topic: String,
}

impl DeadLetterSink {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self::with_topic(sink, topics::INVENTORY_DLQ)
    }

    pub fn with_topic(sink: Arc<dyn MessageSink>, topic: impl Into<String>) -> Self {
        Self {
            sink,
            topic: topic.into(),
        }
    }

    /// 构造死信信封并发送
    ///
    /// 成功时返回已发送的信封；失败时返回 `DeadLetterDeliveryFailed`，
    /// 该消息就此丢失，调用方只需记录，不应再向上传播。
    pub async fn send(
        &self,
        order: &CanonicalOrder,
        error: &OrderError,
        retry_count: u32,
    ) -> Result<DeadLetterEntry, OrderError> {
        warn!(
            order_id = %order.order_id,
            reason = %error,
            "发送失败订单到死信队列"
        );

        let entry = DeadLetterEntry::new(order.clone(), error.to_string(), retry_count);

        match send_json(self.sink.as_ref(), &self.topic, &order.order_id, &entry).await {
            Ok(()) => {
                info!(
                    order_id = %order.order_id,
                    topic = %self.topic,
                    retry_count,
                    "订单已发送到死信队列"
                );
                Ok(entry)
            }
            Err(dlq_error) => {
                error!(
                    order_id = %order.order_id,
                    topic = %self.topic,
                    original_error = %error,
                    dlq_error = %dlq_error,
                    "发送到死信队列失败，消息丢失"
                );
                metrics::counter!(names::DEAD_LETTER_FAILURES).increment(1);

                Err(OrderError::DeadLetterDeliveryFailed {
                    order_id: order.order_id.clone(),
                    message: dlq_error.to_string(),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingSink;

    #[tokio::test]
    async fn test_send_builds_entry_on_dlq_topic() {
        let sink = Arc::new(RecordingSink::new());
        let dlq = DeadLetterSink::new(sink.clone());
        let order = CanonicalOrder::new("A1", "digital", "S1").with_detail("qty", 2);
        let error = OrderError::StoreUnavailable("连接池耗尽".to_string());

        let entry = dlq.send(&order, &error, 3).await.unwrap();

        assert_eq!(entry.original_order, order);
        assert_eq!(entry.error_message, error.to_string());
        assert_eq!(entry.retry_count, 3);

        let sent = sink.messages_for(topics::INVENTORY_DLQ);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].key, "A1");

        let decoded: DeadLetterEntry = sent[0].decode().unwrap();
        assert_eq!(decoded, entry);
    }

    #[tokio::test]
    async fn test_send_failure_is_reported_not_panicking() {
        let sink = Arc::new(RecordingSink::new());
        sink.set_failing(true);
        let dlq = DeadLetterSink::new(sink.clone());
        let order = CanonicalOrder::new("A2", "digital", "S1");

        let result = dlq
            .send(&order, &OrderError::Internal("boom".to_string()), 0)
            .await;

        assert!(matches!(
            result,
            Err(OrderError::DeadLetterDeliveryFailed { ref order_id, .. }) if order_id == "A2"
        ));
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_custom_topic() {
        let sink = Arc::new(RecordingSink::new());
        let dlq = DeadLetterSink::with_topic(sink.clone(), "custom.dlq");

        dlq.send(
            &CanonicalOrder::new("A3", "digital", ""),
            &OrderError::Internal("x".to_string()),
            1,
        )
        .await
        .unwrap();

        assert_eq!(sink.messages_for("custom.dlq").len(), 1);
        assert!(sink.messages_for(topics::INVENTORY_DLQ).is_empty());
    }
}
