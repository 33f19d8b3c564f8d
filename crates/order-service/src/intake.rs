//! 订单提交入口
//!
//! 流程：识别格式 -> 归一化 -> 必填校验 -> 发布。
//! 任何一步失败都不会产生 topic 消息。

use std::sync::Arc;

use order_shared::kafka::MessageSink;
use order_shared::observability::metrics::names;
use order_shared::orders::CanonicalOrder;
use tracing::{info, warn};

use crate::error::IntakeError;
use crate::normalizer::PayloadNormalizer;
use crate::publisher::OrderPublisher;

pub struct OrderIntake {
    normalizer: PayloadNormalizer,
    publisher: OrderPublisher,
}

impl OrderIntake {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self::with_publisher(OrderPublisher::new(sink))
    }

    pub fn with_publisher(publisher: OrderPublisher) -> Self {
        Self {
            normalizer: PayloadNormalizer::new(),
            publisher,
        }
    }

    /// 接收一条原始订单并发布，返回发布出去的规范订单
    pub async fn submit(
        &self,
        raw_payload: &str,
        content_type: &str,
    ) -> Result<CanonicalOrder, IntakeError> {
        let order = self
            .normalizer
            .normalize(raw_payload, content_type)
            .and_then(|order| order.validate().map(|()| order))
            .inspect_err(|e| {
                metrics::counter!(names::ORDERS_REJECTED).increment(1);
                warn!(content_type, error = %e, "订单被拒绝");
            })?;

        self.publisher
            .publish(&order)
            .await
            .map_err(|source| IntakeError::PublishFailed {
                order_id: order.order_id.clone(),
                source,
            })?;

        info!(order_id = %order.order_id, "订单已受理");
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_shared::error::OrderError;
    use order_shared::kafka::topics;
    use order_shared::test_utils::{RecordingSink, TestOrders};

    fn intake() -> (Arc<RecordingSink>, OrderIntake) {
        let sink = Arc::new(RecordingSink::new());
        (sink.clone(), OrderIntake::new(sink))
    }

    #[tokio::test]
    async fn test_submit_json() {
        let (sink, intake) = intake();
        let raw = TestOrders::json_payload("A1", "digital", "S1");

        let order = intake.submit(&raw, "application/json").await.unwrap();

        assert_eq!(order.order_id, "A1");
        let sent = sink.messages_for(topics::ORDERS);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].decode::<CanonicalOrder>().unwrap(), order);
    }

    #[tokio::test]
    async fn test_missing_order_id_is_rejected_without_publishing() {
        let (sink, intake) = intake();
        let raw = TestOrders::json_payload("", "digital", "S1");

        let err = intake.submit(&raw, "application/json").await.unwrap_err();

        assert!(matches!(
            err,
            IntakeError::Shared(OrderError::ValidationFailed(_))
        ));
        assert!(err.is_client_error());
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_format_is_rejected() {
        let (sink, intake) = intake();

        let err = intake.submit("orderId=A1", "text/plain").await.unwrap_err();

        assert!(matches!(
            err,
            IntakeError::Shared(OrderError::UnsupportedFormat { .. })
        ));
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_is_server_side() {
        let (sink, intake) = intake();
        sink.set_failing(true);
        let raw = TestOrders::xml_payload("B7", "in-store", "Store123");

        let err = intake.submit(&raw, "application/xml").await.unwrap_err();

        assert!(matches!(err, IntakeError::PublishFailed { ref order_id, .. } if order_id == "B7"));
        assert!(!err.is_client_error());
    }
}
