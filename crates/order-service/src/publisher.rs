//! 订单发布
//!
//! 把归一化后的订单序列化为 JSON 写入订单 topic，消息 key 为订单 ID，
//! 同一订单的重复提交会落到同一分区，由库存服务按序去重。

use std::sync::Arc;

use order_shared::error::Result;
use order_shared::kafka::{MessageSink, send_json, topics};
use order_shared::observability::metrics::names;
use order_shared::orders::CanonicalOrder;
use tracing::{info, instrument};

pub struct OrderPublisher {
    sink: Arc<dyn MessageSink>,
    topic: String,
}

impl OrderPublisher {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self::with_topic(sink, topics::ORDERS)
    }

    pub fn with_topic(sink: Arc<dyn MessageSink>, topic: impl Into<String>) -> Self {
        Self {
            sink,
            topic: topic.into(),
        }
    }

    /// 发布一条订单，不做去重
    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    pub async fn publish(&self, order: &CanonicalOrder) -> Result<()> {
        send_json(self.sink.as_ref(), &self.topic, &order.order_id, order).await?;

        metrics::counter!(names::ORDERS_PUBLISHED).increment(1);
        info!(
            topic = %self.topic,
            order_type = %order.order_type,
            "订单已发布"
        );
        Ok(())
    }
}
