//! 订单处理器
//!
//! 每条投递到达后依次经过：判重 -> 持久化 -> 记入缓存。
//! 重复订单静默跳过；任何故障（包括存储层 panic）都转入死信队列，
//! 处理器本身从不向消费循环返回错误，消息通道不会因处理失败而重投。
//!
//! 并发投递同一订单时，两次判重可能同时返回"未处理"，
//! 此时由存储的唯一约束裁决，落败一方收到 `DuplicateKey` 并按跳过处理。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tracing::{error, info, instrument};

use order_shared::dlq::DeadLetterSink;
use order_shared::error::{OrderError, Result};
use order_shared::observability::metrics::names;
use order_shared::orders::{CanonicalOrder, ProcessedOrder};

use crate::guard::{DuplicateCheck, IdempotencyGuard, OrderCache};
use crate::store::ProcessedOrderStore;

/// 未提供投递元数据时写入死信信封的重试次数
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// 单条订单的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// 首次处理并已持久化
    Processed,
    /// 已处理过，本次跳过
    Duplicate,
    /// 处理失败；`dead_lettered` 表示死信投递是否成功
    Failed { dead_lettered: bool },
}

/// 跳过原因，仅用于指标标签
#[derive(Debug, Clone, Copy)]
enum SkipSource {
    Cache,
    Store,
    Conflict,
}

impl SkipSource {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Store => "store",
            Self::Conflict => "conflict",
        }
    }
}

enum Step {
    Persisted,
    Skipped(SkipSource),
}

pub struct OrderProcessor {
    guard: IdempotencyGuard,
    store: Arc<dyn ProcessedOrderStore>,
    dead_letter: DeadLetterSink,
    default_retry_count: u32,
}

impl OrderProcessor {
    pub fn new(
        store: Arc<dyn ProcessedOrderStore>,
        cache: OrderCache,
        dead_letter: DeadLetterSink,
    ) -> Self {
        Self {
            guard: IdempotencyGuard::new(cache, store.clone()),
            store,
            dead_letter,
            default_retry_count: DEFAULT_RETRY_COUNT,
        }
    }

    pub fn with_default_retry_count(mut self, retry_count: u32) -> Self {
        self.default_retry_count = retry_count;
        self
    }

    pub fn guard(&self) -> &IdempotencyGuard {
        &self.guard
    }

    pub async fn handle(&self, order: &CanonicalOrder) -> HandleOutcome {
        self.handle_with_retry_count(order, None).await
    }

    /// 处理一条订单；`retry_count` 来自投递元数据，缺失时使用默认值
    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    pub async fn handle_with_retry_count(
        &self,
        order: &CanonicalOrder,
        retry_count: Option<u32>,
    ) -> HandleOutcome {
        let result = AssertUnwindSafe(self.process(order))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(OrderError::UnexpectedProcessingFault(panic_message(
                    panic.as_ref(),
                )))
            });

        match result {
            Ok(Step::Persisted) => {
                metrics::counter!(names::ORDERS_PROCESSED).increment(1);
                info!(
                    order_type = %order.order_type,
                    store_id = %order.store_id,
                    "订单处理完成"
                );
                HandleOutcome::Processed
            }
            Ok(Step::Skipped(source)) => {
                metrics::counter!(names::ORDERS_SKIPPED, "source" => source.as_str())
                    .increment(1);
                info!(source = source.as_str(), "订单已处理过，跳过");
                HandleOutcome::Duplicate
            }
            Err(e) => {
                let retry_count = retry_count.unwrap_or(self.default_retry_count);
                self.divert(order, &e, retry_count).await
            }
        }
    }

    async fn process(&self, order: &CanonicalOrder) -> Result<Step> {
        match self.guard.check(&order.order_id).await? {
            DuplicateCheck::CacheHit => return Ok(Step::Skipped(SkipSource::Cache)),
            DuplicateCheck::StoreHit => return Ok(Step::Skipped(SkipSource::Store)),
            DuplicateCheck::Fresh => {}
        }

        let processed = ProcessedOrder::from_order(order, Utc::now());

        match self.store.create(&processed).await {
            Ok(()) => {
                self.guard.remember(&order.order_id);
                Ok(Step::Persisted)
            }
            // 并发投递的另一方已写入
            Err(e) if e.is_duplicate_key() => {
                self.guard.remember(&order.order_id);
                Ok(Step::Skipped(SkipSource::Conflict))
            }
            Err(e) => Err(e),
        }
    }

    async fn divert(
        &self,
        order: &CanonicalOrder,
        error: &OrderError,
        retry_count: u32,
    ) -> HandleOutcome {
        error!(
            error = %error,
            code = error.code(),
            retry_count,
            "订单处理失败，转入死信队列"
        );

        match self.dead_letter.send(order, error, retry_count).await {
            Ok(_) => {
                metrics::counter!(names::ORDERS_DEAD_LETTERED).increment(1);
                HandleOutcome::Failed {
                    dead_lettered: true,
                }
            }
            // 死信投递失败已在 sink 内记录
            Err(_) => HandleOutcome::Failed {
                dead_lettered: false,
            },
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
