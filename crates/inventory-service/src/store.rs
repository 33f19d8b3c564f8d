//! 已处理订单存储
//!
//! 存储只提供按订单 ID 的读取和原子创建，记录一经写入不再修改或删除。
//! `create` 在记录已存在时返回 `DuplicateKey`，这是并发重复投递下
//! 唯一可靠的去重依据，读侧检查只用于减少写入。

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sqlx::PgPool;
use tracing::{debug, instrument};

use order_shared::database::classify_error;
use order_shared::error::{OrderError, Result};
use order_shared::orders::ProcessedOrder;

/// 已处理订单存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessedOrderStore: Send + Sync {
    async fn exists(&self, order_id: &str) -> Result<bool>;

    async fn get(&self, order_id: &str) -> Result<Option<ProcessedOrder>>;

    /// 原子创建；同一订单 ID 已存在时返回 `DuplicateKey`
    async fn create(&self, order: &ProcessedOrder) -> Result<()>;
}

// ==================== PostgreSQL ====================

/// PostgreSQL 实现，依赖 `processed_orders.order_id` 主键约束
pub struct PgProcessedOrderStore {
    pool: PgPool,
}

impl PgProcessedOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProcessedOrderStore for PgProcessedOrderStore {
    async fn exists(&self, order_id: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS(SELECT 1 FROM processed_orders WHERE order_id = $1)"#,
        )
        .bind(order_id)
        .fetch_one(&self.pool)
        .await
        .map_err(classify_error)?;

        Ok(exists)
    }

    async fn get(&self, order_id: &str) -> Result<Option<ProcessedOrder>> {
        let order = sqlx::query_as::<_, ProcessedOrder>(
            r#"
            SELECT order_id, order_type, store_id, processed_at
            FROM processed_orders
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_error)?;

        Ok(order)
    }

    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    async fn create(&self, order: &ProcessedOrder) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_orders (order_id, order_type, store_id, processed_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (order_id) DO NOTHING
            "#,
        )
        .bind(&order.order_id)
        .bind(&order.order_type)
        .bind(&order.store_id)
        .bind(order.processed_at)
        .execute(&self.pool)
        .await
        .map_err(classify_error)?;

        if result.rows_affected() == 0 {
            debug!("订单记录已存在");
            return Err(OrderError::DuplicateKey {
                order_id: order.order_id.clone(),
            });
        }

        Ok(())
    }
}

// ==================== 内存实现 ====================

/// 基于 DashMap 的内存存储，用于测试和本地运行
///
/// entry API 在分片锁内完成"检查并插入"，与数据库主键约束语义一致。
#[derive(Default)]
pub struct InMemoryProcessedOrderStore {
    orders: DashMap<String, ProcessedOrder>,
}

impl InMemoryProcessedOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[async_trait]
impl ProcessedOrderStore for InMemoryProcessedOrderStore {
    async fn exists(&self, order_id: &str) -> Result<bool> {
        Ok(self.orders.contains_key(order_id))
    }

    async fn get(&self, order_id: &str) -> Result<Option<ProcessedOrder>> {
        Ok(self.orders.get(order_id).map(|entry| entry.value().clone()))
    }

    async fn create(&self, order: &ProcessedOrder) -> Result<()> {
        match self.orders.entry(order.order_id.clone()) {
            Entry::Occupied(_) => Err(OrderError::DuplicateKey {
                order_id: order.order_id.clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(order.clone());
                Ok(())
            }
        }
    }
}
