//! 幂等守卫
//!
//! 两级判重：先查进程内的有界 TTL 缓存，未命中再查持久化存储，
//! 存储命中时回写缓存，后续同一订单的检查不再访问存储。

use std::sync::Arc;
use std::time::Duration;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tracing::debug;

use order_shared::config::IdempotencyConfig;
use order_shared::error::Result;

use crate::store::ProcessedOrderStore;

/// 已处理订单 ID 缓存
///
/// 容量满时按最近最少使用淘汰，条目写入后经过 TTL 自动过期。
#[derive(Clone)]
pub struct OrderCache {
    inner: Cache<String, ()>,
}

impl OrderCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self { inner }
    }

    pub fn from_config(config: &IdempotencyConfig) -> Self {
        Self::new(config.cache_capacity, config.cache_ttl())
    }

    pub fn contains(&self, order_id: &str) -> bool {
        self.inner.get(order_id).is_some()
    }

    pub fn insert(&self, order_id: &str) {
        self.inner.insert(order_id.to_string(), ());
    }

    /// 近似条目数，执行挂起的维护任务后才准确
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

/// 判重结果，命中来源只用于日志和指标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateCheck {
    CacheHit,
    StoreHit,
    Fresh,
}

impl DuplicateCheck {
    pub fn is_duplicate(&self) -> bool {
        !matches!(self, Self::Fresh)
    }
}

pub struct IdempotencyGuard {
    cache: OrderCache,
    store: Arc<dyn ProcessedOrderStore>,
}

impl IdempotencyGuard {
    pub fn new(cache: OrderCache, store: Arc<dyn ProcessedOrderStore>) -> Self {
        Self { cache, store }
    }

    pub async fn check(&self, order_id: &str) -> Result<DuplicateCheck> {
        if self.cache.contains(order_id) {
            debug!(order_id, "缓存命中，订单已处理");
            return Ok(DuplicateCheck::CacheHit);
        }

        if self.store.exists(order_id).await? {
            debug!(order_id, "存储命中，回写缓存");
            self.cache.insert(order_id);
            return Ok(DuplicateCheck::StoreHit);
        }

        Ok(DuplicateCheck::Fresh)
    }

    pub async fn is_duplicate(&self, order_id: &str) -> Result<bool> {
        Ok(self.check(order_id).await?.is_duplicate())
    }

    /// 成功持久化后记入缓存
    pub fn remember(&self, order_id: &str) {
        self.cache.insert(order_id);
    }

    pub fn cache(&self) -> &OrderCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryProcessedOrderStore, MockProcessedOrderStore};
    use chrono::Utc;
    use order_shared::error::OrderError;
    use order_shared::orders::ProcessedOrder;

    fn cache() -> OrderCache {
        OrderCache::new(100, Duration::from_secs(600))
    }

    #[tokio::test]
    async fn test_fresh_order() {
        let guard = IdempotencyGuard::new(cache(), Arc::new(InMemoryProcessedOrderStore::new()));

        assert_eq!(guard.check("A1").await.unwrap(), DuplicateCheck::Fresh);
        assert!(!guard.is_duplicate("A1").await.unwrap());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_store() {
        let mut store = MockProcessedOrderStore::new();
        store.expect_exists().never();

        let guard = IdempotencyGuard::new(cache(), Arc::new(store));
        guard.remember("A1");

        assert_eq!(guard.check("A1").await.unwrap(), DuplicateCheck::CacheHit);
    }

    #[tokio::test]
    async fn test_store_hit_writes_back_to_cache() {
        let mut store = MockProcessedOrderStore::new();
        store
            .expect_exists()
            .withf(|id| id == "A1")
            .times(1)
            .returning(|_| Ok(true));

        let guard = IdempotencyGuard::new(cache(), Arc::new(store));

        assert_eq!(guard.check("A1").await.unwrap(), DuplicateCheck::StoreHit);
        // 第二次由缓存应答，mock 限定 exists 只调用一次
        assert_eq!(guard.check("A1").await.unwrap(), DuplicateCheck::CacheHit);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let mut store = MockProcessedOrderStore::new();
        store
            .expect_exists()
            .returning(|_| Err(OrderError::StoreUnavailable("timeout".to_string())));

        let guard = IdempotencyGuard::new(cache(), Arc::new(store));

        assert!(matches!(
            guard.is_duplicate("A1").await,
            Err(OrderError::StoreUnavailable(_))
        ));
        assert!(!guard.cache().contains("A1"));
    }

    #[tokio::test]
    async fn test_existing_row_detected() {
        let store = Arc::new(InMemoryProcessedOrderStore::new());
        store
            .create(&ProcessedOrder {
                order_id: "A1".to_string(),
                order_type: "digital".to_string(),
                store_id: String::new(),
                processed_at: Utc::now(),
            })
            .await
            .unwrap();

        let guard = IdempotencyGuard::new(cache(), store);
        assert!(guard.is_duplicate("A1").await.unwrap());
    }

    #[test]
    fn test_cache_expires_after_ttl() {
        let cache = OrderCache::new(100, Duration::from_millis(50));
        cache.insert("A1");
        assert!(cache.contains("A1"));

        std::thread::sleep(Duration::from_millis(120));
        assert!(!cache.contains("A1"));
    }

    #[test]
    fn test_cache_is_bounded() {
        let cache = OrderCache::new(10, Duration::from_secs(600));
        for i in 0..100 {
            cache.insert(&format!("order-{i}"));
        }

        assert!(cache.entry_count() <= 10);
    }

    #[test]
    fn test_default_config_cache() {
        let cache = OrderCache::from_config(&IdempotencyConfig::default());
        cache.insert("A1");
        assert!(cache.contains("A1"));
    }
}
