//! PostgreSQL 连接池
//!
//! 库存服务只有一张已处理订单表，连接池在启动时建立、执行嵌入的迁移并探活，
//! 退出时关闭。连接层面的故障统一归类为 `StoreUnavailable`。

use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument};

use crate::config::DatabaseConfig;
use crate::error::{OrderError, Result};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    #[instrument(skip(config))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(classify_error)?;

        info!(
            max_connections = config.max_connections,
            "订单库连接池已建立"
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 执行服务自带的迁移脚本
    pub async fn run_migrations(&self, migrator: &Migrator) -> Result<()> {
        migrator
            .run(&self.pool)
            .await
            .map_err(|e| OrderError::StoreUnavailable(format!("数据库迁移失败: {e}")))?;

        info!(migrations = migrator.iter().count(), "数据库迁移完成");
        Ok(())
    }

    /// 启动探活，失败说明库不可用
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(classify_error)?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("订单库连接池已关闭");
    }
}

/// 超时、连接池关闭和网络 IO 错误归为存储不可用，其余保留原始数据库错误
pub fn classify_error(e: sqlx::Error) -> OrderError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            OrderError::StoreUnavailable(e.to_string())
        }
        other => OrderError::Database(other),
    }
}
