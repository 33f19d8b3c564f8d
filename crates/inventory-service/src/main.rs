//! 库存服务
//!
//! 连接 PostgreSQL 并执行迁移，按配置启动若干同组消费者，Ctrl+C 后优雅退出。

use std::sync::Arc;

use anyhow::Result;
use inventory_service::consumer::InventoryConsumer;
use inventory_service::{OrderCache, OrderProcessor, PgProcessedOrderStore};
use order_shared::config::AppConfig;
use order_shared::database::Database;
use order_shared::dlq::DeadLetterSink;
use order_shared::kafka::KafkaProducer;
use order_shared::observability;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load("inventory-service").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {e}");
        AppConfig::default()
    });

    observability::init("inventory-service", &config.observability)?;
    info!(environment = %config.environment, "Starting inventory-service...");

    let db = Database::connect(&config.database).await?;
    db.run_migrations(&sqlx::migrate!("./migrations")).await?;
    db.health_check().await?;

    let store = Arc::new(PgProcessedOrderStore::new(db.pool().clone()));
    let producer = KafkaProducer::new(&config.kafka)?;
    let processor = Arc::new(
        OrderProcessor::new(
            store,
            OrderCache::from_config(&config.idempotency),
            DeadLetterSink::new(Arc::new(producer)),
        )
        .with_default_retry_count(config.dead_letter.default_retry_count),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let workers = config.inventory.workers.max(1);
    let mut handles = Vec::with_capacity(workers);

    for worker in 0..workers {
        let consumer = InventoryConsumer::new(&config, processor.clone())?;
        let shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = consumer.run(shutdown).await {
                error!(worker, error = %e, "消费者异常退出");
            }
        }));
    }
    info!(workers, "Inventory consumers started");

    signal::ctrl_c().await?;
    info!("Shutdown signal received");
    shutdown_tx.send(true)?;

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "消费者任务 join 失败");
        }
    }

    db.close().await;
    info!("inventory-service stopped");
    Ok(())
}
