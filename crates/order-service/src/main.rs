//! 订单接入服务
//!
//! 从标准输入读取一条原始订单负载，按命令行给出的 Content-Type 归一化后发布。
//!
//! ```text
//! order-service application/xml < order.xml
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use order_service::OrderIntake;
use order_shared::config::AppConfig;
use order_shared::kafka::KafkaProducer;
use order_shared::observability;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load("order-service").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {e}");
        AppConfig::default()
    });

    observability::init("order-service", &config.observability)?;
    info!(environment = %config.environment, "Starting order-service...");

    let content_type = std::env::args()
        .nth(1)
        .context("用法: order-service <content-type> < payload")?;

    let mut raw_payload = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw_payload)
        .await
        .context("读取标准输入失败")?;

    let producer = KafkaProducer::new(&config.kafka)?;
    let intake = OrderIntake::new(Arc::new(producer));

    match intake.submit(&raw_payload, &content_type).await {
        Ok(order) => {
            println!("{}", serde_json::to_string(&order)?);
            Ok(())
        }
        Err(e) if e.is_client_error() => {
            warn!(error = %e, "订单负载无效");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}
