//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

/// 订单管道的指标名称
pub mod names {
    pub const ORDERS_PUBLISHED: &str = "orders_published_total";
    pub const ORDERS_REJECTED: &str = "orders_rejected_total";
    pub const ORDERS_PROCESSED: &str = "orders_processed_total";
    pub const ORDERS_SKIPPED: &str = "orders_skipped_total";
    pub const ORDERS_DEAD_LETTERED: &str = "orders_dead_lettered_total";
    pub const DEAD_LETTER_FAILURES: &str = "dead_letter_failures_total";
    pub const ORDER_MESSAGES_REJECTED: &str = "order_messages_rejected_total";
}

/// 初始化 Prometheus 指标导出
///
/// 导出器自带 HTTP listener，在指定端口暴露 `/metrics`。
pub fn init(service_name: &str, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new().with_http_listener(addr).install()?;

    register_pipeline_metrics(service_name);
    info!("Metrics exporter listening on {}", addr);

    Ok(())
}

/// 注册订单管道指标的 HELP 描述
fn register_pipeline_metrics(service_name: &str) {
    ::metrics::describe_counter!(names::ORDERS_PUBLISHED, "Orders published to the order topic");
    ::metrics::describe_counter!(
        names::ORDERS_REJECTED,
        "Order submissions rejected at the intake boundary"
    );
    ::metrics::describe_counter!(names::ORDERS_PROCESSED, "Orders persisted for the first time");
    ::metrics::describe_counter!(
        names::ORDERS_SKIPPED,
        "Redelivered orders skipped by the idempotency guard"
    );
    ::metrics::describe_counter!(
        names::ORDERS_DEAD_LETTERED,
        "Orders diverted to the dead-letter topic"
    );
    ::metrics::describe_counter!(
        names::DEAD_LETTER_FAILURES,
        "Dead-letter deliveries that failed and were dropped"
    );
    ::metrics::describe_counter!(
        names::ORDER_MESSAGES_REJECTED,
        "Channel messages that could not be decoded into an order"
    );

    ::metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}
