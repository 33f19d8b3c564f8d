//! 订单模型
//!
//! 定义订单管道中所有组件共享的数据结构：
//! - `CanonicalOrder`：JSON / XML 负载归一化后的统一表示，也是消息通道上的载荷
//! - `ProcessedOrder`：库存服务持久化的已处理记录，按 `order_id` 唯一
//! - `DeadLetterEntry`：处理失败时发往死信 topic 的诊断信封

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OrderError, Result};

// ---------------------------------------------------------------------------
// DetailValue: 订单附加信息的动态值
// ---------------------------------------------------------------------------

/// 订单 `details` 中的单个值
///
/// 上游系统的附加信息没有固定结构，这里用带标签的枚举表达
/// 字符串 / 数字 / 布尔 / 嵌套映射 / 序列，保留原始 JSON 类型。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<DetailValue>),
    Map(BTreeMap<String, DetailValue>),
}

impl DetailValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for DetailValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for DetailValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for DetailValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for DetailValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<i32> for DetailValue {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<f64> for DetailValue {
    /// NaN 与无穷大无法用 JSON 数字表示，退化为 Null
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl From<bool> for DetailValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// 订单附加信息，键无序
pub type OrderDetails = BTreeMap<String, DetailValue>;

// ---------------------------------------------------------------------------
// CanonicalOrder: 归一化订单
// ---------------------------------------------------------------------------

/// 归一化订单
///
/// 无论上游以何种格式提交，进入系统后都以此结构流转。
/// `order_id` 是全局唯一的业务主键，所有幂等判断都基于它。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalOrder {
    pub order_id: String,
    /// 订单类型，如 digital、in-store
    pub order_type: String,
    #[serde(default)]
    pub store_id: String,
    #[serde(default)]
    pub details: OrderDetails,
}

impl CanonicalOrder {
    pub fn new(
        order_id: impl Into<String>,
        order_type: impl Into<String>,
        store_id: impl Into<String>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            order_type: order_type.into(),
            store_id: store_id.into(),
            details: OrderDetails::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<DetailValue>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// 发布前的必填字段校验
    ///
    /// 只在生产端边界执行一次，消费端不再重复校验。
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.order_id.is_empty() {
            missing.push("orderId");
        }
        if self.order_type.is_empty() {
            missing.push("orderType");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(OrderError::ValidationFailed(format!(
                "缺少必填字段: {}",
                missing.join(", ")
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessedOrder: 已处理订单记录
// ---------------------------------------------------------------------------

/// 已处理订单的持久化形式
///
/// 创建后不可修改；同一 `order_id` 只会存在一条记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedOrder {
    pub order_id: String,
    pub order_type: String,
    pub store_id: String,
    pub processed_at: DateTime<Utc>,
}

impl ProcessedOrder {
    pub fn from_order(order: &CanonicalOrder, processed_at: DateTime<Utc>) -> Self {
        Self {
            order_id: order.order_id.clone(),
            order_type: order.order_type.clone(),
            store_id: order.store_id.clone(),
            processed_at,
        }
    }
}

// ---------------------------------------------------------------------------
// DeadLetterEntry: 死信信封
// ---------------------------------------------------------------------------

/// 死信信封
///
/// 包装原始订单并附加失败原因和重试次数，供人工排查。
/// 对本管道而言只写不读。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterEntry {
    pub original_order: CanonicalOrder,
    pub error_message: String,
    pub failed_at: DateTime<Utc>,
    pub retry_count: u32,
}

impl DeadLetterEntry {
    pub fn new(
        original_order: CanonicalOrder,
        error_message: impl Into<String>,
        retry_count: u32,
    ) -> Self {
        Self {
            original_order,
            error_message: error_message.into(),
            failed_at: Utc::now(),
            retry_count,
        }
    }
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------
