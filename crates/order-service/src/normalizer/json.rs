//! JSON 负载映射

use order_shared::error::Result;
use order_shared::orders::{CanonicalOrder, DetailValue, OrderDetails};
use serde_json::Value;

use super::{PayloadFormat, malformed};

pub(super) fn normalize(raw_payload: &str) -> Result<CanonicalOrder> {
    let root: Value =
        serde_json::from_str(raw_payload).map_err(|e| malformed(PayloadFormat::Json, e))?;

    Ok(CanonicalOrder {
        order_id: text_field(&root, "orderId"),
        order_type: text_field(&root, "orderType"),
        store_id: text_field(&root, "storeId"),
        details: details(&root),
    })
}

/// 标量字段取其文本形式；缺失、null、对象和数组一律视为空字符串
fn text_field(root: &Value, name: &str) -> String {
    match root.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(scalar @ (Value::Number(_) | Value::Bool(_))) => scalar.to_string(),
        _ => String::new(),
    }
}

/// 只有 `details` 为对象时才展开，其余情况返回空 map
fn details(root: &Value) -> OrderDetails {
    match root.get("details") {
        Some(Value::Object(fields)) => fields
            .iter()
            .map(|(key, value)| (key.clone(), DetailValue::from(value.clone())))
            .collect(),
        _ => OrderDetails::new(),
    }
}
