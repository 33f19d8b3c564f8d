//! 订单负载归一化
//!
//! 上游以 JSON 或 XML 提交订单，两种格式的字段路径不同：
//! - JSON：顶层 `orderId` / `orderType` / `storeId`，`details` 对象逐键映射
//! - XML：`Header` 下的 `Id` / `Type` / `Location`，兄弟节点 `Details` 的子元素逐个映射
//!
//! 归一化只做结构解析，缺失字段取空字符串；必填校验在发布前单独进行。

mod json;
mod xml;

use order_shared::error::{OrderError, Result};
use order_shared::orders::CanonicalOrder;
use tracing::debug;

/// 负载格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    Xml,
}

impl PayloadFormat {
    /// 根据 Content-Type 判断负载格式
    ///
    /// 大小写不敏感的子串匹配，可覆盖 `application/json; charset=utf-8`、
    /// `text/xml`、`application/vnd.order+json` 等写法。
    pub fn detect(content_type: &str) -> Result<Self> {
        let lowered = content_type.trim().to_ascii_lowercase();

        if lowered.contains("json") {
            Ok(Self::Json)
        } else if lowered.contains("xml") {
            Ok(Self::Xml)
        } else {
            Err(OrderError::UnsupportedFormat {
                content_type: content_type.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Xml => "XML",
        }
    }
}

impl std::fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 负载归一化器，无状态
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadNormalizer;

impl PayloadNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// 将原始负载解析为 `CanonicalOrder`
    ///
    /// - Content-Type 为空或无法识别 -> `UnsupportedFormat`
    /// - 文档结构损坏 -> `MalformedPayload`
    pub fn normalize(&self, raw_payload: &str, content_type: &str) -> Result<CanonicalOrder> {
        let format = PayloadFormat::detect(content_type)?;
        debug!(%format, payload_len = raw_payload.len(), "开始归一化订单负载");

        match format {
            PayloadFormat::Json => json::normalize(raw_payload),
            PayloadFormat::Xml => xml::normalize(raw_payload),
        }
    }
}

pub(crate) fn malformed(format: PayloadFormat, message: impl std::fmt::Display) -> OrderError {
    OrderError::MalformedPayload {
        format: format.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_shared::orders::DetailValue;

    #[test]
    fn test_detect_format() {
        assert_eq!(
            PayloadFormat::detect("application/json").unwrap(),
            PayloadFormat::Json
        );
        assert_eq!(
            PayloadFormat::detect("Application/JSON; charset=UTF-8").unwrap(),
            PayloadFormat::Json
        );
        assert_eq!(
            PayloadFormat::detect("application/xml").unwrap(),
            PayloadFormat::Xml
        );
        assert_eq!(PayloadFormat::detect("text/xml").unwrap(), PayloadFormat::Xml);
    }

    #[test]
    fn test_unsupported_content_types() {
        let normalizer = PayloadNormalizer::new();
        let payload = r#"{"orderId":"A1","orderType":"digital"}"#;

        for content_type in ["", "   ", "text/plain", "application/octet-stream"] {
            let err = normalizer.normalize(payload, content_type).unwrap_err();
            assert!(
                matches!(err, OrderError::UnsupportedFormat { .. }),
                "content type {content_type:?} should be unsupported, got {err:?}"
            );
        }
    }

    #[test]
    fn test_malformed_json() {
        let err = PayloadNormalizer::new()
            .normalize("{bad json", "application/json")
            .unwrap_err();
        assert!(matches!(err, OrderError::MalformedPayload { ref format, .. } if format == "JSON"));
    }

    #[test]
    fn test_malformed_xml() {
        let err = PayloadNormalizer::new()
            .normalize("<Order><Header></Order>", "application/xml")
            .unwrap_err();
        assert!(matches!(err, OrderError::MalformedPayload { ref format, .. } if format == "XML"));
    }

    #[test]
    fn test_scenario_json_payload() {
        let order = PayloadNormalizer::new()
            .normalize(
                r#"{"orderId":"A1","orderType":"digital","storeId":"S1","details":{"qty":2}}"#,
                "application/json",
            )
            .unwrap();

        assert_eq!(order.order_id, "A1");
        assert_eq!(order.order_type, "digital");
        assert_eq!(order.store_id, "S1");
        assert_eq!(order.details.len(), 1);
        assert_eq!(order.details["qty"], DetailValue::from(2));
    }

    #[test]
    fn test_json_and_xml_agree_on_identifying_fields() {
        let normalizer = PayloadNormalizer::new();
        let from_json = normalizer
            .normalize(
                r#"{"orderId":"B7","orderType":"in-store","storeId":"Store123"}"#,
                "application/json",
            )
            .unwrap();
        let from_xml = normalizer
            .normalize(
                "<Order><Header><Id>B7</Id><Type>in-store</Type><Location>Store123</Location></Header></Order>",
                "application/xml",
            )
            .unwrap();

        assert_eq!(from_json, from_xml);
    }
}
