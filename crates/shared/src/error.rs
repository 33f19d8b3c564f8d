//! 统一错误处理模块
//!
//! 定义订单管道中所有共享的错误类型，使用 thiserror 提供良好的错误信息。
//! 生产端错误（格式/解析/校验）会直接拒绝请求，消费端错误只会进入死信或日志。

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum OrderError {
    // ==================== 生产端错误 ====================
    #[error("不支持的内容类型: '{content_type}'")]
    UnsupportedFormat { content_type: String },

    #[error("无效的 {format} 负载: {message}")]
    MalformedPayload { format: String, message: String },

    #[error("参数验证失败: {0}")]
    ValidationFailed(String),

    // ==================== 存储错误 ====================
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("记录已存在: order_id={order_id}")]
    DuplicateKey { order_id: String },

    #[error("记录未找到: order_id={order_id}")]
    NotFound { order_id: String },

    #[error("存储不可用: {0}")]
    StoreUnavailable(String),

    // ==================== 消息通道错误 ====================
    #[error("Kafka 错误: {0}")]
    Kafka(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("死信投递失败: order_id={order_id}, {message}")]
    DeadLetterDeliveryFailed { order_id: String, message: String },

    // ==================== 通用错误 ====================
    #[error("处理订单时发生意外错误: {0}")]
    UnexpectedProcessingFault(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, OrderError>;

impl OrderError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            Self::MalformedPayload { .. } => "MALFORMED_PAYLOAD",
            Self::ValidationFailed(_) => "VALIDATION_FAILED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::DuplicateKey { .. } => "DUPLICATE_KEY",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Kafka(_) => "KAFKA_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::DeadLetterDeliveryFailed { .. } => "DEAD_LETTER_DELIVERY_FAILED",
            Self::UnexpectedProcessingFault(_) => "UNEXPECTED_PROCESSING_FAULT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否由调用方输入导致（生产端直接拒绝，不会进入消息通道）
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat { .. }
                | Self::MalformedPayload { .. }
                | Self::ValidationFailed(_)
        )
    }

    /// 存储层报告的主键冲突，消费端将其视为重复投递
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}
