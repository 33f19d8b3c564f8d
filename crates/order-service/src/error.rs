//! 订单接入服务错误类型
//!
//! 在共享库 OrderError 基础上区分"请求本身有问题"与"下游发布失败"，
//! 前者由提交方修正后重试，后者由接入方重试。

use order_shared::error::OrderError;

/// 订单提交错误
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    /// 订单已通过解析和校验，但写入订单 topic 失败
    #[error("订单发布失败: order_id={order_id}, {source}")]
    PublishFailed { order_id: String, source: OrderError },

    /// 格式不支持、负载损坏、必填字段缺失
    #[error(transparent)]
    Shared(#[from] OrderError),
}

impl IntakeError {
    /// 是否为提交方可修正的错误
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::PublishFailed { .. } => false,
            Self::Shared(e) => e.is_client_error(),
        }
    }
}
