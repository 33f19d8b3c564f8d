//! 库存服务错误类型

use order_shared::error::OrderError;

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// 消息无法解码为订单，没有可附加到死信信封的订单内容
    #[error("无法解码订单消息: topic={topic}, partition={partition}, offset={offset}, {reason}")]
    UndecodableMessage {
        topic: String,
        partition: i32,
        offset: i64,
        reason: String,
    },

    #[error(transparent)]
    Shared(#[from] OrderError),
}
