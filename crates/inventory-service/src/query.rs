//! 已处理订单查询

use order_shared::error::{OrderError, Result};
use order_shared::orders::ProcessedOrder;

use crate::store::ProcessedOrderStore;

/// 按订单 ID 读取处理记录，不存在时返回 `NotFound`
pub async fn get_processed_order(
    store: &dyn ProcessedOrderStore,
    order_id: &str,
) -> Result<ProcessedOrder> {
    store
        .get(order_id)
        .await?
        .ok_or_else(|| OrderError::NotFound {
            order_id: order_id.to_string(),
        })
}
