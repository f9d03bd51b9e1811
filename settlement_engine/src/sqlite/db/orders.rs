use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderStatusType},
    traits::{AccountApiError, SettlementError},
};

pub(crate) async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, SettlementError> {
    let order = sqlx::query_as(
        r#"
        INSERT INTO orders (account_id, product_id, quantity, amount, status, fulfilled_content)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *;
        "#,
    )
    .bind(order.account_id)
    .bind(order.product_id)
    .bind(order.quantity)
    .bind(order.amount)
    .bind(OrderStatusType::Success)
    .bind(order.fulfilled_content)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

pub(crate) async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, AccountApiError> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

/// Takes the write lock on the order row. See the [module docs](super) for details.
pub(crate) async fn lock_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, SettlementError> {
    let order = sqlx::query_as("UPDATE orders SET updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING *")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub(crate) async fn fetch_orders_for_account(
    account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, AccountApiError> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE account_id = $1 ORDER BY id ASC")
        .bind(account_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Moves a successful order to `cancelled`. Returns `None` if the order was not in `success` status.
pub(crate) async fn mark_cancelled(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, SettlementError> {
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $2 AND status = $3
        RETURNING *;
        "#,
    )
    .bind(OrderStatusType::Cancelled)
    .bind(order_id)
    .bind(OrderStatusType::Success)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}
