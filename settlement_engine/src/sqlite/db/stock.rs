//! The stock ledger. Movements are append-only; a product's stock level is the sum of its movements.
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewStockMovement, StockMovement},
    traits::{AccountApiError, SettlementError},
};

/// Sums the product's stock movements. This does not know about product types; callers must not use it for
/// subscriptions.
pub(crate) async fn stock_level(product_id: i64, conn: &mut SqliteConnection) -> Result<i64, AccountApiError> {
    let level: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(quantity), 0) FROM stock_movements WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(conn)
        .await?;
    Ok(level)
}

pub(crate) async fn insert_movement(
    movement: NewStockMovement,
    conn: &mut SqliteConnection,
) -> Result<StockMovement, SettlementError> {
    let movement: StockMovement = sqlx::query_as(
        r#"
        INSERT INTO stock_movements (order_id, product_id, quantity, kind, description)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *;
        "#,
    )
    .bind(movement.order_id)
    .bind(movement.product_id)
    .bind(movement.quantity)
    .bind(movement.kind)
    .bind(movement.description)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Stock movement #{} ({}) of {} recorded for product #{}", movement.id, movement.kind, movement.quantity, movement.product_id);
    Ok(movement)
}

pub(crate) async fn fetch_movements_for_product(
    product_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<StockMovement>, AccountApiError> {
    let movements = sqlx::query_as("SELECT * FROM stock_movements WHERE product_id = $1 ORDER BY id ASC")
        .bind(product_id)
        .fetch_all(conn)
        .await?;
    Ok(movements)
}
