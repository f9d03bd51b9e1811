use sqlx::SqliteConnection;

use crate::{
    db_types::{NewProduct, NewSeller, Product, Seller},
    traits::{AccountApiError, SettlementError},
};

pub(crate) async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, AccountApiError> {
    let product = sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await?;
    Ok(product)
}

/// Takes the write lock on the product row. See the [module docs](super) for details.
pub(crate) async fn lock_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, SettlementError> {
    let product = sqlx::query_as("UPDATE products SET updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING *")
        .bind(product_id)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

/// Inserts the product row only. The initial stock movement is the caller's responsibility.
pub(crate) async fn insert_product(product: &NewProduct, conn: &mut SqliteConnection) -> Result<Product, SettlementError> {
    let product = sqlx::query_as(
        r#"
        INSERT INTO products (name, price, category, product_type, fulfillment_content, subscription_period_days)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *;
        "#,
    )
    .bind(&product.name)
    .bind(product.price)
    .bind(&product.category)
    .bind(product.product_type)
    .bind(&product.fulfillment_content)
    .bind(product.subscription_period_days)
    .fetch_one(conn)
    .await?;
    Ok(product)
}

pub(crate) async fn insert_seller(seller: NewSeller, conn: &mut SqliteConnection) -> Result<Seller, SettlementError> {
    let seller = sqlx::query_as("INSERT INTO sellers (name, referral_enabled) VALUES ($1, $2) RETURNING *")
        .bind(seller.name)
        .bind(seller.referral_enabled)
        .fetch_one(conn)
        .await?;
    Ok(seller)
}

pub(crate) async fn fetch_seller(seller_id: i64, conn: &mut SqliteConnection) -> Result<Option<Seller>, AccountApiError> {
    let seller = sqlx::query_as("SELECT * FROM sellers WHERE id = $1").bind(seller_id).fetch_optional(conn).await?;
    Ok(seller)
}

pub(crate) async fn set_seller_referrals(
    seller_id: i64,
    enabled: bool,
    conn: &mut SqliteConnection,
) -> Result<Option<Seller>, SettlementError> {
    let seller = sqlx::query_as("UPDATE sellers SET referral_enabled = $1 WHERE id = $2 RETURNING *")
        .bind(enabled)
        .bind(seller_id)
        .fetch_optional(conn)
        .await?;
    Ok(seller)
}
