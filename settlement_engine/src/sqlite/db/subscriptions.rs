use chrono::{DateTime, Duration, Utc};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Order, Product, UserSubscription},
    traits::{AccountApiError, SettlementError},
};

pub(crate) async fn fetch_subscription(
    account_id: i64,
    product_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<UserSubscription>, AccountApiError> {
    let subscription = sqlx::query_as("SELECT * FROM user_subscriptions WHERE account_id = $1 AND product_id = $2")
        .bind(account_id)
        .bind(product_id)
        .fetch_optional(conn)
        .await?;
    Ok(subscription)
}

pub(crate) async fn fetch_subscriptions_for_account(
    account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<UserSubscription>, AccountApiError> {
    let subscriptions = sqlx::query_as("SELECT * FROM user_subscriptions WHERE account_id = $1 ORDER BY id ASC")
        .bind(account_id)
        .fetch_all(conn)
        .await?;
    Ok(subscriptions)
}

/// The expiry after one more period of `product` has been bought at `now`.
///
/// A subscription that is still running is extended from its current expiry. A lapsed or deactivated one restarts
/// from `now`.
pub(crate) fn next_expiry(
    existing: Option<&UserSubscription>,
    product: &Product,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let period = Duration::days(product.subscription_period_days);
    match existing {
        Some(sub) if sub.is_current(now) => sub.expires_at + period,
        _ => now + period,
    }
}

/// Starts a subscription for the order's account, or extends the one it already has. Must run on the purchase
/// transaction.
pub(crate) async fn start_or_extend(
    order: &Order,
    product: &Product,
    conn: &mut SqliteConnection,
) -> Result<UserSubscription, SettlementError> {
    let now = Utc::now();
    let existing = fetch_subscription(order.account_id, product.id, &mut *conn).await?;
    let expires_at = next_expiry(existing.as_ref(), product, now);
    let subscription = match existing {
        Some(sub) if sub.is_current(now) => {
            sqlx::query_as(
                r#"
                UPDATE user_subscriptions SET order_id = $1, expires_at = $2, updated_at = CURRENT_TIMESTAMP
                WHERE id = $3
                RETURNING *;
                "#,
            )
            .bind(order.id)
            .bind(expires_at)
            .bind(sub.id)
            .fetch_one(conn)
            .await?
        },
        Some(sub) => {
            sqlx::query_as(
                r#"
                UPDATE user_subscriptions
                SET order_id = $1, started_at = $2, expires_at = $3, is_active = TRUE, updated_at = CURRENT_TIMESTAMP
                WHERE id = $4
                RETURNING *;
                "#,
            )
            .bind(order.id)
            .bind(now)
            .bind(expires_at)
            .bind(sub.id)
            .fetch_one(conn)
            .await?
        },
        None => {
            sqlx::query_as(
                r#"
                INSERT INTO user_subscriptions (account_id, product_id, order_id, started_at, expires_at)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *;
                "#,
            )
            .bind(order.account_id)
            .bind(product.id)
            .bind(order.id)
            .bind(now)
            .bind(expires_at)
            .fetch_one(conn)
            .await?
        },
    };
    Ok(subscription)
}
