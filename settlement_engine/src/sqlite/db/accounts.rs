use sqlx::SqliteConnection;

use crate::{
    db_types::{Account, Money, NewAccount},
    traits::{AccountApiError, SettlementError},
};

pub(crate) async fn fetch_account(account_id: i64, conn: &mut SqliteConnection) -> Result<Option<Account>, AccountApiError> {
    let account = sqlx::query_as("SELECT * FROM accounts WHERE id = $1").bind(account_id).fetch_optional(conn).await?;
    Ok(account)
}

pub(crate) async fn fetch_account_by_external_id(
    external_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Account>, AccountApiError> {
    let account = sqlx::query_as("SELECT * FROM accounts WHERE external_id = $1")
        .bind(external_id)
        .fetch_optional(conn)
        .await?;
    Ok(account)
}

/// Inserts the account, or refreshes and reactivates it if the external id is already known.
/// A `None` username never overwrites an existing one, and the captcha flag can only be set, never cleared.
pub(crate) async fn upsert_account(account: NewAccount, conn: &mut SqliteConnection) -> Result<Account, SettlementError> {
    let account = sqlx::query_as(
        r#"
        INSERT INTO accounts (external_id, username, captcha_passed) VALUES ($1, $2, $3)
        ON CONFLICT (external_id) DO UPDATE SET
            username = COALESCE(excluded.username, accounts.username),
            captcha_passed = accounts.captcha_passed OR excluded.captcha_passed,
            is_deleted = FALSE,
            updated_at = CURRENT_TIMESTAMP
        RETURNING *;
        "#,
    )
    .bind(account.external_id)
    .bind(account.username)
    .bind(account.captcha_passed)
    .fetch_one(conn)
    .await?;
    Ok(account)
}

pub(crate) async fn soft_delete(external_id: &str, conn: &mut SqliteConnection) -> Result<Option<Account>, SettlementError> {
    let account = sqlx::query_as(
        "UPDATE accounts SET is_deleted = TRUE, updated_at = CURRENT_TIMESTAMP WHERE external_id = $1 RETURNING *",
    )
    .bind(external_id)
    .fetch_optional(conn)
    .await?;
    Ok(account)
}

/// Takes the write lock on an account that has not been soft-deleted. See the [module docs](super) for details.
pub(crate) async fn lock_active_account(
    external_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Account>, SettlementError> {
    let account = sqlx::query_as(
        r#"
        UPDATE accounts SET updated_at = CURRENT_TIMESTAMP
        WHERE external_id = $1 AND is_deleted = FALSE
        RETURNING *;
        "#,
    )
    .bind(external_id)
    .fetch_optional(conn)
    .await?;
    Ok(account)
}

/// Takes the write lock on an account by its internal id, whether or not it has been deleted.
pub(crate) async fn lock_account(account_id: i64, conn: &mut SqliteConnection) -> Result<Option<Account>, SettlementError> {
    let account =
        sqlx::query_as("UPDATE accounts SET updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING *")
            .bind(account_id)
            .fetch_optional(conn)
            .await?;
    Ok(account)
}

/// Applies a delta to the cached balance projection. Only [`super::ledger::insert_entry`] should call this.
pub(crate) async fn adjust_cached_balance(
    account_id: i64,
    delta: Money,
    conn: &mut SqliteConnection,
) -> Result<(), SettlementError> {
    sqlx::query("UPDATE accounts SET cached_balance = cached_balance + $1 WHERE id = $2")
        .bind(delta)
        .bind(account_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub(crate) async fn overwrite_cached_balance(
    account_id: i64,
    balance: Money,
    conn: &mut SqliteConnection,
) -> Result<(), SettlementError> {
    sqlx::query("UPDATE accounts SET cached_balance = $1 WHERE id = $2")
        .bind(balance)
        .bind(account_id)
        .execute(conn)
        .await?;
    Ok(())
}
