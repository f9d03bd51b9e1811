//! The balance ledger. Entries are append-only; an account's balance is the sum of its entries.
use log::trace;
use sqlx::SqliteConnection;

use super::accounts;
use crate::{
    db_types::{BalanceEntry, Money, NewBalanceEntry},
    traits::{AccountApiError, SettlementError},
};

/// Sums the account's balance entries. An account with no entries has a zero balance.
pub(crate) async fn balance_for_account(account_id: i64, conn: &mut SqliteConnection) -> Result<Money, AccountApiError> {
    let balance: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM balance_entries WHERE account_id = $1")
            .bind(account_id)
            .fetch_one(conn)
            .await?;
    Ok(Money::from(balance))
}

/// Appends an entry to the ledger and applies the same delta to the account's cached balance.
pub(crate) async fn insert_entry(
    entry: NewBalanceEntry,
    conn: &mut SqliteConnection,
) -> Result<BalanceEntry, SettlementError> {
    let entry: BalanceEntry = sqlx::query_as(
        r#"
        INSERT INTO balance_entries (account_id, order_id, amount, kind, description, payment_gateway)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *;
        "#,
    )
    .bind(entry.account_id)
    .bind(entry.order_id)
    .bind(entry.amount)
    .bind(entry.kind)
    .bind(entry.description)
    .bind(entry.payment_gateway)
    .fetch_one(&mut *conn)
    .await?;
    accounts::adjust_cached_balance(entry.account_id, entry.amount, conn).await?;
    trace!("🗃️ Balance entry #{} ({}) of {} recorded for account #{}", entry.id, entry.kind, entry.amount, entry.account_id);
    Ok(entry)
}

pub(crate) async fn fetch_entries_for_account(
    account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<BalanceEntry>, AccountApiError> {
    let entries = sqlx::query_as("SELECT * FROM balance_entries WHERE account_id = $1 ORDER BY id ASC")
        .bind(account_id)
        .fetch_all(conn)
        .await?;
    Ok(entries)
}
