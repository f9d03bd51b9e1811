//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool,
//! or create an atomic transaction as the need arises and call through to the functions without any other changes.
//!
//! ## Write locks
//! SQLite has no `SELECT ... FOR UPDATE`. The `lock_*` functions emulate it by issuing a no-op `UPDATE` that touches
//! the row's `updated_at` column and returns the row. When this is the first statement of a transaction, SQLite
//! takes the database write lock before anything is read, so a concurrent writer blocks (up to the busy timeout)
//! until the first transaction commits or rolls back. Every sum computed after a `lock_*` call is therefore
//! current for the remainder of the transaction.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod accounts;
pub mod invoices;
pub mod ledger;
pub mod orders;
pub mod products;
pub mod referrals;
pub mod stock;
pub mod subscriptions;

const SQLITE_DB_URL: &str = "sqlite://data/storefront.db";
/// How long a transaction waits for a competing writer before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

pub fn db_url() -> String {
    let result = env::var("SFS_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ SFS_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
