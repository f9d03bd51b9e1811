//! # Settlement engine public API
//!
//! The `api` module exposes the programmatic API for the settlement engine.
//! The API is modular, so that clients of the API can pick and choose the functionality they want.
//!
//! * [`account_api`] provides read-only access to derived balances, stock levels and ledgers.
//! * [`order_flow_api`] handles purchases from balance, cancellations and manual deposits.
//! * [`payment_api`] drives payment invoices through their lifecycle: creation at a gateway, settlement from
//!   webhooks or polling, and failure.
//!
//! # API usage
//!
//! The pattern for using all the APIs is the same. An API instance is created by supplying a database backend that
//! implements the specific backend traits required by the API.
//!
//! ```rust,ignore
//! use settlement_engine::{AccountApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements AccountManagement
//! let api = AccountApi::new(db);
//! let balance = api.balance_for_external_id("tg-1234").await?;
//! ```

pub mod account_api;
pub mod account_objects;
pub mod order_flow_api;
pub mod payment_api;
pub mod payment_objects;
