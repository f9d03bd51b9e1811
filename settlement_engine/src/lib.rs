//! Settlement Engine
//!
//! The settlement engine is the transactional core of a prepaid-balance storefront. Customers top up a balance
//! through external payment gateways and spend it on products, optionally through a referral bot that earns its
//! owner a commission.
//!
//! The library is divided into these main sections:
//! 1. Storage ([`mod@sqlite`] and [`mod@traits`]). Balances and stock levels are never stored as counters that can
//!    drift; they are sums over append-only ledgers. Every operation that touches more than one row runs in a single
//!    database transaction, under a write lock taken before any balance or stock level is read.
//! 2. Payment gateways ([`mod@gateways`]). Each provider implements [`gateways::PaymentGateway`] and is looked up by
//!    name in a [`gateways::GatewayRegistry`].
//! 3. The public API ([`mod@api`]). [`OrderFlowApi`] spends balances, [`PaymentApi`] funds them, and [`AccountApi`]
//!    answers questions about them.
//!
//! The engine also provides a set of events that can be subscribed to. These events are emitted after an order is
//! purchased or cancelled, and after a deposit is settled.
pub mod api;
pub mod db_types;
pub mod events;
pub mod gateways;
pub mod referrals;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use api::{
    account_api::AccountApi,
    account_objects,
    order_flow_api::OrderFlowApi,
    payment_api::PaymentApi,
    payment_objects,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{AccountApiError, AccountManagement, CatalogManagement, SettlementDatabase, SettlementError};
