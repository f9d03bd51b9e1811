//! #  Database management and control.
//!
//! This module provides the interfaces that define the contracts of the settlement engine database *backends*.
//!
//! ## Ledgers
//! Neither balances nor stock levels are stored as mutable counters. Each is the sum of an append-only ledger:
//! balance entries for accounts, stock movements for products. A backend derives them on demand.
//!
//! ## Traits
//! * [`SettlementDatabase`] defines the atomic write operations: purchases, cancellations and invoice settlement.
//! * [`AccountManagement`] provides read-only queries over accounts, products, orders and ledgers.
//! * [`CatalogManagement`] covers administrative writes to products, sellers and referral bots.
mod account_management;
mod catalog_management;
mod data_objects;
mod settlement_database;

pub use account_management::{AccountApiError, AccountManagement};
pub use catalog_management::CatalogManagement;
pub use data_objects::{
    BalanceReconciliation,
    CancellationReceipt,
    InvoiceSettlement,
    PurchaseReceipt,
    PurchaseRequest,
    SettlementOutcome,
};
pub use settlement_database::{SettlementDatabase, SettlementError};
