use thiserror::Error;

use crate::db_types::{
    Account,
    BalanceEntry,
    Money,
    Order,
    PaymentInvoice,
    Product,
    ReferralCredit,
    Stock,
    StockMovement,
    UserSubscription,
};

#[derive(Debug, Clone, Error)]
pub enum AccountApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
}

impl From<sqlx::Error> for AccountApiError {
    fn from(e: sqlx::Error) -> Self {
        AccountApiError::DatabaseError(e.to_string())
    }
}

/// Read-only queries over accounts, the catalog and the two ledgers.
///
/// Balances and stock levels are always derived by summing ledger rows. Nothing here takes locks, so a value read
/// through this trait may be stale by the time it is used. The write paths in
/// [`SettlementDatabase`](crate::traits::SettlementDatabase) re-derive them under a write lock.
#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    async fn fetch_account(&self, account_id: i64) -> Result<Option<Account>, AccountApiError>;

    /// Looks up an account by its external platform id. Soft-deleted accounts are returned too; check
    /// `is_deleted` if that matters.
    async fn fetch_account_by_external_id(&self, external_id: &str) -> Result<Option<Account>, AccountApiError>;

    /// The sum of all balance entries for the account. Zero if the account has no entries (or does not exist).
    async fn fetch_balance(&self, account_id: i64) -> Result<Money, AccountApiError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, AccountApiError>;

    /// The current stock level. `None` if the product does not exist, [`Stock::Unbounded`] for subscriptions.
    async fn fetch_stock(&self, product_id: i64) -> Result<Option<Stock>, AccountApiError>;

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, AccountApiError>;

    async fn fetch_orders_for_account(&self, account_id: i64) -> Result<Vec<Order>, AccountApiError>;

    /// Balance ledger for the account, oldest first.
    async fn fetch_balance_entries(&self, account_id: i64) -> Result<Vec<BalanceEntry>, AccountApiError>;

    /// Stock ledger for the product, oldest first.
    async fn fetch_stock_movements(&self, product_id: i64) -> Result<Vec<StockMovement>, AccountApiError>;

    async fn fetch_referral_credit_for_order(&self, order_id: i64) -> Result<Option<ReferralCredit>, AccountApiError>;

    async fn fetch_invoice(&self, order_token: &str) -> Result<Option<PaymentInvoice>, AccountApiError>;

    /// All invoices still in `pending` status, oldest first.
    async fn fetch_pending_invoices(&self) -> Result<Vec<PaymentInvoice>, AccountApiError>;

    async fn fetch_subscriptions(&self, account_id: i64) -> Result<Vec<UserSubscription>, AccountApiError>;
}
