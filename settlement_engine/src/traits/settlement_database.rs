use thiserror::Error;

use crate::{
    db_types::{Account, BalanceEntry, InvoiceStatus, Money, NewAccount, NewInvoice, PaymentInvoice},
    gateways::GatewayError,
    traits::{
        data_objects::{
            BalanceReconciliation,
            CancellationReceipt,
            InvoiceSettlement,
            PurchaseReceipt,
            PurchaseRequest,
            SettlementOutcome,
        },
        AccountApiError,
        AccountManagement,
    },
};

/// This trait defines the highest level of behaviour for backends supporting the settlement engine.
///
/// Every method that writes more than one row does so in a single database transaction. Either all of the rows are
/// written, or none of them are. Methods that depend on a derived quantity (balance or stock level) must derive it
/// *after* acquiring a write lock on the rows they touch, so that concurrent callers are serialised.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: Clone + AccountManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Creates the account if `external_id` is unknown. If it exists, the username is refreshed and a soft-deleted
    /// account is reactivated.
    async fn upsert_account(&self, account: NewAccount) -> Result<Account, SettlementError>;

    /// Marks the account as deleted. Its ledgers are kept. Deleted accounts cannot make purchases.
    async fn soft_delete_account(&self, external_id: &str) -> Result<Account, SettlementError>;

    /// Buys a product from the account's balance. In a single atomic transaction:
    /// * the account and product are locked,
    /// * stock and balance are derived and checked,
    /// * the order, a purchase ledger entry and (for items) a sale stock movement are written,
    /// * a referral credit is written if the referral token is eligible.
    ///
    /// Ineligible referral tokens never cause the purchase to fail.
    async fn purchase_from_balance(&self, request: PurchaseRequest) -> Result<PurchaseReceipt, SettlementError>;

    /// Reverses a successful item order: a `return` stock movement and a refund deposit are written and the order
    /// is marked as cancelled. Referral credits are left untouched.
    async fn cancel_order(&self, order_id: i64) -> Result<CancellationReceipt, SettlementError>;

    /// Credits the account with a manual deposit. `amount` must be positive.
    async fn issue_deposit(
        &self,
        account_id: i64,
        amount: Money,
        description: &str,
    ) -> Result<BalanceEntry, SettlementError>;

    /// Persists a new invoice. Fails with [`SettlementError::AlreadyExists`] if the order token is taken.
    async fn insert_invoice(&self, invoice: NewInvoice) -> Result<PaymentInvoice, SettlementError>;

    /// Moves a pending invoice to `completed` and credits its amount to the owning account, exactly once.
    ///
    /// * Settling an already completed invoice is a no-op and returns [`SettlementOutcome::AlreadySettled`].
    /// * Settling a failed invoice returns [`SettlementError::InvalidInvoiceTransition`].
    async fn settle_invoice(&self, settlement: InvoiceSettlement) -> Result<SettlementOutcome, SettlementError>;

    /// Moves a pending invoice to `failed`. Nothing is credited. Failing an already failed invoice is a no-op.
    async fn fail_invoice(&self, order_token: &str) -> Result<PaymentInvoice, SettlementError>;

    async fn set_invoice_message_id(&self, order_token: &str, message_id: i64)
        -> Result<PaymentInvoice, SettlementError>;

    /// Recomputes the account's cached balance from the ledger and overwrites the cached value.
    async fn rebuild_balance_cache(&self, account_id: i64) -> Result<BalanceReconciliation, SettlementError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), SettlementError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("The requested {resource} ({id}) does not exist")]
    NotFound { resource: &'static str, id: String },
    #[error("Invalid request. {0}")]
    Validation(String),
    #[error("{0} is out of stock")]
    OutOfStock(String),
    #[error("Insufficient balance")]
    InsufficientBalance,
    #[error("Cannot insert {0}, since it already exists")]
    AlreadyExists(String),
    #[error("Invoice {token} cannot move from {from} to {to}")]
    InvalidInvoiceTransition { token: String, from: InvoiceStatus, to: InvoiceStatus },
    #[error("Payment gateway error. {0}")]
    Gateway(#[from] GatewayError),
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("{0}")]
    Account(#[from] AccountApiError),
}

impl SettlementError {
    pub fn not_found<S: ToString>(resource: &'static str, id: S) -> Self {
        SettlementError::NotFound { resource, id: id.to_string() }
    }
}

impl From<sqlx::Error> for SettlementError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(err) if err.is_unique_violation() => {
                SettlementError::AlreadyExists(err.message().to_string())
            },
            sqlx::Error::Database(err) if err.is_check_violation() => SettlementError::Validation(err.message().to_string()),
            e => SettlementError::DatabaseError(e.to_string()),
        }
    }
}
