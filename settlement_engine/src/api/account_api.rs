//! Unifies API for querying accounts and the ledgers.

use std::fmt::Debug;

use log::trace;

use crate::{
    api::account_objects::{AccountBalance, ProductStock},
    db_types::{Account, BalanceEntry, Money, Order, Product, StockMovement, UserSubscription},
    traits::{AccountApiError, AccountManagement},
};

/// The `AccountApi` provides a unified API for accessing accounts, balances and stock.
pub struct AccountApi<B> {
    db: B,
}

impl<B: Debug> Debug for AccountApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi ({:?})", self.db)
    }
}

impl<B> AccountApi<B>
where B: AccountManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn account_by_id(&self, account_id: i64) -> Result<Option<Account>, AccountApiError> {
        self.db.fetch_account(account_id).await
    }

    pub async fn account_by_external_id(&self, external_id: &str) -> Result<Option<Account>, AccountApiError> {
        self.db.fetch_account_by_external_id(external_id).await
    }

    /// The ledger balance for an account. Zero if the account has no entries.
    pub async fn balance(&self, account_id: i64) -> Result<Money, AccountApiError> {
        self.db.fetch_balance(account_id).await
    }

    /// Fetches the account for the external id along with its ledger balance. If no account exists, `None` is
    /// returned.
    pub async fn balance_for_external_id(&self, external_id: &str) -> Result<Option<AccountBalance>, AccountApiError> {
        let Some(account) = self.db.fetch_account_by_external_id(external_id).await? else {
            trace!("💻️ No account for external id {external_id}");
            return Ok(None);
        };
        let balance = self.db.fetch_balance(account.id).await?;
        Ok(Some(AccountBalance::new(&account, balance)))
    }

    /// The current stock level for a product. Subscriptions always report [`Stock::Unbounded`](crate::db_types::Stock).
    pub async fn stock_for_product(&self, product_id: i64) -> Result<Option<ProductStock>, AccountApiError> {
        let Some(product) = self.db.fetch_product(product_id).await? else {
            return Ok(None);
        };
        let stock = self.db.fetch_stock(product_id).await?;
        Ok(stock.map(|s| ProductStock::new(&product, s)))
    }

    pub async fn product(&self, product_id: i64) -> Result<Option<Product>, AccountApiError> {
        self.db.fetch_product(product_id).await
    }

    pub async fn order(&self, order_id: i64) -> Result<Option<Order>, AccountApiError> {
        self.db.fetch_order(order_id).await
    }

    pub async fn orders_for_account(&self, account_id: i64) -> Result<Vec<Order>, AccountApiError> {
        self.db.fetch_orders_for_account(account_id).await
    }

    pub async fn balance_history(&self, account_id: i64) -> Result<Vec<BalanceEntry>, AccountApiError> {
        self.db.fetch_balance_entries(account_id).await
    }

    pub async fn stock_history(&self, product_id: i64) -> Result<Vec<StockMovement>, AccountApiError> {
        self.db.fetch_stock_movements(product_id).await
    }

    pub async fn subscriptions(&self, account_id: i64) -> Result<Vec<UserSubscription>, AccountApiError> {
        self.db.fetch_subscriptions(account_id).await
    }
}
