//! `SqliteDatabase` is a concrete implementation of a settlement engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`traits`] module.
use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::db::{accounts, db_url, invoices, ledger, new_pool, orders, products, referrals, stock, subscriptions};
use crate::{
    db_types::{
        Account,
        BalanceEntry,
        InvoiceStatus,
        Money,
        NewAccount,
        NewBalanceEntry,
        NewInvoice,
        NewOrder,
        NewProduct,
        NewReferralBot,
        NewSeller,
        NewStockMovement,
        Order,
        OrderStatusType,
        PaymentInvoice,
        Product,
        ProductType,
        ReferralBot,
        ReferralCredit,
        Seller,
        Stock,
        StockMovement,
        StockMovementKind,
        UserSubscription,
    },
    traits::{
        AccountApiError,
        AccountManagement,
        BalanceReconciliation,
        CancellationReceipt,
        CatalogManagement,
        InvoiceSettlement,
        PurchaseReceipt,
        PurchaseRequest,
        SettlementDatabase,
        SettlementError,
        SettlementOutcome,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn upsert_account(&self, account: NewAccount) -> Result<Account, SettlementError> {
        if account.external_id.trim().is_empty() {
            return Err(SettlementError::Validation("An external account id is required".into()));
        }
        let mut tx = self.pool.begin().await?;
        let account = accounts::upsert_account(account, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Account #{} ({}) is active", account.id, account.external_id);
        Ok(account)
    }

    async fn soft_delete_account(&self, external_id: &str) -> Result<Account, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let account = accounts::soft_delete(external_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::not_found("account", external_id))?;
        tx.commit().await?;
        info!("🗃️ Account #{} ({external_id}) has been deleted", account.id);
        Ok(account)
    }

    async fn purchase_from_balance(&self, request: PurchaseRequest) -> Result<PurchaseReceipt, SettlementError> {
        if request.quantity <= 0 {
            return Err(SettlementError::Validation(format!("Quantity must be positive, not {}", request.quantity)));
        }
        let mut tx = self.pool.begin().await?;
        // The account lock must be the first statement so that the sums below are taken under the write lock.
        let account = accounts::lock_active_account(&request.external_account_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::not_found("account", &request.external_account_id))?;
        let product = products::lock_product(request.product_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::not_found("product", request.product_id))?;
        match product.product_type {
            ProductType::Subscription if request.quantity != 1 => {
                return Err(SettlementError::Validation("Subscriptions can only be bought one at a time".into()));
            },
            ProductType::Subscription => {},
            ProductType::Item => {
                let level = stock::stock_level(product.id, &mut tx).await?;
                if !Stock::Finite(level).can_supply(request.quantity) {
                    debug!("🗃️ {} has {level} units left. Cannot sell {}", product.name, request.quantity);
                    return Err(SettlementError::OutOfStock(product.name));
                }
            },
        }
        let balance = ledger::balance_for_account(account.id, &mut tx).await?;
        let amount = product.price.checked_mul(request.quantity).ok_or_else(|| {
            SettlementError::Validation(format!("The order total for {} x {} is too large", request.quantity, product.name))
        })?;
        if balance < amount {
            debug!("🗃️ Account #{} has a balance of {balance}, but the order costs {amount}", account.id);
            return Err(SettlementError::InsufficientBalance);
        }
        let new_order = NewOrder {
            account_id: account.id,
            product_id: product.id,
            quantity: request.quantity,
            amount,
            fulfilled_content: product.fulfillment_content.clone(),
        };
        let order = orders::insert_order(new_order, &mut tx).await?;
        let debit = NewBalanceEntry::purchase(account.id, order.id, amount, format!("Purchase of {}", product.name));
        let debit = ledger::insert_entry(debit, &mut tx).await?;
        let (sale, subscription) = match product.product_type {
            ProductType::Item => {
                let sale = NewStockMovement::sale(product.id, order.id, request.quantity);
                (Some(stock::insert_movement(sale, &mut tx).await?), None)
            },
            ProductType::Subscription => {
                let subscription = subscriptions::start_or_extend(&order, &product, &mut tx).await?;
                debug!("🗃️ Subscription #{} to {} now runs until {}", subscription.id, product.name, subscription.expires_at);
                (None, Some(subscription))
            },
        };
        let referral = referrals::process_referral(request.referral_token.as_deref(), &order, &mut tx).await?;
        tx.commit().await?;
        info!(
            "🗃️ Order #{} committed: {} x {} for {amount} on account #{}",
            order.id, order.quantity, product.name, account.id
        );
        let fulfilled_content = order.fulfilled_content.clone();
        Ok(PurchaseReceipt {
            order,
            product,
            debit,
            sale,
            referral,
            subscription,
            fulfilled_content,
            new_balance: balance - amount,
        })
    }

    async fn cancel_order(&self, order_id: i64) -> Result<CancellationReceipt, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let order =
            orders::lock_order(order_id, &mut tx).await?.ok_or_else(|| SettlementError::not_found("order", order_id))?;
        if order.status == OrderStatusType::Cancelled {
            return Err(SettlementError::Validation(format!("Order #{order_id} has already been cancelled")));
        }
        let product = products::fetch_product(order.product_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::not_found("product", order.product_id))?;
        if product.is_subscription() {
            return Err(SettlementError::Validation(format!("Order #{order_id} is for a subscription and cannot be cancelled")));
        }
        let restock = NewStockMovement::new(
            order.product_id,
            order.quantity,
            StockMovementKind::Return,
            format!("Return for cancelled order #{order_id}"),
        )
        .for_order(order_id);
        let restock = stock::insert_movement(restock, &mut tx).await?;
        let refund = NewBalanceEntry::deposit(order.account_id, order.amount, format!("Refund for cancelled order #{order_id}"))
            .for_order(order_id);
        let refund = ledger::insert_entry(refund, &mut tx).await?;
        let order = orders::mark_cancelled(order_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::Validation(format!("Order #{order_id} has already been cancelled")))?;
        tx.commit().await?;
        info!("🗃️ Order #{order_id} cancelled. {} refunded to account #{}", refund.amount, order.account_id);
        Ok(CancellationReceipt { order, refund, restock })
    }

    async fn issue_deposit(
        &self,
        account_id: i64,
        amount: Money,
        description: &str,
    ) -> Result<BalanceEntry, SettlementError> {
        if !amount.is_positive() {
            return Err(SettlementError::Validation(format!("Deposit amount must be positive, not {amount}")));
        }
        let mut tx = self.pool.begin().await?;
        accounts::lock_account(account_id, &mut tx).await?.ok_or_else(|| SettlementError::not_found("account", account_id))?;
        let entry = ledger::insert_entry(NewBalanceEntry::deposit(account_id, amount, description), &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Manual deposit of {amount} credited to account #{account_id}");
        Ok(entry)
    }

    async fn insert_invoice(&self, invoice: NewInvoice) -> Result<PaymentInvoice, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let invoice = invoices::insert_invoice(invoice, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Invoice {} ({}) saved for account #{}", invoice.order_token, invoice.status, invoice.account_id);
        Ok(invoice)
    }

    async fn settle_invoice(&self, settlement: InvoiceSettlement) -> Result<SettlementOutcome, SettlementError> {
        let token = settlement.order_token.as_str();
        let mut tx = self.pool.begin().await?;
        let invoice =
            invoices::lock_invoice(token, &mut tx).await?.ok_or_else(|| SettlementError::not_found("invoice", token))?;
        if invoice.gateway != settlement.gateway {
            warn!("🗃️ Gateway {} tried to settle invoice {token}, which belongs to {}", settlement.gateway, invoice.gateway);
            return Err(SettlementError::Validation(format!("Invoice {token} was not issued by {}", settlement.gateway)));
        }
        match invoice.status {
            InvoiceStatus::Completed => {
                debug!("🗃️ Invoice {token} has already been settled. Ignoring the repeat notification");
                return Ok(SettlementOutcome::AlreadySettled { invoice });
            },
            InvoiceStatus::Failed => {
                return Err(SettlementError::InvalidInvoiceTransition {
                    token: token.to_string(),
                    from: InvoiceStatus::Failed,
                    to: InvoiceStatus::Completed,
                });
            },
            InvoiceStatus::Pending => {},
        }
        if let (Some(expected), Some(reported)) = (&invoice.gateway_invoice_id, &settlement.gateway_invoice_id) {
            if expected != reported {
                warn!("🗃️ Invoice {token} has gateway id {expected}, but the notification was for {reported}");
                return Err(SettlementError::Validation(format!("Gateway invoice id mismatch for invoice {token}")));
            }
        }
        let Some(invoice) =
            invoices::transition_status(token, InvoiceStatus::Pending, InvoiceStatus::Completed, &mut tx).await?
        else {
            // Unreachable while the write lock is held.
            error!("🗃️ Invoice {token} was not pending at the point of settlement. Nothing was credited");
            return Err(SettlementError::DatabaseError(format!("Invoice {token} changed status during settlement")));
        };
        let gateway_ref = invoice.gateway_invoice_id.clone().unwrap_or_else(|| token.to_string());
        let description = format!("Balance top-up via {} (invoice {gateway_ref})", settlement.display_name);
        let deposit = NewBalanceEntry::deposit(invoice.account_id, invoice.amount, description).via_gateway(&invoice.gateway);
        let deposit = ledger::insert_entry(deposit, &mut tx).await?;
        let account = accounts::fetch_account(invoice.account_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::not_found("account", invoice.account_id))?;
        tx.commit().await?;
        info!("🗃️ Invoice {token} settled. {} credited to account #{}", invoice.amount, invoice.account_id);
        Ok(SettlementOutcome::Credited { invoice, deposit, account })
    }

    async fn fail_invoice(&self, order_token: &str) -> Result<PaymentInvoice, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let invoice = invoices::lock_invoice(order_token, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::not_found("invoice", order_token))?;
        let invoice = match invoice.status {
            InvoiceStatus::Failed => invoice,
            InvoiceStatus::Completed => {
                return Err(SettlementError::InvalidInvoiceTransition {
                    token: order_token.to_string(),
                    from: InvoiceStatus::Completed,
                    to: InvoiceStatus::Failed,
                });
            },
            InvoiceStatus::Pending => {
                invoices::transition_status(order_token, InvoiceStatus::Pending, InvoiceStatus::Failed, &mut tx)
                    .await?
                    .ok_or_else(|| SettlementError::DatabaseError(format!("Invoice {order_token} changed status")))?
            },
        };
        tx.commit().await?;
        info!("🗃️ Invoice {order_token} marked as failed");
        Ok(invoice)
    }

    async fn set_invoice_message_id(&self, order_token: &str, message_id: i64) -> Result<PaymentInvoice, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let invoice = invoices::set_message_id(order_token, message_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::not_found("invoice", order_token))?;
        tx.commit().await?;
        Ok(invoice)
    }

    async fn rebuild_balance_cache(&self, account_id: i64) -> Result<BalanceReconciliation, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let account = accounts::lock_account(account_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::not_found("account", account_id))?;
        let ledger = ledger::balance_for_account(account_id, &mut tx).await?;
        accounts::overwrite_cached_balance(account_id, ledger, &mut tx).await?;
        tx.commit().await?;
        let result = BalanceReconciliation { account_id, ledger, cached: account.cached_balance };
        if result.is_consistent() {
            debug!("🗃️ Cached balance for account #{account_id} matches the ledger ({ledger})");
        } else {
            warn!("🗃️ Cached balance for account #{account_id} drifted by {}. Reset to {ledger}", result.drift());
        }
        Ok(result)
    }

    async fn close(&mut self) -> Result<(), SettlementError> {
        self.pool.close().await;
        Ok(())
    }
}

impl AccountManagement for SqliteDatabase {
    async fn fetch_account(&self, account_id: i64) -> Result<Option<Account>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        accounts::fetch_account(account_id, &mut conn).await
    }

    async fn fetch_account_by_external_id(&self, external_id: &str) -> Result<Option<Account>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        accounts::fetch_account_by_external_id(external_id, &mut conn).await
    }

    async fn fetch_balance(&self, account_id: i64) -> Result<Money, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        ledger::balance_for_account(account_id, &mut conn).await
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_product(product_id, &mut conn).await
    }

    async fn fetch_stock(&self, product_id: i64) -> Result<Option<Stock>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let Some(product) = products::fetch_product(product_id, &mut conn).await? else {
            return Ok(None);
        };
        let stock = match product.product_type {
            ProductType::Subscription => Stock::Unbounded,
            ProductType::Item => Stock::Finite(stock::stock_level(product_id, &mut conn).await?),
        };
        Ok(Some(stock))
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_id, &mut conn).await
    }

    async fn fetch_orders_for_account(&self, account_id: i64) -> Result<Vec<Order>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_for_account(account_id, &mut conn).await
    }

    async fn fetch_balance_entries(&self, account_id: i64) -> Result<Vec<BalanceEntry>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        ledger::fetch_entries_for_account(account_id, &mut conn).await
    }

    async fn fetch_stock_movements(&self, product_id: i64) -> Result<Vec<StockMovement>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        stock::fetch_movements_for_product(product_id, &mut conn).await
    }

    async fn fetch_referral_credit_for_order(&self, order_id: i64) -> Result<Option<ReferralCredit>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        referrals::fetch_credit_for_order(order_id, &mut conn).await
    }

    async fn fetch_invoice(&self, order_token: &str) -> Result<Option<PaymentInvoice>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        invoices::fetch_invoice(order_token, &mut conn).await
    }

    async fn fetch_pending_invoices(&self) -> Result<Vec<PaymentInvoice>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        invoices::fetch_pending(&mut conn).await
    }

    async fn fetch_subscriptions(&self, account_id: i64) -> Result<Vec<UserSubscription>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        subscriptions::fetch_subscriptions_for_account(account_id, &mut conn).await
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn create_seller(&self, seller: NewSeller) -> Result<Seller, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let seller = products::insert_seller(seller, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Seller #{} ({}) created", seller.id, seller.name);
        Ok(seller)
    }

    async fn set_seller_referrals(&self, seller_id: i64, enabled: bool) -> Result<Seller, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let seller = products::set_seller_referrals(seller_id, enabled, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::not_found("seller", seller_id))?;
        tx.commit().await?;
        Ok(seller)
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, SettlementError> {
        if product.price.is_negative() {
            return Err(SettlementError::Validation("Product price cannot be negative".into()));
        }
        if product.initial_stock < 0 {
            return Err(SettlementError::Validation("Initial stock cannot be negative".into()));
        }
        if product.subscription_period_days <= 0 {
            return Err(SettlementError::Validation("Subscription period must be at least one day".into()));
        }
        let mut tx = self.pool.begin().await?;
        let created = products::insert_product(&product, &mut tx).await?;
        if created.product_type == ProductType::Item && product.initial_stock > 0 {
            let movement =
                NewStockMovement::new(created.id, product.initial_stock, StockMovementKind::Initial, "Initial stock");
            stock::insert_movement(movement, &mut tx).await?;
        }
        tx.commit().await?;
        debug!("🗃️ Product #{} ({}) created with price {}", created.id, created.name, created.price);
        Ok(created)
    }

    async fn restock_product(&self, product_id: i64, quantity: i64) -> Result<StockMovement, SettlementError> {
        if quantity <= 0 {
            return Err(SettlementError::Validation(format!("Restock quantity must be positive, not {quantity}")));
        }
        let mut tx = self.pool.begin().await?;
        let product = products::lock_product(product_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::not_found("product", product_id))?;
        if product.is_subscription() {
            return Err(SettlementError::Validation(format!("{} is a subscription and has no stock", product.name)));
        }
        let movement = NewStockMovement::new(product_id, quantity, StockMovementKind::Restock, "Restock");
        let movement = stock::insert_movement(movement, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ {quantity} units of {} restocked", product.name);
        Ok(movement)
    }

    async fn create_referral_bot(&self, bot: NewReferralBot) -> Result<ReferralBot, SettlementError> {
        if !(0.0..=100.0).contains(&bot.percentage) {
            return Err(SettlementError::Validation("Commission percentage must be between 0 and 100".into()));
        }
        let mut tx = self.pool.begin().await?;
        let bot = referrals::insert_bot(bot, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Referral bot #{} created for seller #{}", bot.id, bot.seller_id);
        Ok(bot)
    }

    async fn set_referral_bot_active(&self, bot_id: i64, active: bool) -> Result<ReferralBot, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let bot = referrals::set_bot_active(bot_id, active, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::not_found("referral bot", bot_id))?;
        tx.commit().await?;
        Ok(bot)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Applies any outstanding schema migrations.
    pub async fn migrate(&self) -> Result<(), SettlementError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| SettlementError::DatabaseError(format!("Migration failed. {e}")))?;
        info!("🗃️ Database schema is up to date");
        Ok(())
    }
}
