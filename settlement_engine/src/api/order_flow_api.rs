use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Account, BalanceEntry, Money, NewAccount},
    events::{EventProducers, OrderCancelledEvent, OrderPurchasedEvent},
    traits::{
        BalanceReconciliation,
        CancellationReceipt,
        PurchaseReceipt,
        PurchaseRequest,
        SettlementDatabase,
        SettlementError,
    },
};

/// `OrderFlowApi` is the primary API for spending a customer's balance: buying products, cancelling orders, and
/// crediting the balance by hand.
///
/// All the heavy lifting happens inside the backend's transactions. This layer validates input, publishes events
/// for committed changes and keeps the logs.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> OrderFlowApi<B>
where B: SettlementDatabase
{
    /// Registers a customer on first contact, or reactivates a returning one.
    pub async fn upsert_account(&self, account: NewAccount) -> Result<Account, SettlementError> {
        self.db.upsert_account(account).await
    }

    pub async fn soft_delete_account(&self, external_id: &str) -> Result<Account, SettlementError> {
        self.db.soft_delete_account(external_id).await
    }

    /// Buys a product with the customer's prepaid balance.
    ///
    /// On success, the order, its ledger entries and any referral credit have been committed together and an
    /// `OrderPurchased` event has been published. On failure, nothing was written.
    pub async fn purchase_from_balance(&self, request: PurchaseRequest) -> Result<PurchaseReceipt, SettlementError> {
        let external_id = request.external_account_id.clone();
        trace!("🔄️📦️ Purchase of {} x product #{} requested by {external_id}", request.quantity, request.product_id);
        let receipt = self.db.purchase_from_balance(request).await.map_err(|e| {
            match &e {
                SettlementError::DatabaseError(msg) => error!("🔄️📦️ Purchase by {external_id} failed. {msg}"),
                _ => debug!("🔄️📦️ Purchase by {external_id} rejected. {e}"),
            }
            e
        })?;
        debug!(
            "🔄️📦️ Order #{} for {external_id} complete. New balance is {}",
            receipt.order.id, receipt.new_balance
        );
        let event = OrderPurchasedEvent {
            order: receipt.order.clone(),
            product: receipt.product.clone(),
            new_balance: receipt.new_balance,
            referral: receipt.referral.clone(),
        };
        self.producers.publish_order_purchased(event).await;
        Ok(receipt)
    }

    /// Reverses an order: the stock is returned and the order amount is refunded to the customer's balance.
    ///
    /// Cancelling an order twice is an error. Referral commissions paid on the order are not reversed.
    pub async fn cancel_order(&self, order_id: i64) -> Result<CancellationReceipt, SettlementError> {
        trace!("🔄️❌️ Cancellation of order #{order_id} requested");
        let receipt = self.db.cancel_order(order_id).await?;
        debug!("🔄️❌️ Order #{order_id} cancelled. {} refunded", receipt.refund.amount);
        let event = OrderCancelledEvent { order: receipt.order.clone(), refund: receipt.refund.clone() };
        self.producers.publish_order_cancelled(event).await;
        Ok(receipt)
    }

    /// Credits an account directly, bypassing the payment gateways.
    pub async fn issue_deposit(
        &self,
        account_id: i64,
        amount: Money,
        reason: &str,
    ) -> Result<BalanceEntry, SettlementError> {
        let description = if reason.trim().is_empty() { "Manual deposit".to_string() } else { reason.to_string() };
        let entry = self.db.issue_deposit(account_id, amount, &description).await?;
        info!("🔄️💰️ Manual deposit of {amount} for account #{account_id}: {description}");
        Ok(entry)
    }

    /// Recomputes the cached balance for an account from its ledger.
    pub async fn reconcile_balance(&self, account_id: i64) -> Result<BalanceReconciliation, SettlementError> {
        self.db.rebuild_balance_cache(account_id).await
    }
}
