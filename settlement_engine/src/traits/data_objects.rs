use serde::{Deserialize, Serialize};

use crate::db_types::{
    Account,
    BalanceEntry,
    Money,
    Order,
    PaymentInvoice,
    Product,
    ReferralCredit,
    StockMovement,
    UserSubscription,
};

/// A request to buy `quantity` units of a product, paid for from the account's prepaid balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    /// The purchaser's external platform id
    pub external_account_id: String,
    pub product_id: i64,
    pub quantity: i64,
    /// Token of the referral bot the purchase was made through, if any
    #[serde(default)]
    pub referral_token: Option<String>,
}

impl PurchaseRequest {
    pub fn new<S: Into<String>>(external_account_id: S, product_id: i64, quantity: i64) -> Self {
        Self { external_account_id: external_account_id.into(), product_id, quantity, referral_token: None }
    }

    pub fn via_referral<S: Into<String>>(mut self, token: S) -> Self {
        self.referral_token = Some(token.into());
        self
    }
}

/// Everything that was written by a successful purchase.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseReceipt {
    pub order: Order,
    pub product: Product,
    pub debit: BalanceEntry,
    /// `None` for subscriptions, which do not track stock
    pub sale: Option<StockMovement>,
    pub referral: Option<ReferralCredit>,
    /// The started or extended subscription, for subscription products
    pub subscription: Option<UserSubscription>,
    /// What the buyer receives, if the product carries fulfillment content
    pub fulfilled_content: Option<String>,
    /// The pre-purchase balance less the order amount
    pub new_balance: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancellationReceipt {
    pub order: Order,
    pub refund: BalanceEntry,
    pub restock: StockMovement,
}

/// The settlement of a pending invoice, as reported by a gateway.
#[derive(Debug, Clone)]
pub struct InvoiceSettlement {
    pub order_token: String,
    /// Registry name of the gateway that reported the payment
    pub gateway: String,
    /// The gateway's own invoice id, if the notification carried one
    pub gateway_invoice_id: Option<String>,
    /// Human-readable gateway name, used in the deposit description
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// The invoice moved from pending to completed and the account was credited.
    Credited { invoice: PaymentInvoice, deposit: BalanceEntry, account: Account },
    /// The invoice was already completed. Nothing was written.
    AlreadySettled { invoice: PaymentInvoice },
}

impl SettlementOutcome {
    pub fn invoice(&self) -> &PaymentInvoice {
        match self {
            SettlementOutcome::Credited { invoice, .. } => invoice,
            SettlementOutcome::AlreadySettled { invoice } => invoice,
        }
    }

    pub fn is_credited(&self) -> bool {
        matches!(self, SettlementOutcome::Credited { .. })
    }
}

/// Result of recomputing an account's cached balance from the ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceReconciliation {
    pub account_id: i64,
    pub ledger: Money,
    /// The cached value before it was overwritten
    pub cached: Money,
}

impl BalanceReconciliation {
    pub fn drift(&self) -> Money {
        self.cached - self.ledger
    }

    pub fn is_consistent(&self) -> bool {
        self.drift() == Money::from(0)
    }
}
