use serde::{Deserialize, Serialize};

use crate::db_types::{Account, BalanceEntry, Money, Order, PaymentInvoice, Product, ReferralCredit};

/// Published after a purchase from balance has been committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPurchasedEvent {
    pub order: Order,
    pub product: Product,
    pub new_balance: Money,
    pub referral: Option<ReferralCredit>,
}

/// Published after an order has been cancelled and refunded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order: Order,
    pub refund: BalanceEntry,
}

/// Published exactly once per invoice, when a gateway payment has been credited to the customer's balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositSettledEvent {
    pub invoice: PaymentInvoice,
    pub deposit: BalanceEntry,
    pub account: Account,
}

#[derive(Debug, Clone)]
pub enum EventType {
    OrderPurchased(OrderPurchasedEvent),
    OrderCancelled(OrderCancelledEvent),
    DepositSettled(DepositSettledEvent),
}
