use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize, Serializer};
use sqlx::{FromRow, Type};
use thiserror::Error;

pub use storefront_common::Money;

#[derive(Debug, Clone, Error)]
#[error("Invalid {kind} value: {value}")]
pub struct ConversionError {
    kind: &'static str,
    value: String,
}

impl ConversionError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

/// Generates `Display` and `FromStr` for the lowercase text enums stored in the database.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($text),)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ConversionError::new($kind, other)),
                }
            }
        }
    };
}

//--------------------------------------       Account       ---------------------------------------------------------
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    /// The customer's identifier on the external platform (e.g. a messenger user id)
    pub external_id: String,
    pub username: Option<String>,
    pub is_deleted: bool,
    pub captcha_passed: bool,
    /// Materialised sum of the balance ledger. Never used for balance checks.
    pub cached_balance: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAccount {
    pub external_id: String,
    pub username: Option<String>,
    #[serde(default)]
    pub captcha_passed: bool,
}

impl NewAccount {
    pub fn new<S: Into<String>>(external_id: S) -> Self {
        Self { external_id: external_id.into(), username: None, captcha_passed: false }
    }

    pub fn with_username<S: Into<String>>(mut self, username: S) -> Self {
        self.username = Some(username.into());
        self
    }
}

//--------------------------------------     ProductType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    /// A physical or digital item with a finite stock level
    #[default]
    Item,
    /// Unlimited stock. Stock level queries always report [`Stock::Unbounded`].
    Subscription,
}

text_enum!(ProductType, "product type", { Item => "item", Subscription => "subscription" });

//--------------------------------------       Product       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Money,
    pub category: Option<String>,
    pub product_type: ProductType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub fulfillment_content: Option<String>,
    /// How long one purchase of a subscription lasts. Meaningless for items.
    pub subscription_period_days: i64,
}

impl Product {
    pub fn is_subscription(&self) -> bool {
        matches!(self.product_type, ProductType::Subscription)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: Money,
    pub category: Option<String>,
    pub product_type: ProductType,
    /// Recorded as an `initial` stock movement when the product is created. Ignored for subscriptions.
    pub initial_stock: i64,
    pub fulfillment_content: Option<String>,
    pub subscription_period_days: i64,
}

pub const DEFAULT_SUBSCRIPTION_PERIOD_DAYS: i64 = 30;

impl NewProduct {
    pub fn item<S: Into<String>>(name: S, price: Money, initial_stock: i64) -> Self {
        Self {
            name: name.into(),
            price,
            category: None,
            product_type: ProductType::Item,
            initial_stock,
            fulfillment_content: None,
            subscription_period_days: DEFAULT_SUBSCRIPTION_PERIOD_DAYS,
        }
    }

    pub fn subscription<S: Into<String>>(name: S, price: Money) -> Self {
        Self {
            name: name.into(),
            price,
            category: None,
            product_type: ProductType::Subscription,
            initial_stock: 0,
            fulfillment_content: None,
            subscription_period_days: DEFAULT_SUBSCRIPTION_PERIOD_DAYS,
        }
    }

    pub fn with_fulfillment<S: Into<String>>(mut self, content: S) -> Self {
        self.fulfillment_content = Some(content.into());
        self
    }

    pub fn with_period_days(mut self, days: i64) -> Self {
        self.subscription_period_days = days;
        self
    }

    pub fn with_category<S: Into<String>>(mut self, category: S) -> Self {
        self.category = Some(category.into());
        self
    }
}

//--------------------------------------        Stock        ---------------------------------------------------------
/// A product's current stock level, as derived from the stock ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stock {
    Finite(i64),
    Unbounded,
}

impl Stock {
    /// Whether `quantity` units can be sold without the stock level dropping below zero.
    pub fn can_supply(&self, quantity: i64) -> bool {
        match self {
            Stock::Finite(level) => level - quantity >= 0,
            Stock::Unbounded => true,
        }
    }
}

impl Display for Stock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stock::Finite(n) => write!(f, "{n}"),
            Stock::Unbounded => f.write_str("unbounded"),
        }
    }
}

// Finite levels serialize as plain numbers so that clients can do arithmetic on them.
impl Serialize for Stock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Stock::Finite(n) => serializer.serialize_i64(*n),
            Stock::Unbounded => serializer.serialize_str("unbounded"),
        }
    }
}

//--------------------------------------   OrderStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// The order was paid from the customer's balance.
    Success,
    /// The order was reversed. Terminal.
    Cancelled,
}

text_enum!(OrderStatusType, "order status", { Success => "success", Cancelled => "cancelled" });

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Success");
            OrderStatusType::Success
        })
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub account_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// `price * quantity` at the time of purchase
    pub amount: Money,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// The product's fulfillment content as it was handed over at the time of purchase
    pub fulfilled_content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub account_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub amount: Money,
    pub fulfilled_content: Option<String>,
}

/// The subset of an order that is returned to the purchaser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlimOrder {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub amount: Money,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for SlimOrder {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            product_id: order.product_id,
            quantity: order.quantity,
            amount: order.amount,
            status: order.status,
            created_at: order.created_at,
        }
    }
}

//--------------------------------------  BalanceEntryKind   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BalanceEntryKind {
    /// Funds entering the account: gateway top-ups, manual credits and refunds.
    Deposit,
    /// Funds leaving the account to pay for an order.
    Purchase,
}

text_enum!(BalanceEntryKind, "balance entry kind", { Deposit => "deposit", Purchase => "purchase" });

//--------------------------------------    BalanceEntry     ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub id: i64,
    pub account_id: i64,
    pub order_id: Option<i64>,
    /// Signed. Purchases are negative.
    pub amount: Money,
    pub kind: BalanceEntryKind,
    pub description: String,
    pub payment_gateway: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBalanceEntry {
    pub account_id: i64,
    pub order_id: Option<i64>,
    pub amount: Money,
    pub kind: BalanceEntryKind,
    pub description: String,
    pub payment_gateway: Option<String>,
}

impl NewBalanceEntry {
    pub fn deposit<S: Into<String>>(account_id: i64, amount: Money, description: S) -> Self {
        Self {
            account_id,
            order_id: None,
            amount,
            kind: BalanceEntryKind::Deposit,
            description: description.into(),
            payment_gateway: None,
        }
    }

    /// A debit for `order_id`. `amount` is the (positive) order amount; it is stored negated.
    pub fn purchase<S: Into<String>>(account_id: i64, order_id: i64, amount: Money, description: S) -> Self {
        Self {
            account_id,
            order_id: Some(order_id),
            amount: -amount,
            kind: BalanceEntryKind::Purchase,
            description: description.into(),
            payment_gateway: None,
        }
    }

    pub fn for_order(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn via_gateway<S: Into<String>>(mut self, gateway: S) -> Self {
        self.payment_gateway = Some(gateway.into());
        self
    }
}

//--------------------------------------  StockMovementKind  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StockMovementKind {
    Initial,
    Sale,
    Restock,
    Return,
}

text_enum!(StockMovementKind, "stock movement kind", {
    Initial => "initial",
    Sale => "sale",
    Restock => "restock",
    Return => "return",
});

//--------------------------------------    StockMovement    ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: i64,
    pub order_id: Option<i64>,
    pub product_id: i64,
    /// Signed. Sales are negative.
    pub quantity: i64,
    pub kind: StockMovementKind,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewStockMovement {
    pub order_id: Option<i64>,
    pub product_id: i64,
    pub quantity: i64,
    pub kind: StockMovementKind,
    pub description: String,
}

impl NewStockMovement {
    pub fn new<S: Into<String>>(product_id: i64, quantity: i64, kind: StockMovementKind, description: S) -> Self {
        Self { order_id: None, product_id, quantity, kind, description: description.into() }
    }

    /// A sale of `quantity` units against `order_id`. The quantity is stored negated.
    pub fn sale(product_id: i64, order_id: i64, quantity: i64) -> Self {
        Self::new(product_id, -quantity, StockMovementKind::Sale, "Sale to user").for_order(order_id)
    }

    pub fn for_order(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }
}

//--------------------------------------  UserSubscription   ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserSubscription {
    pub id: i64,
    pub account_id: i64,
    pub product_id: i64,
    /// The most recent order that started or extended the subscription
    pub order_id: i64,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserSubscription {
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }
}

//--------------------------------------       Seller        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Seller {
    pub id: i64,
    pub name: String,
    pub referral_enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSeller {
    pub name: String,
    pub referral_enabled: bool,
}

//--------------------------------------   ReferralBotKind   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReferralBotKind {
    /// The seller's own storefront bot. Never earns commission.
    Main,
    Referral,
}

text_enum!(ReferralBotKind, "referral bot kind", { Main => "main", Referral => "referral" });

//--------------------------------------     ReferralBot     ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ReferralBot {
    pub id: i64,
    pub owner_account_id: i64,
    pub seller_id: i64,
    pub token: String,
    pub kind: ReferralBotKind,
    pub is_active: bool,
    /// Commission as a percentage of the order amount, e.g. `10.0` for 10%
    pub percentage: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReferralBot {
    pub owner_account_id: i64,
    pub seller_id: i64,
    pub token: String,
    pub kind: ReferralBotKind,
    pub percentage: f64,
}

//--------------------------------------   ReferralCredit    ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ReferralCredit {
    pub id: i64,
    pub referral_owner_id: i64,
    pub seller_id: i64,
    pub bot_id: i64,
    pub order_id: i64,
    /// Gross order amount the share was computed from
    pub amount: Money,
    pub share: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReferralCredit {
    pub referral_owner_id: i64,
    pub seller_id: i64,
    pub bot_id: i64,
    pub order_id: i64,
    pub amount: Money,
    pub share: Money,
}

//--------------------------------------    InvoiceStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    /// Terminal. The invoice amount has been credited exactly once.
    Completed,
    /// Terminal. Nothing was credited.
    Failed,
}

text_enum!(InvoiceStatus, "invoice status", { Pending => "pending", Completed => "completed", Failed => "failed" });

impl InvoiceStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvoiceStatus::Pending)
    }
}

//--------------------------------------   PaymentInvoice    ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentInvoice {
    pub id: i64,
    pub account_id: i64,
    pub amount: Money,
    pub status: InvoiceStatus,
    /// Registry name of the gateway that issued the external invoice
    pub gateway: String,
    pub gateway_invoice_id: Option<String>,
    /// Internally generated idempotency key. Unique across all invoices.
    pub order_token: String,
    pub pay_url: Option<String>,
    /// Reference to the UI message that displays this invoice to the customer
    pub message_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub account_id: i64,
    pub amount: Money,
    pub status: InvoiceStatus,
    pub gateway: String,
    pub gateway_invoice_id: Option<String>,
    pub order_token: String,
    pub pay_url: Option<String>,
}

impl NewInvoice {
    pub fn pending<S: Into<String>>(account_id: i64, amount: Money, gateway: S, order_token: S) -> Self {
        Self {
            account_id,
            amount,
            status: InvoiceStatus::Pending,
            gateway: gateway.into(),
            gateway_invoice_id: None,
            order_token: order_token.into(),
            pay_url: None,
        }
    }

    pub fn failed<S: Into<String>>(account_id: i64, amount: Money, gateway: S, order_token: S) -> Self {
        Self { status: InvoiceStatus::Failed, ..Self::pending(account_id, amount, gateway, order_token) }
    }

    pub fn with_gateway_invoice<S: Into<String>>(mut self, gateway_invoice_id: S, pay_url: Option<String>) -> Self {
        self.gateway_invoice_id = Some(gateway_invoice_id.into());
        self.pay_url = pay_url;
        self
    }
}
