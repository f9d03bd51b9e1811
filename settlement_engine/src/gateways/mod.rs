//! # Payment gateways
//!
//! A payment gateway is an external provider that collects money from a customer and tells us about it, either by
//! calling a webhook or by being polled. Each provider is a separate implementation of [`PaymentGateway`]. The
//! [`GatewayRegistry`] maps provider names (as used in webhook URLs and invoice records) to implementations.
//!
//! Gateways never touch the database. They translate between provider wire formats and the normalised types in this
//! module. The invoice state machine in [`crate::api::PaymentApi`] does the rest.
use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::Money;

mod mock_provider;
mod registry;

pub use mock_provider::{sign_payload, MockProviderConfig, MockProviderGateway, MOCK_PROVIDER_NAME, SIGNATURE_HEADER};
pub use registry::GatewayRegistry;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Could not reach the payment provider. {0}")]
    Transport(String),
    #[error("The payment provider did not respond within {0} seconds")]
    Timeout(u64),
    #[error("The payment provider returned an unexpected response. {0}")]
    InvalidResponse(String),
    #[error("The notification signature is missing or invalid")]
    InvalidSignature,
    #[error("The notification could not be parsed. {0}")]
    InvalidPayload(String),
    #[error("{0} is not supported by this gateway")]
    Unsupported(&'static str),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GatewayError::InvalidResponse(e.to_string())
        } else {
            GatewayError::Transport(e.to_string())
        }
    }
}

/// What the gateway needs to know to open an external invoice.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceRequest {
    pub amount: Money,
    pub account_id: i64,
    /// Our idempotency key. The gateway must echo it back in its notifications.
    pub order_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayInvoice {
    pub gateway_invoice_id: String,
    pub pay_url: Option<String>,
    /// Provider-specific extras that are passed through to the caller untouched
    #[serde(default)]
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayPaymentStatus {
    Pending,
    Completed,
    Failed,
}

/// A raw webhook delivery, decoupled from any particular HTTP framework.
#[derive(Debug, Clone, Default)]
pub struct WebhookNotification {
    /// Header names are lowercased
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl WebhookNotification {
    pub fn new(body: Vec<u8>) -> Self {
        Self { headers: HashMap::new(), body }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// A provider notification, normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResult {
    pub order_token: String,
    pub gateway_invoice_id: String,
    pub amount: Money,
    pub status: GatewayPaymentStatus,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// The registry key. Used in webhook URLs and stored on invoices.
    fn name(&self) -> &str;

    /// A human-readable label for user-facing messages and ledger descriptions.
    fn display_name(&self) -> &str;

    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<GatewayInvoice, GatewayError>;

    /// Verifies and parses a webhook delivery.
    async fn handle_webhook(&self, notification: &WebhookNotification) -> Result<WebhookResult, GatewayError>;

    /// Asks the provider for the current status of one of its invoices.
    async fn invoice_status(&self, gateway_invoice_id: &str) -> Result<GatewayPaymentStatus, GatewayError>;

    /// Whether pending invoices from this gateway should be settled by polling [`Self::invoice_status`].
    fn supports_polling(&self) -> bool {
        false
    }
}
