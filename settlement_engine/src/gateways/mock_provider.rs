//! Adapter for the development payment provider.
//!
//! The provider exposes three endpoints:
//! * `POST {base}/create_invoice` with `{amount, user_id, order_id}`, answering `{invoice_id, pay_url}`
//! * `GET {base}/status/{invoice_id}`, answering `{status}`
//! * a payment page at `pay_url` which, once paid, posts `{event, order_id, invoice_id, amount, status}` to our
//!   webhook.
//!
//! Amounts are sent as decimal numbers of major units. When a webhook secret is configured, every notification must
//! carry `X-Signature: base64(HMAC-SHA256(secret, body))`.
use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use log::*;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::Sha256;
use storefront_common::{Money, Secret, MINOR_UNITS_PER_MAJOR};

use super::{
    GatewayError,
    GatewayInvoice,
    GatewayPaymentStatus,
    InvoiceRequest,
    PaymentGateway,
    WebhookNotification,
    WebhookResult,
};

pub const MOCK_PROVIDER_NAME: &str = "mock_provider";
pub const SIGNATURE_HEADER: &str = "x-signature";
const COMPLETED_EVENT: &str = "payment.completed";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct MockProviderConfig {
    pub base_url: String,
    pub webhook_secret: Option<Secret<String>>,
    pub polling: bool,
    pub timeout: Duration,
}

impl Default for MockProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8078".into(),
            webhook_secret: None,
            polling: false,
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct MockProviderGateway {
    config: MockProviderConfig,
    client: Client,
}

impl MockProviderGateway {
    pub fn new(config: MockProviderConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn verify_signature(&self, notification: &WebhookNotification) -> Result<(), GatewayError> {
        let Some(secret) = self.config.webhook_secret.as_ref() else {
            return Ok(());
        };
        let signature = notification.header(SIGNATURE_HEADER).ok_or(GatewayError::InvalidSignature)?;
        let signature = base64::decode(signature.trim()).map_err(|_| GatewayError::InvalidSignature)?;
        let mut mac =
            HmacSha256::new_from_slice(secret.reveal().as_bytes()).map_err(|_| GatewayError::InvalidSignature)?;
        mac.update(&notification.body);
        mac.verify_slice(&signature).map_err(|_| GatewayError::InvalidSignature)
    }
}

/// Signs a webhook body the way the provider does.
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String, GatewayError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| GatewayError::InvalidSignature)?;
    mac.update(body);
    Ok(base64::encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Serialize)]
struct CreateInvoiceBody<'a> {
    amount: f64,
    user_id: i64,
    order_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateInvoiceResponse {
    invoice_id: String,
    pay_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    #[serde(default)]
    event: Option<String>,
    order_id: String,
    invoice_id: String,
    #[serde(deserialize_with = "major_units")]
    amount: Money,
    status: String,
}

fn parse_status(status: &str) -> GatewayPaymentStatus {
    match status.to_ascii_lowercase().as_str() {
        "completed" | "paid" | "success" => GatewayPaymentStatus::Completed,
        "failed" | "cancelled" | "canceled" | "expired" => GatewayPaymentStatus::Failed,
        _ => GatewayPaymentStatus::Pending,
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_major_units(amount: Money) -> f64 {
    amount.value() as f64 / MINOR_UNITS_PER_MAJOR as f64
}

#[allow(clippy::cast_possible_truncation)]
fn from_major_units(amount: f64) -> Money {
    Money::from((amount * MINOR_UNITS_PER_MAJOR as f64).round() as i64)
}

/// Accepts `150`, `150.5` or `"150.50"`.
fn major_units<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Money, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(f64),
        Text(String),
    }
    match Amount::deserialize(deserializer)? {
        Amount::Number(n) => Ok(from_major_units(n)),
        Amount::Text(s) => Money::from_str(s.trim()).map_err(serde::de::Error::custom),
    }
}

#[async_trait]
impl PaymentGateway for MockProviderGateway {
    fn name(&self) -> &str {
        MOCK_PROVIDER_NAME
    }

    fn display_name(&self) -> &str {
        "Mock Provider"
    }

    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<GatewayInvoice, GatewayError> {
        let body =
            CreateInvoiceBody { amount: to_major_units(request.amount), user_id: request.account_id, order_id: &request.order_token };
        let response = self.client.post(self.url("create_invoice")).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::InvalidResponse(format!("{status}: {text}")));
        }
        let created = response.json::<CreateInvoiceResponse>().await?;
        debug!("💳️ Mock provider created invoice {} for order token {}", created.invoice_id, request.order_token);
        let details = serde_json::json!({ "invoice_id": created.invoice_id, "pay_url": created.pay_url });
        Ok(GatewayInvoice { gateway_invoice_id: created.invoice_id, pay_url: created.pay_url, details })
    }

    async fn handle_webhook(&self, notification: &WebhookNotification) -> Result<WebhookResult, GatewayError> {
        self.verify_signature(notification)?;
        let body: WebhookBody =
            serde_json::from_slice(&notification.body).map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;
        let mut status = parse_status(&body.status);
        if let Some(event) = body.event.as_deref() {
            if status == GatewayPaymentStatus::Completed && event != COMPLETED_EVENT {
                debug!("💳️ Mock provider sent a completed status with event {event}. Treating as pending");
                status = GatewayPaymentStatus::Pending;
            }
        }
        Ok(WebhookResult {
            order_token: body.order_id,
            gateway_invoice_id: body.invoice_id,
            amount: body.amount,
            status,
        })
    }

    async fn invoice_status(&self, gateway_invoice_id: &str) -> Result<GatewayPaymentStatus, GatewayError> {
        let response = self.client.get(self.url(&format!("status/{gateway_invoice_id}"))).send().await?;
        if !response.status().is_success() {
            return Err(GatewayError::InvalidResponse(format!("status query returned {}", response.status())));
        }
        let status = response.json::<StatusResponse>().await?;
        Ok(parse_status(&status.status))
    }

    fn supports_polling(&self) -> bool {
        self.config.polling
    }
}
