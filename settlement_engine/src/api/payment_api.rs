use std::{fmt::Debug, sync::Arc, time::Duration};

use log::*;
use uuid::Uuid;

use crate::{
    api::payment_objects::{CreatedInvoice, GatewayInfo, PollSummary, WebhookOutcome},
    db_types::{Money, NewInvoice, PaymentInvoice},
    events::{DepositSettledEvent, EventProducers},
    gateways::{
        GatewayError,
        GatewayPaymentStatus,
        GatewayRegistry,
        InvoiceRequest,
        PaymentGateway,
        WebhookNotification,
    },
    traits::{InvoiceSettlement, SettlementDatabase, SettlementError, SettlementOutcome},
};

pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// `PaymentApi` drives payment invoices from creation to settlement.
///
/// An invoice is created locally only after the gateway has accepted it, and is keyed by a freshly generated order
/// token. Gateways report payment through webhooks (or are polled), and each completed payment is credited exactly
/// once no matter how many times it is reported.
pub struct PaymentApi<B> {
    db: B,
    gateways: GatewayRegistry,
    producers: EventProducers,
    gateway_timeout: Duration,
}

impl<B> Debug for PaymentApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentApi ({:?})", self.gateways)
    }
}

impl<B> PaymentApi<B> {
    pub fn new(db: B, gateways: GatewayRegistry, producers: EventProducers) -> Self {
        Self { db, gateways, producers, gateway_timeout: DEFAULT_GATEWAY_TIMEOUT }
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    pub fn gateways(&self) -> &GatewayRegistry {
        &self.gateways
    }

    pub fn available_gateways(&self) -> Vec<GatewayInfo> {
        let mut result = self
            .gateways
            .iter()
            .map(|g| GatewayInfo {
                name: g.name().to_string(),
                display_name: g.display_name().to_string(),
                supports_polling: g.supports_polling(),
            })
            .collect::<Vec<_>>();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        result
    }
}

impl<B> PaymentApi<B>
where B: SettlementDatabase
{
    /// Opens an invoice for `amount` at the named gateway.
    ///
    /// If the gateway call fails or times out, a `failed` invoice is recorded under the new order token and the
    /// error is returned. If the gateway succeeds but the invoice cannot be saved, the external invoice is orphaned.
    /// This is logged at error level for manual reconciliation.
    pub async fn create_invoice(
        &self,
        account_id: i64,
        gateway_name: &str,
        amount: Money,
    ) -> Result<CreatedInvoice, SettlementError> {
        if !amount.is_positive() {
            return Err(SettlementError::Validation(format!("Invoice amount must be positive, not {amount}")));
        }
        let gateway = self
            .gateways
            .get(gateway_name)
            .ok_or_else(|| SettlementError::Validation(format!("Invalid payment gateway: {gateway_name}")))?;
        match self.db.fetch_account(account_id).await? {
            Some(account) if !account.is_deleted => {},
            _ => return Err(SettlementError::not_found("account", account_id)),
        }
        let order_token = Uuid::new_v4().to_string();
        let request = InvoiceRequest { amount, account_id, order_token: order_token.clone() };
        trace!("💳️ Requesting invoice {order_token} for {amount} from {gateway_name}");
        let created = match tokio::time::timeout(self.gateway_timeout, gateway.create_invoice(&request)).await {
            Ok(Ok(created)) => created,
            Ok(Err(e)) => {
                warn!("💳️ {gateway_name} could not create invoice {order_token}. {e}");
                self.record_failed_invoice(&request, gateway_name).await;
                return Err(e.into());
            },
            Err(_) => {
                let secs = self.gateway_timeout.as_secs();
                warn!("💳️ {gateway_name} did not respond within {secs}s for invoice {order_token}");
                self.record_failed_invoice(&request, gateway_name).await;
                return Err(GatewayError::Timeout(secs).into());
            },
        };
        let gateway_invoice_id = created.gateway_invoice_id.clone();
        let invoice = NewInvoice::pending(account_id, amount, gateway_name.to_string(), order_token.clone())
            .with_gateway_invoice(gateway_invoice_id.as_str(), created.pay_url.clone());
        let invoice = self.db.insert_invoice(invoice).await.map_err(|e| {
            error!(
                "💳️ ORPHANED INVOICE. {gateway_name} created invoice {gateway_invoice_id} for {amount} (order token \
                 {order_token}, account #{account_id}) but it could not be saved. Manual reconciliation is required. {e}"
            );
            e
        })?;
        info!("💳️ Invoice {order_token} for {amount} opened at {gateway_name} as {gateway_invoice_id}");
        Ok(CreatedInvoice { invoice, pay_url: created.pay_url, details: created.details })
    }

    async fn record_failed_invoice(&self, request: &InvoiceRequest, gateway_name: &str) {
        let failed = NewInvoice::failed(request.account_id, request.amount, gateway_name.to_string(), request.order_token.clone());
        if let Err(e) = self.db.insert_invoice(failed).await {
            error!("💳️ Could not record failed invoice {}. {e}", request.order_token);
        }
    }

    /// Processes a webhook delivery from the named gateway.
    ///
    /// Notifications that do not report a completed payment are acknowledged without any change. Completed
    /// payments are settled at most once; repeats return [`WebhookOutcome::AlreadySettled`].
    pub async fn handle_webhook(
        &self,
        gateway_name: &str,
        notification: &WebhookNotification,
    ) -> Result<WebhookOutcome, SettlementError> {
        let gateway = self.gateways.get(gateway_name).ok_or_else(|| SettlementError::not_found("payment gateway", gateway_name))?;
        let result = gateway.handle_webhook(notification).await.map_err(|e| {
            warn!("💳️ Rejected webhook from {gateway_name}. {e}");
            e
        })?;
        if result.status != GatewayPaymentStatus::Completed {
            debug!("💳️ {gateway_name} reports invoice {} as {:?}. No action taken", result.order_token, result.status);
            return Ok(WebhookOutcome::Ignored { order_token: result.order_token, status: result.status });
        }
        let outcome =
            self.settle(gateway.as_ref(), &result.order_token, Some(result.gateway_invoice_id), Some(result.amount)).await?;
        Ok(outcome.into())
    }

    async fn settle(
        &self,
        gateway: &dyn PaymentGateway,
        order_token: &str,
        gateway_invoice_id: Option<String>,
        reported_amount: Option<Money>,
    ) -> Result<SettlementOutcome, SettlementError> {
        let settlement = InvoiceSettlement {
            order_token: order_token.to_string(),
            gateway: gateway.name().to_string(),
            gateway_invoice_id,
            display_name: gateway.display_name().to_string(),
        };
        let outcome = self.db.settle_invoice(settlement).await?;
        if let SettlementOutcome::Credited { invoice, deposit, account } = &outcome {
            if let Some(reported) = reported_amount.filter(|a| *a != invoice.amount) {
                warn!(
                    "💳️ {} reported {reported} for invoice {order_token}, but the invoice was for {}. The invoice \
                     amount was credited",
                    gateway.name(),
                    invoice.amount
                );
            }
            let event =
                DepositSettledEvent { invoice: invoice.clone(), deposit: deposit.clone(), account: account.clone() };
            self.producers.publish_deposit_settled(event).await;
        }
        Ok(outcome)
    }

    /// Asks each polling-capable gateway about its pending invoices and settles or fails them accordingly.
    pub async fn poll_pending_invoices(&self) -> Result<PollSummary, SettlementError> {
        let pending = self.db.fetch_pending_invoices().await?;
        let mut summary = PollSummary::default();
        for invoice in pending {
            let Some(gateway) = self.polling_gateway(&invoice) else {
                continue;
            };
            let Some(gateway_invoice_id) = invoice.gateway_invoice_id.clone() else {
                continue;
            };
            summary.checked += 1;
            match self.poll_invoice(&gateway, &invoice, gateway_invoice_id).await {
                Ok(GatewayPaymentStatus::Completed) => summary.settled += 1,
                Ok(GatewayPaymentStatus::Failed) => summary.failed += 1,
                Ok(GatewayPaymentStatus::Pending) => summary.pending += 1,
                Err(e) => {
                    warn!("💳️ Could not poll invoice {}. {e}", invoice.order_token);
                    summary.errors += 1;
                },
            }
        }
        Ok(summary)
    }

    fn polling_gateway(&self, invoice: &PaymentInvoice) -> Option<Arc<dyn PaymentGateway>> {
        self.gateways.get(&invoice.gateway).filter(|g| g.supports_polling())
    }

    async fn poll_invoice(
        &self,
        gateway: &Arc<dyn PaymentGateway>,
        invoice: &PaymentInvoice,
        gateway_invoice_id: String,
    ) -> Result<GatewayPaymentStatus, SettlementError> {
        let status = tokio::time::timeout(self.gateway_timeout, gateway.invoice_status(&gateway_invoice_id))
            .await
            .map_err(|_| GatewayError::Timeout(self.gateway_timeout.as_secs()))??;
        match status {
            GatewayPaymentStatus::Completed => {
                self.settle(gateway.as_ref(), &invoice.order_token, Some(gateway_invoice_id), None).await?;
            },
            GatewayPaymentStatus::Failed => {
                self.db.fail_invoice(&invoice.order_token).await?;
                info!("💳️ {} reports invoice {} as failed", gateway.name(), invoice.order_token);
            },
            GatewayPaymentStatus::Pending => {},
        }
        Ok(status)
    }

    pub async fn set_invoice_message_id(&self, order_token: &str, message_id: i64) -> Result<PaymentInvoice, SettlementError> {
        self.db.set_invoice_message_id(order_token, message_id).await
    }

    pub async fn fetch_invoice(&self, order_token: &str) -> Result<Option<PaymentInvoice>, SettlementError> {
        Ok(self.db.fetch_invoice(order_token).await?)
    }
}
