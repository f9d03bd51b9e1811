use serde::Serialize;

use crate::{
    db_types::{BalanceEntry, PaymentInvoice},
    gateways::GatewayPaymentStatus,
    traits::SettlementOutcome,
};

#[derive(Debug, Clone, Serialize)]
pub struct GatewayInfo {
    pub name: String,
    pub display_name: String,
    pub supports_polling: bool,
}

/// A freshly created invoice, along with what the customer needs to pay it.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedInvoice {
    pub invoice: PaymentInvoice,
    pub pay_url: Option<String>,
    pub details: serde_json::Value,
}

/// What happened to a webhook delivery.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// The notification did not report a completed payment. Nothing was changed.
    Ignored { order_token: String, status: GatewayPaymentStatus },
    /// The invoice was settled by this delivery.
    Credited { invoice: PaymentInvoice, deposit: BalanceEntry },
    /// The invoice had been settled by an earlier delivery. Nothing was changed.
    AlreadySettled { invoice: PaymentInvoice },
}

impl From<SettlementOutcome> for WebhookOutcome {
    fn from(outcome: SettlementOutcome) -> Self {
        match outcome {
            SettlementOutcome::Credited { invoice, deposit, .. } => WebhookOutcome::Credited { invoice, deposit },
            SettlementOutcome::AlreadySettled { invoice } => WebhookOutcome::AlreadySettled { invoice },
        }
    }
}

/// Summary of one pass over the pending invoices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollSummary {
    pub checked: usize,
    pub settled: usize,
    pub failed: usize,
    pub pending: usize,
    pub errors: usize,
}
