//! An in-process [`PaymentGateway`] whose behaviour is controlled by the test.
//!
//! Webhook bodies are JSON objects of the form `{"order_token", "gateway_invoice_id", "amount", "status"}` with the
//! amount in minor units.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::Money,
    gateways::{
        GatewayError,
        GatewayInvoice,
        GatewayPaymentStatus,
        InvoiceRequest,
        PaymentGateway,
        WebhookNotification,
        WebhookResult,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateBehaviour {
    Succeed,
    Fail,
    /// Sleep for this long before succeeding
    Stall(Duration),
}

#[derive(Debug, Default)]
struct State {
    statuses: HashMap<String, GatewayPaymentStatus>,
    created: Vec<InvoiceRequest>,
}

#[derive(Debug, Clone)]
pub struct ScriptedGateway {
    name: String,
    display_name: String,
    polling: bool,
    behaviour: Arc<Mutex<CreateBehaviour>>,
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedWebhook {
    pub order_token: String,
    pub gateway_invoice_id: String,
    pub amount: Money,
    pub status: GatewayPaymentStatus,
}

impl ScriptedWebhook {
    pub fn completed(order_token: &str, gateway_invoice_id: &str, amount: Money) -> Self {
        Self {
            order_token: order_token.to_string(),
            gateway_invoice_id: gateway_invoice_id.to_string(),
            amount,
            status: GatewayPaymentStatus::Completed,
        }
    }

    pub fn to_notification(&self) -> WebhookNotification {
        WebhookNotification::new(serde_json::to_vec(self).unwrap_or_default())
    }
}

impl ScriptedGateway {
    pub fn new(name: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            polling: false,
            behaviour: Arc::new(Mutex::new(CreateBehaviour::Succeed)),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn with_polling(mut self) -> Self {
        self.polling = true;
        self
    }

    /// The external invoice id this gateway assigns to an order token.
    pub fn invoice_id_for(order_token: &str) -> String {
        format!("ext-{order_token}")
    }

    pub fn set_behaviour(&self, behaviour: CreateBehaviour) {
        *self.behaviour.lock().unwrap() = behaviour;
    }

    /// Sets the status reported by [`PaymentGateway::invoice_status`] for an external invoice.
    pub fn set_status(&self, gateway_invoice_id: &str, status: GatewayPaymentStatus) {
        self.state.lock().unwrap().statuses.insert(gateway_invoice_id.to_string(), status);
    }

    pub fn created_count(&self) -> usize {
        self.state.lock().unwrap().created.len()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<GatewayInvoice, GatewayError> {
        let behaviour = *self.behaviour.lock().unwrap();
        match behaviour {
            CreateBehaviour::Fail => return Err(GatewayError::Transport("connection refused".into())),
            CreateBehaviour::Stall(delay) => tokio::time::sleep(delay).await,
            CreateBehaviour::Succeed => {},
        }
        let id = Self::invoice_id_for(&request.order_token);
        {
            let mut state = self.state.lock().unwrap();
            state.created.push(request.clone());
            state.statuses.insert(id.clone(), GatewayPaymentStatus::Pending);
        }
        let pay_url = Some(format!("https://pay.example/{id}"));
        Ok(GatewayInvoice { gateway_invoice_id: id, pay_url, details: serde_json::Value::Null })
    }

    async fn handle_webhook(&self, notification: &WebhookNotification) -> Result<WebhookResult, GatewayError> {
        let body: ScriptedWebhook =
            serde_json::from_slice(&notification.body).map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;
        Ok(WebhookResult {
            order_token: body.order_token,
            gateway_invoice_id: body.gateway_invoice_id,
            amount: body.amount,
            status: body.status,
        })
    }

    async fn invoice_status(&self, gateway_invoice_id: &str) -> Result<GatewayPaymentStatus, GatewayError> {
        self.state
            .lock()
            .unwrap()
            .statuses
            .get(gateway_invoice_id)
            .copied()
            .ok_or_else(|| GatewayError::InvalidResponse(format!("Unknown invoice {gateway_invoice_id}")))
    }

    fn supports_polling(&self) -> bool {
        self.polling
    }
}
