//! Tells the customer-facing service that a top-up has landed.
//!
//! The notifier is attached as an `on_deposit_settled` hook. It runs after the settlement has been committed, so a
//! failed notification is logged and otherwise ignored.
use std::sync::Arc;

use log::*;
use reqwest::Client;
use serde::Serialize;
use settlement_engine::{
    db_types::Money,
    events::{DepositSettledEvent, EventHooks},
};

use crate::{config::NotifierConfig, errors::ServerError};

#[derive(Debug, Clone, Serialize)]
pub struct DepositNotification {
    pub external_account_id: String,
    pub amount: Money,
    pub order_token: String,
    pub message_id: Option<i64>,
}

impl From<&DepositSettledEvent> for DepositNotification {
    fn from(event: &DepositSettledEvent) -> Self {
        Self {
            external_account_id: event.account.external_id.clone(),
            amount: event.deposit.amount,
            order_token: event.invoice.order_token.clone(),
            message_id: event.invoice.message_id,
        }
    }
}

#[derive(Clone)]
pub struct DepositNotifier {
    config: NotifierConfig,
    client: Client,
}

impl DepositNotifier {
    pub fn new(config: NotifierConfig) -> Result<Self, ServerError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServerError::InitializeError(format!("Could not create notification client. {e}")))?;
        Ok(Self { config, client })
    }

    pub async fn notify(&self, notification: &DepositNotification) -> Result<(), reqwest::Error> {
        self.client
            .post(&self.config.url)
            .header("X-API-KEY", self.config.api_key.reveal())
            .json(notification)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Registers this notifier as the deposit-settled hook.
    pub fn attach(self, hooks: &mut EventHooks) {
        let notifier = Arc::new(self);
        hooks.on_deposit_settled(move |event| {
            let notifier = Arc::clone(&notifier);
            Box::pin(async move {
                let notification = DepositNotification::from(&event);
                match notifier.notify(&notification).await {
                    Ok(()) => debug!("📬️ Deposit notification sent for invoice {}", notification.order_token),
                    Err(e) => warn!(
                        "📬️ Could not send deposit notification for invoice {} to {}. {e}",
                        notification.order_token, notifier.config.url
                    ),
                }
            })
        });
    }
}
