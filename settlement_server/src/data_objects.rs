use std::fmt::Display;

use serde::{Deserialize, Serialize};
use settlement_engine::db_types::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertAccountRequest {
    pub external_id: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// Body of `POST /api/invoices`. The amount is in minor units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceParams {
    pub external_account_id: String,
    pub gateway: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositParams {
    pub amount: Money,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MessageIdParams {
    pub message_id: i64,
}
