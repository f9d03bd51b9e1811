use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use settlement_engine::{gateways::GatewayError, AccountApiError, SettlementError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    Settlement(#[from] SettlementError),
}

impl From<AccountApiError> for ServerError {
    fn from(e: AccountApiError) -> Self {
        Self::BackendError(e.to_string())
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Settlement(e) => match e {
                SettlementError::NotFound { .. } => StatusCode::NOT_FOUND,
                SettlementError::Validation(_) => StatusCode::BAD_REQUEST,
                SettlementError::OutOfStock(_) => StatusCode::UNPROCESSABLE_ENTITY,
                SettlementError::InsufficientBalance => StatusCode::UNPROCESSABLE_ENTITY,
                SettlementError::AlreadyExists(_) => StatusCode::CONFLICT,
                SettlementError::InvalidInvoiceTransition { .. } => StatusCode::CONFLICT,
                SettlementError::Gateway(GatewayError::InvalidSignature) => StatusCode::UNAUTHORIZED,
                SettlementError::Gateway(GatewayError::InvalidPayload(_)) => StatusCode::BAD_REQUEST,
                SettlementError::Gateway(_) => StatusCode::BAD_GATEWAY,
                SettlementError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
                SettlementError::Account(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!("💻️ Request failed. {self}");
            "An internal error occurred. Please try again later.".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": message }).to_string())
    }
}
