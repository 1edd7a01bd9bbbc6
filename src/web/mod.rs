//! HTTP facade over the asset ledger
//!
//! Routes keep the camelCase paths existing clients call (`/createAsset`,
//! `/updateAsset/:msisdn`, `/readAsset/:msisdn`, `/getAssetHistory/:msisdn`)
//! plus `/assetExists/:msisdn` and `/initLedger`.

pub mod routes;

use crate::core::LedgerError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

pub use routes::router;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug)]
pub enum WebError {
    Ledger(LedgerError),
    Input(String),
}

impl From<LedgerError> for WebError {
    fn from(err: LedgerError) -> Self {
        WebError::Ledger(err)
    }
}

impl WebError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            WebError::Ledger(LedgerError::AlreadyExists { .. }) => {
                (StatusCode::CONFLICT, "already_exists")
            }
            WebError::Ledger(LedgerError::NotFound { .. }) => (StatusCode::NOT_FOUND, "not_found"),
            WebError::Ledger(LedgerError::InvalidBalanceFormat { .. }) => {
                (StatusCode::BAD_REQUEST, "invalid_balance")
            }
            WebError::Ledger(LedgerError::CommitRejected { .. }) => {
                (StatusCode::CONFLICT, "commit_rejected")
            }
            WebError::Ledger(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ledger_error"),
            WebError::Input(_) => (StatusCode::UNPROCESSABLE_ENTITY, "input_error"),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match self {
            WebError::Ledger(err) => err.to_string(),
            WebError::Input(msg) => msg,
        };
        if status.is_server_error() {
            error!(%code, error = %message, "request failed");
        }

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, WebError>;
