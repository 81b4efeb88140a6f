// Mapping of pipeline errors onto HTTP responses
use crate::application::document_store::StoreError;
use crate::domain::date_range::DateRangeError;
use crate::infrastructure::csv_export::ExportError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid date range: {0}")]
    BadRange(#[from] DateRangeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("unknown session '{0}'")]
    SessionNotFound(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRange(_) => StatusCode::BAD_REQUEST,
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(e) | ApiError::Export(ExportError::Store(e)) => store_status(e),
            ApiError::Export(ExportError::NoRows) => StatusCode::NO_CONTENT,
            ApiError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn store_status(error: &StoreError) -> StatusCode {
    if error.is_contract_violation() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::BAD_GATEWAY
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match status {
            StatusCode::NO_CONTENT => {
                tracing::warn!("Export skipped: {}", self);
                return status.into_response();
            }
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
                tracing::debug!("Rejected request: {}", self)
            }
            _ => tracing::error!("Request failed: {}", self),
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
