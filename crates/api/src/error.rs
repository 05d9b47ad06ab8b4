//! Fehlertypen der HTTP-Schnittstelle

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use pager_relay::RelayError;
use serde_json::json;
use thiserror::Error;

/// Fehler, die ein Intake-Handler an den Einreicher meldet
#[derive(Debug, Error)]
pub enum ApiError {
    /// Einreichung abgelehnt (400)
    #[error("{0}")]
    Validierung(String),

    /// Unerwarteter Fehler (500)
    #[error("{0}")]
    Intern(String),
}

impl ApiError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Validierung(_) => StatusCode::BAD_REQUEST,
            Self::Intern(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(fehler: RelayError) -> Self {
        match fehler {
            RelayError::Validierung(msg) => Self::Validierung(msg),
            andere => Self::Intern(andere.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if status.is_server_error() {
            tracing::error!(fehler = %self, "Einreichung fehlgeschlagen");
        }
        (
            status,
            Json(json!({
                "success": false,
                "error": self.to_string(),
                "clientsNotified": 0
            })),
        )
            .into_response()
    }
}
