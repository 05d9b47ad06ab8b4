//! HTTP-Handler

pub mod calls;
pub mod health;
pub mod ws;

use axum::{
    http::{Method, StatusCode, Uri},
    response::Json,
};
use serde_json::{json, Value};

/// Fallback fuer unbekannte Pfade und Methoden
pub async fn nicht_gefunden(methode: Method, uri: Uri) -> (StatusCode, Json<Value>) {
    tracing::debug!(method = %methode, path = %uri.path(), "Unbekannte Route");
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "path": uri.path(),
            "method": methode.as_str()
        })),
    )
}
