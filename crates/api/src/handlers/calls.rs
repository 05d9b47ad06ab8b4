//! Handler fuer `/incoming-call`

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequest, Request, State},
    http::header::CONTENT_TYPE,
    response::Json,
    Form,
};
use pager_core::jetzt_iso;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::{ApiError, ApiState};

/// Untypisierte Einreichung aus JSON- oder Formular-Body
///
/// Ein leerer Body ergibt ein leeres Objekt, damit die Intake den Fehler
/// als fehlende Rufnummer meldet.
#[derive(Debug)]
pub struct Einreichung(pub Value);

#[async_trait]
impl<S> FromRequest<S> for Einreichung
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let ist_formular = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if ist_formular {
            let Form(felder) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::Validierung(e.body_text()))?;
            let objekt: Map<String, Value> = felder
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            return Ok(Self(Value::Object(objekt)));
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::Validierung(e.body_text()))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(Value::Object(Map::new())));
        }
        serde_json::from_slice(&body)
            .map(Self)
            .map_err(|e| ApiError::Validierung(format!("Invalid JSON: {e}")))
    }
}

/// POST /incoming-call
pub async fn anruf_einreichen(
    State(state): State<ApiState>,
    Einreichung(nutzlast): Einreichung,
) -> Result<Json<Value>, ApiError> {
    let bestaetigung = state.relay.intake.annehmen(&nutzlast)?;
    Ok(Json(json!({
        "success": true,
        "message": "Call alert broadcast",
        "clientsNotified": bestaetigung.clients_notified
    })))
}

/// GET /incoming-call
pub async fn anruf_beschreibung(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "message": format!("{} server is running", state.server_name),
        "method": "POST",
        "example": {
            "number": "+1234567890",
            "name": "John Doe",
            "timestamp": jetzt_iso()
        }
    }))
}
