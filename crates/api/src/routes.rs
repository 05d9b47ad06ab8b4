//! Route-Definitionen der Pager-API

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{self, calls, health, ws};
use crate::ApiState;

/// Erstellt den vollstaendigen Router (ohne Middleware-Schichten)
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/incoming-call",
            post(calls::anruf_einreichen)
                .get(calls::anruf_beschreibung)
                .fallback(handlers::nicht_gefunden),
        )
        .route(
            "/health",
            get(health::health).fallback(handlers::nicht_gefunden),
        )
        .route(
            "/ws",
            get(ws::ws_verbinden).fallback(handlers::nicht_gefunden),
        )
        .fallback(handlers::nicht_gefunden)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use pager_core::CallEvent;
    use pager_observability::PagerMetrics;
    use pager_relay::{AlarmVerteiler, RelayConfig, RelayState};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::watch;
    use tower::ServiceExt;

    /// Zaehlt, wie oft die Intake an den Verteiler weiterreicht
    #[derive(Default)]
    struct ZaehlenderVerteiler {
        aufrufe: AtomicUsize,
    }

    impl AlarmVerteiler for ZaehlenderVerteiler {
        fn verteilen(&self, _event: &CallEvent) -> usize {
            self.aufrufe.fetch_add(1, Ordering::SeqCst);
            7
        }
    }

    fn state_mit_verteiler(verteiler: Arc<ZaehlenderVerteiler>) -> (ApiState, watch::Sender<bool>) {
        let relay = RelayState::mit_verteiler(
            RelayConfig::default(),
            PagerMetrics::neu().unwrap(),
            verteiler,
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        (ApiState::neu(relay, "WiFi Pager", shutdown_rx), shutdown_tx)
    }

    fn state() -> (ApiState, watch::Sender<bool>) {
        let relay = RelayState::neu(RelayConfig::default(), PagerMetrics::neu().unwrap());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        (ApiState::neu(relay, "WiFi Pager", shutdown_rx), shutdown_tx)
    }

    async fn anfrage(state: &ApiState, req: Request<Body>) -> (StatusCode, Value) {
        let antwort = router(state.clone()).oneshot(req).await.unwrap();
        let status = antwort.status();
        let body = axum::body::to_bytes(antwort.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn json_post(body: impl Into<Body>) -> Request<Body> {
        Request::post("/incoming-call")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    #[tokio::test]
    async fn einreichung_ohne_subscriber() {
        let (state, _tx) = state();
        let (status, json) = anfrage(&state, json_post(r#"{"number":"+15551234567"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json,
            json!({"success": true, "message": "Call alert broadcast", "clientsNotified": 0})
        );
        assert_eq!(state.relay.metrics.calls_total.get(), 1);
    }

    #[tokio::test]
    async fn einreichung_zaehlt_registrierte_subscriber() {
        let (state, _tx) = state();
        let (a, _rx_a) = state.relay.registry.registrieren("10.0.0.1:5000");
        let (_b, _rx_b) = state.relay.registry.registrieren("10.0.0.2:5000");

        let (status, json) = anfrage(&state, json_post(r#"{"number":"+1","name":"Alice"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["clientsNotified"], 2);
        assert_eq!(state.relay.registry.events_delivered(&a), Some(1));
    }

    #[tokio::test]
    async fn fehlende_nummer_ist_400() {
        let (state, _tx) = state();
        let (_id, mut rx) = state.relay.registry.registrieren("10.0.0.1:5000");

        let (status, json) = anfrage(&state, json_post(r#"{"name":"Alice"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Missing required field: number");
        assert_eq!(json["clientsNotified"], 0);
        assert!(rx.try_recv().is_err(), "kein Broadcast bei Validierungsfehler");
    }

    #[tokio::test]
    async fn validierungsfehler_erreichen_den_verteiler_nie() {
        let verteiler = Arc::new(ZaehlenderVerteiler::default());
        let (state, _tx) = state_mit_verteiler(verteiler.clone());

        for body in [r#"{}"#, r#"{"name":"Alice"}"#, r#"{"number":""}"#, "{kaputt", ""] {
            let (status, json) = anfrage(&state, json_post(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "Body: {body:?}");
            assert_eq!(json["clientsNotified"], 0);
        }
        assert_eq!(verteiler.aufrufe.load(Ordering::SeqCst), 0);

        let (status, json) = anfrage(&state, json_post(r#"{"number":"+1"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["clientsNotified"], 7);
        assert_eq!(verteiler.aufrufe.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn leerer_body_ist_400() {
        let (state, _tx) = state();
        let (status, json) = anfrage(&state, json_post(Body::empty())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Missing required field: number");
    }

    #[tokio::test]
    async fn kaputtes_json_ist_400() {
        let (state, _tx) = state();
        let (status, json) = anfrage(&state, json_post("{number: kaputt")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().starts_with("Invalid JSON"));
        assert_eq!(state.relay.metrics.calls_total.get(), 0);
    }

    #[tokio::test]
    async fn formular_body_wird_akzeptiert() {
        let (state, _tx) = state();
        let (_id, mut rx) = state.relay.registry.registrieren("10.0.0.1:5000");

        let req = Request::post("/incoming-call")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("number=%2B4930123456&name=Oma"))
            .unwrap();
        let (status, json) = anfrage(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["clientsNotified"], 1);

        let nachricht = rx.try_recv().unwrap();
        let json = serde_json::to_value(&*nachricht).unwrap();
        assert_eq!(json["data"]["number"], "+4930123456");
        assert_eq!(json["data"]["name"], "Oma");
    }

    #[tokio::test]
    async fn selbstbeschreibung() {
        let (state, _tx) = state();
        let req = Request::get("/incoming-call").body(Body::empty()).unwrap();
        let (status, json) = anfrage(&state, req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "WiFi Pager server is running");
        assert_eq!(json["method"], "POST");
        assert!(json["example"]["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn health_listet_verbundene_geraete() {
        let (state, _tx) = state();
        let (id, _rx) = state.relay.registry.registrieren("192.168.1.20:51234");

        let req = Request::get("/health").body(Body::empty()).unwrap();
        let (status, json) = anfrage(&state, req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["clients"], 1);
        assert!(json["uptime"].as_f64().unwrap() >= 0.0);
        let geraet = &json["connectedDevices"][0];
        assert_eq!(geraet["id"], serde_json::to_value(id).unwrap());
        assert_eq!(geraet["remoteAddress"], "192.168.1.20:51234");
        assert_eq!(geraet["eventsDelivered"], 0);
    }

    #[tokio::test]
    async fn unbekannte_route_ist_404() {
        let (state, _tx) = state();
        let req = Request::delete("/gibt-es-nicht").body(Body::empty()).unwrap();
        let (status, json) = anfrage(&state, req).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            json,
            json!({"error": "Not Found", "path": "/gibt-es-nicht", "method": "DELETE"})
        );
    }

    #[tokio::test]
    async fn falsche_methode_ist_404() {
        let (state, _tx) = state();
        let req = Request::put("/incoming-call").body(Body::empty()).unwrap();
        let (status, json) = anfrage(&state, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["method"], "PUT");
    }

    #[tokio::test]
    async fn ws_ohne_upgrade_wird_abgelehnt() {
        let (state, _tx) = state();
        let antwort = router(state.clone())
            .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(antwort.status().is_client_error());
        assert_eq!(state.relay.registry.anzahl(), 0);
    }
}
