//! Axum HTTP-Server fuer die Pager-API

use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;

use anyhow::Result;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::Router;
use pager_observability::{request_timing_layer, timing_middleware, PagerMetrics};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

use crate::{routes::router, ApiState};

/// API-Server-Konfiguration
#[derive(Debug, Clone, Default)]
pub struct ApiServerKonfig {
    /// Erlaubte CORS-Origins. Leer = alle Origins erlaubt.
    pub cors_origins: Vec<String>,
}

/// Axum HTTP-Server fuer Intake, Diagnose und WebSocket
pub struct ApiServer {
    konfig: ApiServerKonfig,
}

impl ApiServer {
    pub fn neu(konfig: ApiServerKonfig) -> Self {
        Self { konfig }
    }

    /// Router mit allen Schichten (CORS, Tracing, Timing, Panic-Grenze)
    pub fn app(&self, state: ApiState) -> Router {
        let metriken = state.relay.metrics.clone();
        self.schichten(router(state), metriken)
    }

    fn schichten(&self, app: Router, metriken: PagerMetrics) -> Router {
        app.layer(CatchPanicLayer::custom(panik_antwort))
            .layer(middleware::from_fn_with_state(metriken, timing_middleware))
            .layer(request_timing_layer())
            .layer(self.cors())
    }

    fn cors(&self) -> CorsLayer {
        // Entweder spezifische Origins oder Any
        if self.konfig.cors_origins.is_empty() {
            return CorsLayer::permissive();
        }
        let origins: Vec<HeaderValue> = self
            .konfig
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(tower_http::cors::Any)
    }

    /// Laeuft auf einem bereits gebundenen Listener bis `shutdown` endet
    pub async fn mit_listener(
        self,
        listener: TcpListener,
        state: ApiState,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let addr = listener.local_addr()?;
        let app = self.app(state);
        tracing::info!(addr = %addr, "Pager-API gestartet");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        tracing::info!(addr = %addr, "Pager-API beendet");
        Ok(())
    }
}

/// Wandelt einen Panic in einem Handler in eine 500-Antwort
fn panik_antwort(panik: Box<dyn Any + Send + 'static>) -> Response {
    let grund = if let Some(s) = panik.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panik.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "Interner Fehler".to_string()
    };
    tracing::error!(fehler = %grund, "Panic im Handler abgefangen");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "error": "Internal server error",
            "clientsNotified": 0
        })),
    )
        .into_response()
}
