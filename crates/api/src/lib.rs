//! pager-api – HTTP- und WebSocket-Schnittstelle des WiFi-Pagers
//!
//! ```text
//! POST /incoming-call   Anruf vom Android-Geraet einreichen
//! GET  /incoming-call   Selbstbeschreibung mit Beispiel-Nutzlast
//! GET  /health          Diagnose: Uptime, verbundene Web-Pager
//! GET  /ws              WebSocket fuer Web-Pager (call-alert, ping/pong)
//! ```

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

use pager_relay::RelayState;
use std::sync::Arc;
use tokio::sync::watch;

pub use error::ApiError;
pub use routes::router;
pub use server::{ApiServer, ApiServerKonfig};

/// Axum-State der Pager-API
#[derive(Clone)]
pub struct ApiState {
    pub relay: Arc<RelayState>,
    /// Anzeigename des Servers (Selbstbeschreibung)
    pub server_name: Arc<str>,
    /// Shutdown-Signal fuer offene WebSocket-Verbindungen
    pub shutdown_rx: watch::Receiver<bool>,
}

impl ApiState {
    pub fn neu(
        relay: Arc<RelayState>,
        server_name: impl Into<Arc<str>>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            relay,
            server_name: server_name.into(),
            shutdown_rx,
        }
    }
}
