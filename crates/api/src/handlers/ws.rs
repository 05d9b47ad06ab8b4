//! WebSocket-Endpunkt fuer die Web-Pager

use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, State},
    response::Response,
};
use futures::StreamExt;
use pager_relay::RelayError;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::ApiState;

/// GET /ws – Upgrade auf WebSocket, danach ein Task pro Verbindung
pub async fn ws_verbinden(
    State(state): State<ApiState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let peer = connect_info
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unbekannt".to_string());
    let relay = Arc::clone(&state.relay);
    let shutdown_rx = state.shutdown_rx.clone();
    let fehler_peer = peer.clone();

    upgrade
        .on_failed_upgrade(move |e: axum::Error| {
            // Nie registriert, nur protokolliert
            let fehler = RelayError::transport(e.to_string());
            tracing::warn!(peer = %fehler_peer, fehler = %fehler, "WebSocket-Handshake fehlgeschlagen");
        })
        .on_upgrade(move |socket| async move {
            let (sink, stream) = socket.split();
            let ende = relay
                .verbindung(peer.clone())
                .verarbeiten(sink, stream, shutdown_rx)
                .await;
            tracing::debug!(peer = %peer, zustand = ?ende, "Verbindungs-Task beendet");
        })
}
