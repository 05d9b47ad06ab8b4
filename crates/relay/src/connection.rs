//! Subscriber-Verbindung – Eine WebSocket-Verbindung eines Web-Pagers
//!
//! Jede Verbindung laeuft in einem eigenen tokio-Task. Der Task registriert
//! den Subscriber, schreibt die Send-Queue auf den Socket, beantwortet
//! Lebenszeichen und raeumt beim Ende die Registry auf.
//!
//! ## State Machine
//! ```text
//! Verbindend -> Registriert -> Trennend -> Entfernt
//!                    |                        ^
//!                    +------> Veraltet -------+
//! ```
//! - `Trennend`: Client hat geschlossen oder der Server faehrt herunter
//! - `Veraltet`: Lebenszeichen verpasst, Lesefehler oder Zustellung gescheitert
//!
//! ## Keepalive
//! - Server sendet alle `keepalive_intervall` einen WebSocket-Ping
//! - Jeder eingehende Frame zaehlt als Lebenszeichen
//! - Der `LivenessMonitor` entfernt Subscriber ohne Lebenszeichen; der Task
//!   bemerkt das am Ende seiner Send-Queue

use axum::extract::ws::{close_code, CloseFrame, Message};
use futures::{Sink, SinkExt, Stream, StreamExt};
use pager_core::{jetzt_iso, ClientNachricht, ServerNachricht, SubscriberId};
use std::fmt::Display;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};

use crate::error::DeliveryError;
use crate::registry::{ConnectionRegistry, EntfernGrund};

// ---------------------------------------------------------------------------
// Verbindungszustand
// ---------------------------------------------------------------------------

/// Zustand einer Subscriber-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsZustand {
    /// Handshake laeuft, noch nicht registriert
    Verbindend,
    /// In der Registry, erhaelt Broadcasts
    Registriert,
    /// Regulaeres Schliessen
    Trennend,
    /// Als tot betrachtet
    Veraltet,
    /// Aus der Registry entfernt (terminal)
    Entfernt,
}

/// Ereignisse, die einen Zustandswechsel ausloesen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZustandsEreignis {
    HandshakeAbgeschlossen,
    Geschlossen,
    LebenszeichenVerpasst,
    ZustellungFehlgeschlagen,
    /// Registry hat den Eintrag entfernt (Monitor oder Broadcast-Core)
    AusRegistryEntfernt,
    Aufgeraeumt,
}

impl VerbindungsZustand {
    /// Folgezustand fuer ein Ereignis, `None` wenn der Wechsel nicht erlaubt ist
    pub fn uebergang(self, ereignis: ZustandsEreignis) -> Option<Self> {
        use VerbindungsZustand::*;
        use ZustandsEreignis::*;

        match (self, ereignis) {
            (Verbindend, HandshakeAbgeschlossen) => Some(Registriert),
            (Registriert, Geschlossen) => Some(Trennend),
            (
                Registriert,
                LebenszeichenVerpasst | ZustellungFehlgeschlagen | AusRegistryEntfernt,
            ) => Some(Veraltet),
            (Trennend | Veraltet, Aufgeraeumt) => Some(Entfernt),
            _ => None,
        }
    }

    pub fn ist_terminal(self) -> bool {
        self == Self::Entfernt
    }
}

// ---------------------------------------------------------------------------
// SubscriberVerbindung
// ---------------------------------------------------------------------------

/// Zeitlimits einer Subscriber-Verbindung
#[derive(Debug, Clone, Copy)]
pub struct VerbindungsKonfig {
    /// Abstand der Server-Pings
    pub keepalive_intervall: Duration,
    /// Obergrenze fuer einen einzelnen Schreibvorgang
    pub schreib_timeout: Duration,
}

/// Verarbeitet eine einzelne Subscriber-Verbindung
pub struct SubscriberVerbindung {
    registry: ConnectionRegistry,
    konfig: VerbindungsKonfig,
    peer: String,
    zustand: VerbindungsZustand,
}

impl SubscriberVerbindung {
    pub fn neu(
        registry: ConnectionRegistry,
        konfig: VerbindungsKonfig,
        peer: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            konfig,
            peer: peer.into(),
            zustand: VerbindungsZustand::Verbindend,
        }
    }

    /// Startet die Verarbeitungsschleife auf einem bereits aufgebauten Socket
    ///
    /// Laeuft bis der Client schliesst, der Subscriber als veraltet gilt oder
    /// ein Shutdown-Signal eingeht. Gibt den Zustand zurueck, aus dem die
    /// Verbindung entfernt wurde (`Trennend` oder `Veraltet`).
    pub async fn verarbeiten<Si, St, E>(
        mut self,
        mut sink: Si,
        mut stream: St,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> VerbindungsZustand
    where
        Si: Sink<Message> + Unpin,
        Si::Error: Display,
        St: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let (id, mut queue) = self.registry.registrieren(self.peer.clone());
        self.wechseln(ZustandsEreignis::HandshakeAbgeschlossen);

        let intervall = self.konfig.keepalive_intervall;
        let mut keepalive = interval_at(Instant::now() + intervall, intervall);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let ereignis = loop {
            tokio::select! {
                nachricht = queue.recv() => {
                    let Some(nachricht) = nachricht else {
                        tracing::debug!(subscriber_id = %id, "Send-Queue beendet");
                        break ZustandsEreignis::AusRegistryEntfernt;
                    };
                    if let Err(fehler) = self.json_senden(&mut sink, &nachricht).await {
                        tracing::warn!(subscriber_id = %id, fehler = %fehler, "Schreiben fehlgeschlagen");
                        break ZustandsEreignis::ZustellungFehlgeschlagen;
                    }
                }

                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            self.registry.lebenszeichen(&id);
                            if let Err(fehler) = self.text_verarbeiten(&mut sink, id, &text).await {
                                tracing::warn!(subscriber_id = %id, fehler = %fehler, "Pong fehlgeschlagen");
                                break ZustandsEreignis::ZustellungFehlgeschlagen;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::info!(subscriber_id = %id, peer = %self.peer, "Verbindung vom Client getrennt");
                            break ZustandsEreignis::Geschlossen;
                        }
                        Some(Ok(_)) => {
                            self.registry.lebenszeichen(&id);
                        }
                        Some(Err(fehler)) => {
                            tracing::warn!(subscriber_id = %id, fehler = %fehler, "Frame-Lesefehler");
                            break ZustandsEreignis::LebenszeichenVerpasst;
                        }
                    }
                }

                _ = keepalive.tick() => {
                    if let Err(fehler) = self.senden(&mut sink, Message::Ping(Vec::new())).await {
                        tracing::warn!(subscriber_id = %id, fehler = %fehler, "Keepalive-Ping fehlgeschlagen");
                        break ZustandsEreignis::ZustellungFehlgeschlagen;
                    }
                }

                _ = shutdown_rx.changed() => {
                    tracing::debug!(subscriber_id = %id, "Shutdown-Signal empfangen");
                    let abschied = Message::Close(Some(CloseFrame {
                        code: close_code::AWAY,
                        reason: "Server wird beendet".into(),
                    }));
                    let _ = self.senden(&mut sink, abschied).await;
                    break ZustandsEreignis::Geschlossen;
                }
            }
        };

        self.wechseln(ereignis);
        let ende = self.zustand;
        let grund = if ende == VerbindungsZustand::Trennend {
            EntfernGrund::Getrennt
        } else {
            EntfernGrund::Veraltet
        };
        self.registry.entfernen(&id, grund);
        self.wechseln(ZustandsEreignis::Aufgeraeumt);

        let _ = timeout(self.konfig.schreib_timeout, sink.close()).await;
        ende
    }

    fn wechseln(&mut self, ereignis: ZustandsEreignis) {
        match self.zustand.uebergang(ereignis) {
            Some(neu) => {
                tracing::trace!(peer = %self.peer, von = ?self.zustand, nach = ?neu, "Zustandswechsel");
                self.zustand = neu;
            }
            None => {
                tracing::debug!(peer = %self.peer, zustand = ?self.zustand, ereignis = ?ereignis, "Ungueltiger Zustandswechsel ignoriert");
            }
        }
    }

    async fn text_verarbeiten<Si>(
        &self,
        sink: &mut Si,
        id: SubscriberId,
        text: &str,
    ) -> Result<(), DeliveryError>
    where
        Si: Sink<Message> + Unpin,
        Si::Error: Display,
    {
        match ClientNachricht::parsen(text) {
            Some(ClientNachricht::Ping) => {
                let pong = ServerNachricht::Pong {
                    timestamp: jetzt_iso(),
                };
                self.json_senden(sink, &pong).await
            }
            None => {
                tracing::debug!(subscriber_id = %id, laenge = text.len(), "Unbekannte Client-Nachricht ignoriert");
                Ok(())
            }
        }
    }

    async fn json_senden<Si>(&self, sink: &mut Si, nachricht: &ServerNachricht) -> Result<(), DeliveryError>
    where
        Si: Sink<Message> + Unpin,
        Si::Error: Display,
    {
        let json = nachricht
            .als_json()
            .map_err(|e| DeliveryError::Senden(e.to_string()))?;
        self.senden(sink, Message::Text(json)).await
    }

    async fn senden<Si>(&self, sink: &mut Si, nachricht: Message) -> Result<(), DeliveryError>
    where
        Si: Sink<Message> + Unpin,
        Si::Error: Display,
    {
        match timeout(self.konfig.schreib_timeout, sink.send(nachricht)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DeliveryError::Senden(e.to_string())),
            Err(_) => Err(DeliveryError::Timeout(self.konfig.schreib_timeout)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
