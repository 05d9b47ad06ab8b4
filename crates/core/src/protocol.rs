//! WebSocket-Protokoll zwischen Relay und Web-Pagern
//!
//! Alle Nachrichten sind JSON-Textframes mit einem `event`-Tag:
//!
//! ```text
//! Server -> Client: {"event":"call-alert","data":{...}}
//!                   {"event":"pong","data":{"timestamp":"..."}}
//! Client -> Server: {"event":"ping"}
//! ```
//!
//! Unbekannte Client-Nachrichten werden ignoriert, nicht beantwortet.

use serde::{Deserialize, Serialize};

use crate::event::CallAlert;

/// Nachrichten vom Relay an einen Web-Pager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerNachricht {
    /// Eingehender Anruf
    CallAlert(CallAlert),
    /// Antwort auf ein Lebenszeichen des Clients
    Pong { timestamp: String },
}

impl ServerNachricht {
    /// Serialisiert die Nachricht als JSON-Text
    pub fn als_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Nachrichten von einem Web-Pager an den Relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientNachricht {
    /// Lebenszeichen, erwartet ein `pong`
    Ping,
}

impl ClientNachricht {
    /// Parst einen Textframe
    ///
    /// Akzeptiert neben der JSON-Form auch ein nacktes `ping`. Gibt `None`
    /// fuer alles Unbekannte zurueck.
    pub fn parsen(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("ping") {
            return Some(Self::Ping);
        }
        serde_json::from_str(text).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_alert_wird_mit_event_tag_serialisiert() {
        let nachricht = ServerNachricht::CallAlert(CallAlert {
            number: "+15551234567".into(),
            name: "+15551234567".into(),
            timestamp: "2024-02-19T10:30:45.000Z".into(),
            received_at: "2024-02-19T10:30:45.010Z".into(),
            clients_notified: 2,
        });

        let json: serde_json::Value =
            serde_json::from_str(&nachricht.als_json().unwrap()).unwrap();
        assert_eq!(json["event"], "call-alert");
        assert_eq!(json["data"]["number"], "+15551234567");
        assert_eq!(json["data"]["clientsNotified"], 2);
    }

    #[test]
    fn pong_traegt_zeitstempel() {
        let nachricht = ServerNachricht::Pong {
            timestamp: "2024-02-19T10:30:45.000Z".into(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&nachricht.als_json().unwrap()).unwrap();
        assert_eq!(json["event"], "pong");
        assert_eq!(json["data"]["timestamp"], "2024-02-19T10:30:45.000Z");
    }

    #[test]
    fn ping_json_und_nackt() {
        assert_eq!(
            ClientNachricht::parsen(r#"{"event":"ping"}"#),
            Some(ClientNachricht::Ping)
        );
        assert_eq!(ClientNachricht::parsen("ping"), Some(ClientNachricht::Ping));
        assert_eq!(ClientNachricht::parsen("  PING \n"), Some(ClientNachricht::Ping));
    }

    #[test]
    fn unbekannte_nachrichten_ergeben_none() {
        assert_eq!(ClientNachricht::parsen(r#"{"event":"subscribe"}"#), None);
        assert_eq!(ClientNachricht::parsen("hallo"), None);
        assert_eq!(ClientNachricht::parsen(""), None);
    }
}
