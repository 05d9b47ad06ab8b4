//! Anruf-Events
//!
//! Ein `CallEvent` entsteht in der Event-Intake aus einer Einreichung des
//! Android-Geraets und ist danach unveraenderlich. Der Broadcast-Core
//! verpackt es pro Verteilung in einen `CallAlert`, der zusaetzlich den
//! Empfangszeitpunkt und die Anzahl benachrichtigter Pager traegt.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Formatiert einen Zeitpunkt als ISO-8601 UTC mit Millisekunden
/// (`2024-02-19T10:30:45.123Z`)
pub fn iso_zeitstempel(zeit: DateTime<Utc>) -> String {
    zeit.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Aktuelle Serverzeit als ISO-8601-String
pub fn jetzt_iso() -> String {
    iso_zeitstempel(Utc::now())
}

/// Normalisiertes, eingehendes Anruf-Event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEvent {
    number: String,
    name: String,
    timestamp: String,
}

impl CallEvent {
    /// Erstellt ein Event aus bereits validierten Feldern
    ///
    /// Validierung und Default-Werte sind Aufgabe der Event-Intake; hier wird
    /// nur zusammengesetzt.
    pub fn neu(
        number: impl Into<String>,
        name: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            number: number.into(),
            name: name.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Rufnummer des Anrufers
    pub fn number(&self) -> &str {
        &self.number
    }

    /// Anzeigename (Kontaktname oder die Nummer selbst)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Zeitpunkt des Anrufs laut Produzent (oder Serverempfang)
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

/// Nutzlast der `call-alert`-Nachricht an die Web-Pager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAlert {
    pub number: String,
    pub name: String,
    pub timestamp: String,
    /// Zeitpunkt, zu dem der Relay das Event verteilt hat
    pub received_at: String,
    /// Anzahl Subscriber in der Momentaufnahme dieser Verteilung
    pub clients_notified: usize,
}

impl CallAlert {
    /// Baut den Alarm fuer eine Verteilung an `clients_notified` Pager
    pub fn aus_event(event: &CallEvent, received_at: String, clients_notified: usize) -> Self {
        Self {
            number: event.number.clone(),
            name: event.name.clone(),
            timestamp: event.timestamp.clone(),
            received_at,
            clients_notified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn zeitstempel_format_mit_millisekunden_und_z() {
        let zeit = Utc.with_ymd_and_hms(2024, 2, 19, 10, 30, 45).unwrap();
        assert_eq!(iso_zeitstempel(zeit), "2024-02-19T10:30:45.000Z");
    }

    #[test]
    fn jetzt_iso_ist_parsebar() {
        let s = jetzt_iso();
        let geparst = DateTime::parse_from_rfc3339(&s).expect("muss RFC 3339 sein");
        let abstand = Utc::now().signed_duration_since(geparst.with_timezone(&Utc));
        assert!(abstand.num_seconds().abs() < 5);
    }

    #[test]
    fn call_alert_camel_case_felder() {
        let event = CallEvent::neu("+1234567890", "John Doe", "2024-02-19T10:30:45Z");
        let alarm = CallAlert::aus_event(&event, "2024-02-19T10:30:46.000Z".into(), 3);

        let json = serde_json::to_value(&alarm).unwrap();
        assert_eq!(json["number"], "+1234567890");
        assert_eq!(json["name"], "John Doe");
        assert_eq!(json["timestamp"], "2024-02-19T10:30:45Z");
        assert_eq!(json["receivedAt"], "2024-02-19T10:30:46.000Z");
        assert_eq!(json["clientsNotified"], 3);
    }
}
