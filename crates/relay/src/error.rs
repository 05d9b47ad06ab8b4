//! Fehlertypen fuer den Relay-Kern
//!
//! - `Validierung`: Einreichung unvollstaendig oder fehlerhaft (400, kein Broadcast)
//! - `Zustellung`: Zustellung an einen einzelnen Subscriber fehlgeschlagen
//!   (bleibt im Broadcast-Core, fuehrt zur Entfernung des Subscribers)
//! - `Transport`: Handshake/Accept eines neuen Subscribers fehlgeschlagen
//! - `Intern`: Unerwarteter Fehler in der Intake (500)

use std::time::Duration;

use thiserror::Error;

/// Fehlertyp fuer den Relay-Kern
#[derive(Debug, Error)]
pub enum RelayError {
    /// Einreichung abgelehnt
    #[error("{0}")]
    Validierung(String),

    /// Zustellung an einen Subscriber fehlgeschlagen
    #[error("Zustellung fehlgeschlagen: {0}")]
    Zustellung(#[from] DeliveryError),

    /// Verbindungsaufbau eines Subscribers fehlgeschlagen
    #[error("Transportfehler: {0}")]
    Transport(String),

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl RelayError {
    /// Erstellt einen Validierungsfehler
    pub fn validierung(msg: impl Into<String>) -> Self {
        Self::Validierung(msg.into())
    }

    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Erstellt einen Transportfehler
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Ob der Fehler beim Einreicher liegt (4xx)
    pub fn ist_client_fehler(&self) -> bool {
        matches!(self, Self::Validierung(_))
    }
}

/// Fehler bei der Zustellung an genau einen Subscriber
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Send-Queue voll – der Subscriber kommt nicht hinterher
    #[error("Send-Queue voll")]
    QueueVoll,

    /// Send-Queue geschlossen – Verbindungs-Task beendet
    #[error("Send-Queue geschlossen")]
    Geschlossen,

    /// Schreiben auf den Socket hat das Zeitlimit ueberschritten
    #[error("Schreib-Timeout nach {0:?}")]
    Timeout(Duration),

    /// Socket-Fehler beim Schreiben
    #[error("Senden fehlgeschlagen: {0}")]
    Senden(String),
}

/// Result-Typ fuer den Relay-Kern
pub type RelayResult<T> = Result<T, RelayError>;
