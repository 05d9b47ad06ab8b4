//! pager-relay – Verbindungs- und Broadcast-Kern des WiFi-Pagers
//!
//! Nimmt Anruf-Events des Android-Geraets an und verteilt sie in Echtzeit
//! an alle verbundenen Web-Pager. Subscriber kommen und gehen jederzeit,
//! unabhaengig vom Eingang neuer Events.
//!
//! ## Architektur
//!
//! ```text
//! Android-Geraet
//!     |
//!     v
//! EventIntake        (validieren, normalisieren)
//!     |
//!     v
//! BroadcastCore      (Momentaufnahme, Fan-Out per try_send)
//!     |
//!     +-- Send-Queue --> SubscriberVerbindung --> Web-Pager
//!     +-- Send-Queue --> SubscriberVerbindung --> Web-Pager
//!     +-- ...
//!
//! ConnectionRegistry – Einziger geteilter Zustand (wer ist verbunden)
//! LivenessMonitor    – Entfernt Subscriber ohne Lebenszeichen
//! ```

pub mod broadcast;
pub mod connection;
pub mod error;
pub mod intake;
pub mod liveness;
pub mod registry;
pub mod state;

// Bequeme Re-Exporte
pub use broadcast::{AlarmVerteiler, BroadcastCore, FanOutBericht};
pub use connection::{SubscriberVerbindung, VerbindungsKonfig, VerbindungsZustand};
pub use error::{DeliveryError, RelayError, RelayResult};
pub use intake::{EventIntake, IntakeBestaetigung};
pub use liveness::LivenessMonitor;
pub use registry::{ConnectionRegistry, EntfernGrund, SubscriberInfo};
pub use state::{Diagnose, RelayConfig, RelayState};
