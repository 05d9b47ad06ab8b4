//! pager-core – Gemeinsame Typen fuer den WiFi-Pager
//!
//! Dieses Crate stellt die Bausteine bereit, die Relay, API und Server
//! gemeinsam nutzen: Anruf-Events, Subscriber-IDs und die Nachrichten
//! des WebSocket-Protokolls zwischen Relay und Web-Pagern.

pub mod event;
pub mod protocol;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use event::{iso_zeitstempel, jetzt_iso, CallAlert, CallEvent};
pub use protocol::{ClientNachricht, ServerNachricht};
pub use types::SubscriberId;
