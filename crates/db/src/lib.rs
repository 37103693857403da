//! port-db - Session Store
//!
//! Dauerhafte Ablage der Call-Sessions in SQLite. Jeder Datensatz ist mit
//! einem vom Geraete-Master-Key abgeleiteten Speicher-Schluessel versiegelt.
//!
//! - `SqliteDb` - Pool, Migrationen, Schreibsperren pro Session-ID
//! - `SessionRepository` - Roh-Zugriff auf versiegelte Datensaetze
//! - `SessionVault` - Versiegeln/Oeffnen, Quarantaene, Wiederholungen

pub mod error;
pub mod repository;
pub mod sqlite;
pub mod vault;

pub use error::{StoreError, StoreResult};
pub use repository::{QuarantaeneEintrag, SessionRepository, SpeicherConfig, DATABASE_NAME};
pub use sqlite::SqliteDb;
pub use vault::{SessionVault, Wiederholung};
