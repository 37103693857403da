//! Geraeteschluessel auf der Platte
//!
//! Master-Key (Versiegelung des Session Store) und Ed25519-Identitaet liegen
//! als rohe 32 Bytes im Schluessel-Verzeichnis. Fehlen sie, werden sie beim
//! ersten Start erzeugt und nur fuer den Eigentuemer lesbar angelegt.

use std::io::Write;
use std::path::{Path, PathBuf};

use port_crypto::{Identity, MasterKey};
use tracing::info;

use crate::error::KontextError;

pub const MASTER_KEY_DATEI: &str = "master.key";
pub const IDENTITAET_DATEI: &str = "identity.key";

/// Laedt den Master-Key oder erzeugt ihn
pub fn master_key_laden(verzeichnis: &Path) -> Result<MasterKey, KontextError> {
    let pfad = verzeichnis.join(MASTER_KEY_DATEI);
    match lesen(&pfad)? {
        Some(bytes) => Ok(MasterKey::from_bytes(&bytes)?),
        None => {
            let key = MasterKey::generate();
            schreiben(&pfad, key.as_bytes())?;
            info!(pfad = %pfad.display(), "Neuer Master-Key erzeugt");
            Ok(key)
        }
    }
}

/// Laedt die Geraete-Identitaet oder erzeugt sie
pub fn identitaet_laden(verzeichnis: &Path) -> Result<Identity, KontextError> {
    let pfad = verzeichnis.join(IDENTITAET_DATEI);
    match lesen(&pfad)? {
        Some(bytes) => Ok(Identity::from_bytes(&bytes)?),
        None => {
            let identity = Identity::generate();
            schreiben(&pfad, &identity.private_key_bytes())?;
            info!(
                pfad = %pfad.display(),
                fingerprint = identity.fingerprint().kurz(),
                "Neue Identitaet erzeugt"
            );
            Ok(identity)
        }
    }
}

fn lesen(pfad: &Path) -> Result<Option<Vec<u8>>, KontextError> {
    match std::fs::read(pfad) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(datei_fehler(pfad, e)),
    }
}

fn schreiben(pfad: &Path, bytes: &[u8]) -> Result<(), KontextError> {
    if let Some(eltern) = pfad.parent() {
        std::fs::create_dir_all(eltern).map_err(|e| datei_fehler(eltern, e))?;
    }

    let mut optionen = std::fs::OpenOptions::new();
    optionen.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        optionen.mode(0o600);
    }

    let mut datei = optionen.open(pfad).map_err(|e| datei_fehler(pfad, e))?;
    datei
        .write_all(bytes)
        .and_then(|()| datei.sync_all())
        .map_err(|e| datei_fehler(pfad, e))
}

fn datei_fehler(pfad: &Path, quelle: std::io::Error) -> KontextError {
    KontextError::Schluesseldatei {
        pfad: PathBuf::from(pfad),
        quelle,
    }
}
