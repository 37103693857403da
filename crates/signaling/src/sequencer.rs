//! Sequenzierung eingehender Signale pro Session
//!
//! Pushes kommen unzuverlaessig an: doppelt, vertauscht oder gar nicht. Der
//! Sequencer wendet Signale strikt in Sequenz-Reihenfolge an.
//!
//! - `seq <= last_applied`: Duplikat, verworfen
//! - `seq == last_applied + 1`: anwenden, danach gepufferte Nachfolger
//! - `seq` innerhalb des Fensters: puffern bis die Luecke geschlossen ist.
//!   Das Fenster fasst `fenster` Signale hinter dem fehlenden Vorgaenger.
//! - `seq` ausserhalb des Fensters: Luecke, nur dieses Signal wird verworfen
//!
//! Jedes gepufferte Signal verfaellt einzeln, wenn sein Vorgaenger nicht
//! binnen `gap_timeout` nach seiner Ankunft eintrifft.

use std::collections::BTreeMap;
use std::time::Duration;

use port_core::IncomingSignal;
use tokio::time::Instant;

/// Ergebnis von `Sequencer::einordnen`
#[derive(Debug)]
pub enum Einordnung {
    /// In dieser Reihenfolge anwenden
    Anwenden(Vec<IncomingSignal>),
    /// Wartet auf einen Vorgaenger
    Gepuffert,
    Duplikat,
    /// Signal lag ausserhalb des Fensters und wurde verworfen; der Puffer bleibt
    Luecke { erwartet: u64, verworfen: Vec<u64> },
}

#[derive(Debug)]
pub struct Sequencer {
    last_applied: u64,
    fenster: u64,
    puffer: BTreeMap<u64, (Instant, IncomingSignal)>,
}

impl Sequencer {
    pub fn neu(last_applied: u64, fenster: u64) -> Self {
        Self {
            last_applied,
            fenster: fenster.max(1),
            puffer: BTreeMap::new(),
        }
    }

    pub fn last_applied(&self) -> u64 {
        self.last_applied
    }

    pub fn gepuffert(&self) -> usize {
        self.puffer.len()
    }

    pub fn einordnen(&mut self, signal: IncomingSignal, jetzt: Instant) -> Einordnung {
        let seq = signal.seq;
        if seq <= self.last_applied || self.puffer.contains_key(&seq) {
            return Einordnung::Duplikat;
        }

        if seq == self.last_applied + 1 {
            self.last_applied = seq;
            let mut bereit = vec![signal];
            while let Some((_, naechstes)) = self.puffer.remove(&(self.last_applied + 1)) {
                self.last_applied += 1;
                bereit.push(naechstes);
            }
            return Einordnung::Anwenden(bereit);
        }

        // last_applied + 1 fehlt, dahinter passen `fenster` Signale
        if seq - self.last_applied <= self.fenster + 1 {
            self.puffer.insert(seq, (jetzt, signal));
            return Einordnung::Gepuffert;
        }

        Einordnung::Luecke {
            erwartet: self.last_applied + 1,
            verworfen: vec![seq],
        }
    }

    /// Zeitpunkt, an dem das aelteste gepufferte Signal verfaellt
    pub fn naechste_frist(&self, gap_timeout: Duration) -> Option<Instant> {
        self.puffer
            .values()
            .map(|(angekommen, _)| *angekommen + gap_timeout)
            .min()
    }

    /// Verwirft jedes gepufferte Signal, das seit `gap_timeout` auf seinen
    /// Vorgaenger wartet. `last_applied` bleibt unveraendert.
    pub fn abgelaufene_verwerfen(&mut self, jetzt: Instant, gap_timeout: Duration) -> Vec<u64> {
        let mut verworfen = Vec::new();
        self.puffer.retain(|seq, (angekommen, _)| {
            let lebt = *angekommen + gap_timeout > jetzt;
            if !lebt {
                verworfen.push(*seq);
            }
            lebt
        });
        verworfen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use port_core::{Fingerprint, SessionId, SignalKind};

    fn signal(seq: u64) -> IncomingSignal {
        IncomingSignal {
            session_id: SessionId::new(),
            seq,
            kind: SignalKind::IceCandidate,
            sender: Fingerprint::from_digest(&[1; 32]),
            sender_key: [0; 32],
            recipient: Fingerprint::from_digest(&[2; 32]),
            payload: vec![],
            signature: vec![0; 64],
            received_at: Utc::now(),
        }
    }

    fn seqs(e: Einordnung) -> Vec<u64> {
        match e {
            Einordnung::Anwenden(v) => v.iter().map(|s| s.seq).collect(),
            other => panic!("Anwenden erwartet, erhalten: {other:?}"),
        }
    }

    #[test]
    fn in_reihenfolge_sofort_anwenden() {
        let mut s = Sequencer::neu(0, 5);
        let jetzt = Instant::now();
        assert_eq!(seqs(s.einordnen(signal(1), jetzt)), vec![1]);
        assert_eq!(seqs(s.einordnen(signal(2), jetzt)), vec![2]);
        assert_eq!(s.last_applied(), 2);
    }

    #[test]
    fn vertauschte_signale_werden_sortiert() {
        let mut s = Sequencer::neu(1, 5);
        let jetzt = Instant::now();
        assert!(matches!(s.einordnen(signal(3), jetzt), Einordnung::Gepuffert));
        assert!(matches!(s.einordnen(signal(4), jetzt), Einordnung::Gepuffert));
        assert_eq!(seqs(s.einordnen(signal(2), jetzt)), vec![2, 3, 4]);
        assert_eq!(s.gepuffert(), 0);
    }

    #[test]
    fn duplikate_werden_erkannt() {
        let mut s = Sequencer::neu(0, 5);
        let jetzt = Instant::now();
        s.einordnen(signal(1), jetzt);
        assert!(matches!(s.einordnen(signal(1), jetzt), Einordnung::Duplikat));
        s.einordnen(signal(3), jetzt);
        assert!(matches!(s.einordnen(signal(3), jetzt), Einordnung::Duplikat));
    }

    #[test]
    fn fenster_fasst_fuenf_signale() {
        let mut s = Sequencer::neu(1, 5);
        let jetzt = Instant::now();
        for seq in 3..=7 {
            assert!(matches!(s.einordnen(signal(seq), jetzt), Einordnung::Gepuffert));
        }
        assert_eq!(s.gepuffert(), 5);
        assert_eq!(seqs(s.einordnen(signal(2), jetzt)), vec![2, 3, 4, 5, 6, 7]);
        assert_eq!(s.last_applied(), 7);
    }

    #[test]
    fn sprung_ueber_das_fenster_verwirft_nur_das_signal() {
        let mut s = Sequencer::neu(1, 5);
        let jetzt = Instant::now();
        for seq in 3..=7 {
            s.einordnen(signal(seq), jetzt);
        }
        match s.einordnen(signal(8), jetzt) {
            Einordnung::Luecke { erwartet, verworfen } => {
                assert_eq!(erwartet, 2);
                assert_eq!(verworfen, vec![8]);
            }
            other => panic!("Luecke erwartet, erhalten: {other:?}"),
        }
        assert_eq!(s.last_applied(), 1);
        assert_eq!(s.gepuffert(), 5);

        // Puffer ist intakt, der Vorgaenger schliesst die Luecke
        assert_eq!(seqs(s.einordnen(signal(2), jetzt)), vec![2, 3, 4, 5, 6, 7]);
        assert_eq!(seqs(s.einordnen(signal(8), jetzt)), vec![8]);
    }

    #[test]
    fn gepufferte_signale_verfallen() {
        let mut s = Sequencer::neu(1, 5);
        let start = Instant::now();
        let gap = Duration::from_secs(3);
        s.einordnen(signal(3), start);

        assert_eq!(s.naechste_frist(gap), Some(start + gap));
        assert!(s.abgelaufene_verwerfen(start + Duration::from_secs(1), gap).is_empty());
        assert_eq!(s.abgelaufene_verwerfen(start + gap, gap), vec![3]);
        assert_eq!(s.naechste_frist(gap), None);
        // Spaeter eintreffender Vorgaenger wird normal angewendet
        assert_eq!(seqs(s.einordnen(signal(2), start + gap)), vec![2]);
    }

    #[test]
    fn signale_verfallen_einzeln_nach_ankunft() {
        let mut s = Sequencer::neu(1, 5);
        let start = Instant::now();
        let gap = Duration::from_secs(3);
        s.einordnen(signal(3), start);
        s.einordnen(signal(4), start + Duration::from_millis(2900));

        assert_eq!(s.abgelaufene_verwerfen(start + gap, gap), vec![3]);
        assert_eq!(s.gepuffert(), 1);
        assert_eq!(
            s.naechste_frist(gap),
            Some(start + Duration::from_millis(5900))
        );
        assert_eq!(
            s.abgelaufene_verwerfen(start + Duration::from_millis(5900), gap),
            vec![4]
        );
        assert_eq!(s.gepuffert(), 0);
    }
}
