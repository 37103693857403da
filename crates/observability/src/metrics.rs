//! Prometheus-kompatible Metriken fuer Port
//!
//! Registrierte Metriken:
//! - `port_calls_started_total{direction}` - Counter: begonnene Anrufe
//! - `port_calls_terminated_total{reason}` - Counter: beendete Anrufe
//! - `port_signals_dropped_total{reason}` - Counter: verworfene Signale
//! - `port_push_rejected_total{kind}` - Counter: abgelehnte Pushes
//! - `port_sessions_active` - Gauge: nicht-terminale Sessions
//! - `port_store_write_seconds` - Histogram: Dauer eines Speicher-Schreibvorgangs

use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Alle Port-Prometheus-Metriken
#[derive(Clone)]
pub struct PortMetrics {
    pub registry: Arc<Registry>,

    pub calls_started_total: IntCounterVec,
    pub calls_terminated_total: IntCounterVec,
    pub signals_dropped_total: IntCounterVec,
    pub push_rejected_total: IntCounterVec,
    pub sessions_active: IntGauge,
    pub store_write_seconds: Histogram,
}

impl PortMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let calls_started_total = IntCounterVec::new(
            Opts::new("port_calls_started_total", "Begonnene Anrufe"),
            &["direction"],
        )?;
        registry.register(Box::new(calls_started_total.clone()))?;

        let calls_terminated_total = IntCounterVec::new(
            Opts::new("port_calls_terminated_total", "Beendete Anrufe nach Grund"),
            &["reason"],
        )?;
        registry.register(Box::new(calls_terminated_total.clone()))?;

        let signals_dropped_total = IntCounterVec::new(
            Opts::new(
                "port_signals_dropped_total",
                "Verworfene Signale (Duplikat, Luecke, unbekannt, ...)",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(signals_dropped_total.clone()))?;

        let push_rejected_total = IntCounterVec::new(
            Opts::new("port_push_rejected_total", "Im Push-Intake abgelehnte Payloads"),
            &["kind"],
        )?;
        registry.register(Box::new(push_rejected_total.clone()))?;

        let sessions_active = IntGauge::with_opts(Opts::new(
            "port_sessions_active",
            "Anzahl nicht-terminaler Sessions",
        ))?;
        registry.register(Box::new(sessions_active.clone()))?;

        let store_write_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "port_store_write_seconds",
                "Dauer eines versiegelten Schreibvorgangs in Sekunden",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        registry.register(Box::new(store_write_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            calls_started_total,
            calls_terminated_total,
            signals_dropped_total,
            push_rejected_total,
            sessions_active,
            store_write_seconds,
        })
    }

    pub fn anruf_begonnen(&self, direction: &str) {
        self.calls_started_total.with_label_values(&[direction]).inc();
        self.sessions_active.inc();
    }

    pub fn anruf_beendet(&self, reason: &str) {
        self.calls_terminated_total.with_label_values(&[reason]).inc();
        self.sessions_active.dec();
    }

    pub fn signal_verworfen(&self, reason: &str) {
        self.signals_dropped_total.with_label_values(&[reason]).inc();
    }

    pub fn push_abgelehnt(&self, kind: &str) {
        self.push_rejected_total.with_label_values(&[kind]).inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl std::fmt::Debug for PortMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortMetrics")
            .field("sessions_active", &self.sessions_active.get())
            .finish()
    }
}
