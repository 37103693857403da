//! # port-observability
//!
//! Observability-Crate fuer die Port-Anruf-Pipeline:
//! - Structured Logging via tracing-subscriber (Text oder JSON)
//! - Prometheus-Metriken fuer Anrufe, verworfene Signale und Speicher-Latenz

pub mod logging;
pub mod metrics;

pub use logging::logging_initialisieren;
pub use metrics::PortMetrics;
