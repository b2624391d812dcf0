//! # Agent Telemetry
//!
//! Logging and metrics for fleet agents.
//!
//! ## Components
//!
//! - **Logs**: `tracing` events through a `tracing-subscriber` registry,
//!   human-readable in development and JSON in containers
//! - **Metrics**: Prometheus counters and histograms for the envelope
//!   pipeline, the session lifecycle and the transport
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     init_telemetry(&config).expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `FLEET_SERVICE_NAME` | `fleet-agent` | Service name in logs |
//! | `FLEET_AGENT_ID` | unset | Agent id appended to the service name |
//! | `FLEET_LOG_LEVEL` | `info` | Log level filter (`RUST_LOG` wins) |
//! | `FLEET_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `FLEET_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |

#![warn(missing_docs)]

mod config;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, DECRYPT_FAILURES, ENVELOPES_OPENED, ENVELOPES_REJECTED,
    ENVELOPES_SEALED, ENVELOPE_DURATION, REGISTRY, SESSION_ACTIVE, SESSION_TRANSITIONS,
    SIGNATURE_FAILURES, TRANSPORT_TIMEOUTS,
};
pub use tracing_setup::init_tracing;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// A global subscriber is already installed.
    #[error("Failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),

    /// Registering or encoding metrics failed.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// The configuration could not be applied.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Register metrics, then install the global tracing subscriber.
///
/// Call once from the embedding binary. Libraries never call this.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    register_metrics()?;
    init_tracing(config)
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
