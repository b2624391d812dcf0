//! Prometheus metrics for the fleet agent pipeline.
//!
//! All metrics follow the naming convention: `fleet_agent_<area>_<metric>_<unit>`
//!
//! Counters are usable before [`register_metrics`] is called; registration
//! only makes them visible to [`encode_metrics`].

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter,
    IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Metrics registry of the agent SDK
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // ENVELOPE METRICS
    // =========================================================================

    /// Outbound envelopes sealed, by message type
    pub static ref ENVELOPES_SEALED: IntCounterVec = IntCounterVec::new(
        Opts::new("fleet_agent_envelopes_sealed_total", "Outbound envelopes encoded, signed and published"),
        &["message_type"]
    ).expect("metric creation failed");

    /// Inbound envelopes opened and accepted, by message type
    pub static ref ENVELOPES_OPENED: IntCounterVec = IntCounterVec::new(
        Opts::new("fleet_agent_envelopes_opened_total", "Inbound envelopes verified, decoded and accepted"),
        &["message_type"]
    ).expect("metric creation failed");

    /// Inbound envelopes discarded, by reason
    pub static ref ENVELOPES_REJECTED: IntCounterVec = IntCounterVec::new(
        Opts::new("fleet_agent_envelopes_rejected_total", "Inbound envelopes discarded"),
        &["reason"]  // replay, wrong_session, not_active, malformed, unknown_type, ...
    ).expect("metric creation failed");

    /// Time spent sealing or opening one envelope
    pub static ref ENVELOPE_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "fleet_agent_envelope_duration_seconds",
            "Time spent in the seal or open pipeline"
        ).buckets(exponential_buckets(0.00005, 2.0, 14).expect("valid buckets")),
        &["direction"]  // seal, open
    ).expect("metric creation failed");

    // =========================================================================
    // CRYPTO METRICS
    // =========================================================================

    /// Inbound signatures that failed verification
    pub static ref SIGNATURE_FAILURES: IntCounter = IntCounter::new(
        "fleet_agent_signature_failures_total",
        "Inbound envelopes with a missing or invalid signature"
    ).expect("metric creation failed");

    /// Inbound bodies that failed decryption
    pub static ref DECRYPT_FAILURES: IntCounter = IntCounter::new(
        "fleet_agent_decrypt_failures_total",
        "Inbound sealed bodies that failed authentication"
    ).expect("metric creation failed");

    // =========================================================================
    // SESSION METRICS
    // =========================================================================

    /// Session transitions by target state
    pub static ref SESSION_TRANSITIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("fleet_agent_session_transitions_total", "Session state transitions"),
        &["to"]
    ).expect("metric creation failed");

    /// 1 while the session is active
    pub static ref SESSION_ACTIVE: IntGauge = IntGauge::new(
        "fleet_agent_session_active",
        "Whether the agent currently holds an active session"
    ).expect("metric creation failed");

    // =========================================================================
    // TRANSPORT METRICS
    // =========================================================================

    /// Transport operations that exceeded their timeout
    pub static ref TRANSPORT_TIMEOUTS: IntCounterVec = IntCounterVec::new(
        Opts::new("fleet_agent_transport_timeouts_total", "Transport operations that timed out"),
        &["operation"]  // publish, checkin, checkout
    ).expect("metric creation failed");
}

/// Register all metrics with [`REGISTRY`].
///
/// Calling it again is a no-op.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Envelopes
        Box::new(ENVELOPES_SEALED.clone()),
        Box::new(ENVELOPES_OPENED.clone()),
        Box::new(ENVELOPES_REJECTED.clone()),
        Box::new(ENVELOPE_DURATION.clone()),
        // Crypto
        Box::new(SIGNATURE_FAILURES.clone()),
        Box::new(DECRYPT_FAILURES.clone()),
        // Session
        Box::new(SESSION_TRANSITIONS.clone()),
        Box::new(SESSION_ACTIVE.clone()),
        // Transport
        Box::new(TRANSPORT_TIMEOUTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
    ($histogram:expr, $labels:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram.with_label_values($labels))
    };
}
