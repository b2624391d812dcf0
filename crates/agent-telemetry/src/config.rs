//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to logs
    pub service_name: String,

    /// Agent the process runs for, when known
    pub agent_id: Option<String>,

    /// Log level filter (trace, debug, info, warn, error), used when
    /// `RUST_LOG` is not set
    pub log_level: String,

    /// Whether to write logs to stdout at all
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "fleet-agent".to_string(),
            agent_id: None,
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `FLEET_SERVICE_NAME`: Service name (default: fleet-agent)
    /// - `FLEET_AGENT_ID`: Agent id attached to the service name
    /// - `FLEET_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `FLEET_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `FLEET_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let is_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();

        Self {
            service_name: lookup("FLEET_SERVICE_NAME")
                .unwrap_or_else(|| "fleet-agent".to_string()),

            agent_id: lookup("FLEET_AGENT_ID"),

            log_level: lookup("FLEET_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or_else(|| "info".to_string()),

            console_output: lookup("FLEET_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: lookup("FLEET_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),
        }
    }

    /// Configuration for a specific agent.
    pub fn for_agent(agent_id: &str) -> Self {
        let mut config = Self::from_env();
        config.agent_id = Some(agent_id.to_string());
        config
    }

    /// Get the full service name including the agent id.
    pub fn full_service_name(&self) -> String {
        match &self.agent_id {
            Some(id) => format!("{}-{}", self.service_name, id),
            None => self.service_name.clone(),
        }
    }
}
