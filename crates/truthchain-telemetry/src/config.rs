//! Telemetry configuration.

/// How logging and metrics should be initialized for one node process.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line.
    pub service_name: String,
    /// `tracing_subscriber::EnvFilter` directive, e.g. `"info"` or
    /// `"truthchain_sync=debug,info"`.
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones. Production nodes
    /// set this so logs are directly ingestible by a log aggregator.
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "truthchain-node".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_human_readable_info() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
    }
}
