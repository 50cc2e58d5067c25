//! Server configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration loaded from environment variables.
///
/// Environment variables are prefixed with `STEPFLOW_`:
/// - `STEPFLOW_HOST`: Server bind address (default: "0.0.0.0")
/// - `STEPFLOW_PORT`: Server port (default: 8080)
/// - `STEPFLOW_UPDATE_INTERVAL_SECS`: Tick cadence in seconds (default: 2.0)
/// - `STEPFLOW_PUBLISH_INTERVAL_SECS`: SSE cadence in seconds (default: 5.0)
/// - `STEPFLOW_VOLATILE`: Keep documents in memory only (default: false)
/// - `STEPFLOW_DEVICE_PORT`: Peer device service port (default: 5000)
/// - `STEPFLOW_DATASTORE_URL`: Document database URL (default: "http://datastore:5984")
/// - `STEPFLOW_DATASTORE_DATABASE`: Database name (default: "stepflow")
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Scheduler tick cadence in seconds
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: f64,

    /// SSE publish cadence in seconds
    #[serde(default = "default_publish_interval")]
    pub publish_interval_secs: f64,

    /// Skip the backing datastore entirely
    #[serde(default)]
    pub volatile: bool,

    /// Port peer device services listen on
    #[serde(default = "default_device_port")]
    pub device_port: u16,

    /// Document database URL
    #[serde(default = "default_datastore_url")]
    pub datastore_url: String,

    /// Database name within the document store
    #[serde(default = "default_database")]
    pub datastore_database: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_update_interval() -> f64 {
    2.0
}

fn default_publish_interval() -> f64 {
    5.0
}

fn default_device_port() -> u16 {
    stepflow_handlers::DEFAULT_DEVICE_PORT
}

fn default_datastore_url() -> String {
    "http://datastore:5984".to_string()
}

fn default_database() -> String {
    "stepflow".to_string()
}

impl AppConfig {
    /// Load configuration from `STEPFLOW_`-prefixed environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("STEPFLOW_").from_env::<AppConfig>()
    }

    /// Address string for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Scheduler tick cadence.
    pub fn update_interval(&self) -> Duration {
        secs_to_interval(self.update_interval_secs, default_update_interval())
    }

    /// SSE publish cadence.
    pub fn publish_interval(&self) -> Duration {
        secs_to_interval(self.publish_interval_secs, default_publish_interval())
    }
}

// Non-positive or non-finite values from the environment fall back to the
// default rather than panicking in Duration::from_secs_f64.
fn secs_to_interval(secs: f64, fallback: f64) -> Duration {
    let secs = if secs.is_finite() && secs > 0.0 {
        secs
    } else {
        fallback
    };
    Duration::from_secs_f64(secs)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            update_interval_secs: default_update_interval(),
            publish_interval_secs: default_publish_interval(),
            volatile: false,
            device_port: default_device_port(),
            datastore_url: default_datastore_url(),
            datastore_database: default_database(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert!(!config.volatile);
        assert_eq!(config.update_interval(), Duration::from_secs(2));
        assert_eq!(config.publish_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_bind_address() {
        let config = AppConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_bad_intervals_fall_back() {
        let config = AppConfig {
            update_interval_secs: -3.0,
            publish_interval_secs: f64::NAN,
            ..AppConfig::default()
        };
        assert_eq!(config.update_interval(), Duration::from_secs(2));
        assert_eq!(config.publish_interval(), Duration::from_secs(5));
    }
}
