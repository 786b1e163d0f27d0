//! Runtime configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::stream::DEFAULT_POLL_INTERVAL;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Streaming gateway poll interval.
    pub poll_interval: Duration,
    /// Interval between retention sweeps.
    pub sweep_interval: Duration,
    /// Jobs older than this are removed by the sweep, regardless of state.
    pub retention_hours: i64,
    /// Directory result artifacts are written to and read from.
    pub output_dir: PathBuf,
    /// External workload command line. The scripted demo workload is used
    /// when unset.
    pub workload_command: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            sweep_interval: Duration::from_secs(3600), // hourly
            retention_hours: 24,
            output_dir: PathBuf::from("output"),
            workload_command: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from `JOBSTREAM_*` environment variables, falling
    /// back to defaults for anything unset. Set-but-malformed values are an
    /// error rather than a silent fallback.
    pub fn from_env() -> Result<Self, ConfigError> {
        let default = Self::default();
        Ok(Self {
            bind_addr: std::env::var("JOBSTREAM_BIND").unwrap_or(default.bind_addr),
            poll_interval: parse_env("JOBSTREAM_POLL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(default.poll_interval),
            sweep_interval: parse_env("JOBSTREAM_SWEEP_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(default.sweep_interval),
            retention_hours: parse_env("JOBSTREAM_RETENTION_HOURS")?
                .unwrap_or(default.retention_hours),
            output_dir: std::env::var("JOBSTREAM_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.output_dir),
            workload_command: std::env::var("JOBSTREAM_WORKLOAD_CMD").ok(),
        })
    }
}

/// Parse an optional environment variable, erroring only when it is set to
/// something unparseable.
fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Err(_) => Ok(None),
        Ok(raw) => raw.parse().map(Some).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{e}"),
        }),
    }
}
