//! Server configuration from environment variables.

use anyhow::{Context, Result};
use shiori::{ExecutorConfig, ServiceConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Settings for the HTTP server and the workflow service behind it.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind_addr: String,
    /// Root directory of the checkpoint store.
    pub data_dir: PathBuf,
    /// Prefix for API routes, e.g. `/api`. Empty for none.
    pub api_prefix: String,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
    /// Bound on concurrently executing runs.
    pub max_concurrent_runs: Option<usize>,
    /// Reject status and result queries for session ids that were never created.
    pub reject_unknown_sessions: bool,
    /// Pause inside each demo step.
    pub step_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            data_dir: PathBuf::from("analyses_data"),
            api_prefix: "/api".to_string(),
            cors_origins: Vec::new(),
            max_concurrent_runs: None,
            reject_unknown_sessions: false,
            step_delay: Duration::from_secs(2),
        }
    }
}

impl ServerConfig {
    /// Reads configuration from the process environment.
    ///
    /// | variable | default |
    /// |---|---|
    /// | `SHIORI_BIND_ADDR` | `0.0.0.0:5000` |
    /// | `SHIORI_DATA_DIR` | `analyses_data` |
    /// | `SHIORI_API_PREFIX` | `/api` |
    /// | `CORS_ALLOWED_ORIGINS` | any origin |
    /// | `SHIORI_MAX_CONCURRENT_RUNS` | unbounded |
    /// | `SHIORI_REJECT_UNKNOWN_SESSIONS` | `false` |
    /// | `SHIORI_STEP_DELAY_MS` | `2000` |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let max_concurrent_runs = var("SHIORI_MAX_CONCURRENT_RUNS")
            .map(|v| v.parse::<usize>())
            .transpose()
            .context("SHIORI_MAX_CONCURRENT_RUNS must be a positive integer")?
            .filter(|n| *n > 0);

        let reject_unknown_sessions = match var("SHIORI_REJECT_UNKNOWN_SESSIONS") {
            Some(v) => parse_bool(&v)
                .with_context(|| format!("SHIORI_REJECT_UNKNOWN_SESSIONS: invalid value {v:?}"))?,
            None => defaults.reject_unknown_sessions,
        };

        let step_delay = var("SHIORI_STEP_DELAY_MS")
            .map(|v| v.parse::<u64>().map(Duration::from_millis))
            .transpose()
            .context("SHIORI_STEP_DELAY_MS must be an integer number of milliseconds")?
            .unwrap_or(defaults.step_delay);

        let cors_origins = var("CORS_ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty() && *s != "*")
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        // An explicitly empty prefix is meaningful, so it bypasses `var`.
        let api_prefix = match lookup("SHIORI_API_PREFIX") {
            Some(v) => normalize_prefix(&v),
            None => defaults.api_prefix,
        };

        Ok(Self {
            bind_addr: var("SHIORI_BIND_ADDR").unwrap_or(defaults.bind_addr),
            data_dir: var("SHIORI_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            api_prefix,
            cors_origins,
            max_concurrent_runs,
            reject_unknown_sessions,
            step_delay,
        })
    }

    /// Expected wall time of `steps` paced steps.
    pub fn run_duration(&self, steps: usize) -> Duration {
        self.step_delay
            .saturating_mul(u32::try_from(steps).unwrap_or(u32::MAX))
    }

    /// Service settings for a pipeline of `steps` paced steps.
    pub fn service_config(&self, steps: usize) -> ServiceConfig {
        ServiceConfig {
            estimated_duration: describe_duration(self.run_duration(steps)),
            status_path_prefix: format!("{}/workflow/status/", self.api_prefix),
            reject_unknown_sessions: self.reject_unknown_sessions,
            executor: ExecutorConfig {
                max_concurrent_runs: self.max_concurrent_runs,
            },
        }
    }
}

/// Renders a duration as a rough human-readable hint.
pub fn describe_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        0 => "under a second".to_string(),
        1 => "about 1 second".to_string(),
        2..=59 => format!("about {secs} seconds"),
        _ => {
            let minutes = secs.div_ceil(60);
            format!("about {minutes} minutes")
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
