use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use plotbuilder_pipeline::config::{DEFAULT_QUEUE_CAPACITY, DEFAULT_RETRY_BACKOFF};
use plotbuilder_pipeline::{AdmissionPolicy, PipelineConfig, RetryPolicy};

/// Startup configuration problem. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err("must be one of: pretty, json".to_string()),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// Everything except the port has a default suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port. Required.
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<HeaderValue>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for the pipeline to drain (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Directory rendered reports are written to (default: `graphs`).
    pub reports_dir: PathBuf,
    /// Queue sizes, admission policy, render concurrency and retries.
    pub pipeline: PipelineConfig,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                     | Default                 |
    /// |-----------------------------|-------------------------|
    /// | `HOST`                      | `0.0.0.0`               |
    /// | `PLOT_BUILDER_PORT`         | required                |
    /// | `CORS_ORIGINS`              | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `30`                    |
    /// | `REPORTS_DIR`               | `graphs`                |
    /// | `JOB_QUEUE_CAPACITY`        | `10`                    |
    /// | `COMPLETION_QUEUE_CAPACITY` | `10`                    |
    /// | `ADMISSION_POLICY`          | `reject`                |
    /// | `RENDER_CONCURRENCY_LIMIT`  | `0` (unbounded)         |
    /// | `RENDER_MAX_ATTEMPTS`       | `1`                     |
    /// | `RENDER_RETRY_BACKOFF_MS`   | `500`                   |
    /// | `LOG_FORMAT`                | `pretty`                |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through
    /// `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let host = env.get("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = env.required("PLOT_BUILDER_PORT")?;

        let cors_origins = env
            .get("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|origin| {
                origin.parse::<HeaderValue>().map_err(|e| ConfigError::Invalid {
                    var: "CORS_ORIGINS",
                    value: origin.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let request_timeout_secs = env.parsed_or("REQUEST_TIMEOUT_SECS", 30)?;
        let shutdown_timeout_secs = env.parsed_or("SHUTDOWN_TIMEOUT_SECS", 30)?;
        let reports_dir = PathBuf::from(env.get("REPORTS_DIR").unwrap_or_else(|| "graphs".into()));

        let job_queue_capacity = env.at_least_one("JOB_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?;
        let completion_queue_capacity =
            env.at_least_one("COMPLETION_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?;
        let admission_policy = env.parsed_or("ADMISSION_POLICY", AdmissionPolicy::default())?;
        let concurrency_limit: usize = env.parsed_or("RENDER_CONCURRENCY_LIMIT", 0)?;
        let max_attempts = env.at_least_one("RENDER_MAX_ATTEMPTS", 1u32)?;
        let backoff_ms = env.parsed_or(
            "RENDER_RETRY_BACKOFF_MS",
            DEFAULT_RETRY_BACKOFF.as_millis() as u64,
        )?;
        let log_format = env.parsed_or("LOG_FORMAT", LogFormat::default())?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            reports_dir,
            pipeline: PipelineConfig {
                job_queue_capacity,
                completion_queue_capacity,
                admission_policy,
                concurrency_limit: (concurrency_limit > 0).then_some(concurrency_limit),
                retry: RetryPolicy {
                    max_attempts,
                    backoff: Duration::from_millis(backoff_ms),
                },
            },
            log_format,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Unset and blank are treated alike.
    fn get(&self, var: &str) -> Option<String> {
        (self.0)(var).filter(|v| !v.trim().is_empty())
    }

    fn required<T>(&self, var: &'static str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.get(var).ok_or(ConfigError::Missing(var))?;
        parse(var, raw)
    }

    fn parsed_or<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(var) {
            Some(raw) => parse(var, raw),
            None => Ok(default),
        }
    }

    fn at_least_one<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + From<u8> + Display,
        T::Err: Display,
    {
        let value = self.parsed_or(var, default)?;
        if value < T::from(1) {
            return Err(ConfigError::Invalid {
                var,
                value: value.to_string(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(value)
    }
}

fn parse<T>(var: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
        value: raw,
    })
}
