//! Configuration file loading and validation.
//!
//! The configuration file is a JSON object with a single `services` array.
//! Loading is a two-phase parse-then-validate: serde deserializes the shape,
//! then each descriptor is run through [`ServiceDescriptor::validate`] so
//! validation failures carry a specific [`ConfigError`] rather than a bare
//! serde message.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum `interval_sec`.
pub const MIN_HEALTHCHECK_INTERVAL_SECONDS: u32 = 5;
/// Maximum `interval_sec`.
pub const MAX_HEALTHCHECK_INTERVAL_SECONDS: u32 = 300;
pub const DEFAULT_REQUEST_INTERVAL_SECONDS: u32 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u32 = 15;
/// Longest URL a descriptor may carry.
pub const MAX_URL_LENGTH: usize = 2083;

pub const MIN_BATCH_SIZE: usize = 1;
pub const MAX_BATCH_SIZE: usize = 50_000;
pub const DEFAULT_BATCH_SIZE: usize = 5_000;
pub const MIN_EXPORT_INTERVAL_SECONDS: u64 = 1;
pub const MAX_EXPORT_INTERVAL_SECONDS: u64 = 3_600;

/// Advisory-only; exceeding it logs a warning rather than failing startup.
pub const MAX_SERVICES_PER_WORKER: usize = 1_000;

pub const DEFAULT_HEADER_NAME: &str = "user-agent";
pub const DEFAULT_HEADER_VALUE: &str = "monitoring-client";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse configuration file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no services configured")]
    NoServices,

    #[error("service {index}: url exceeds {MAX_URL_LENGTH} characters")]
    UrlTooLong { index: usize },

    #[error("service {index}: url must start with http:// or https://")]
    UnsupportedScheme { index: usize },

    #[error("service {index}: method {method} is not supported")]
    UnsupportedMethod { index: usize, method: String },

    #[error("service {index}: check_regex is true but regex is empty")]
    MissingRegex { index: usize },

    #[error(
        "service {index}: interval_sec {value} is out of range [{MIN_HEALTHCHECK_INTERVAL_SECONDS}, {MAX_HEALTHCHECK_INTERVAL_SECONDS}]"
    )]
    IntervalOutOfRange { index: usize, value: u32 },

    #[error("service {index}: timeout_sec must be greater than zero")]
    NonPositiveTimeout { index: usize },

    #[error("DATABASE_URI is not set")]
    MissingDatabaseUri,

    #[error("export_batch_size {value} is out of range [{MIN_BATCH_SIZE}, {MAX_BATCH_SIZE}]")]
    BatchSizeOutOfRange { value: usize },

    #[error(
        "export_interval {value} is out of range [{MIN_EXPORT_INTERVAL_SECONDS}, {MAX_EXPORT_INTERVAL_SECONDS}]"
    )]
    ExportIntervalOutOfRange { value: u64 },
}

/// HTTP methods the probe client supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    GET,
    POST,
    HEAD,
    OPTION,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::HEAD => "HEAD",
            Method::OPTION => "OPTION",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frozen per-service configuration plus the mutable scheduling bookkeeping
/// field. Descriptors are created once at startup and live for the process;
/// only `last_checked_at` mutates afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceDescriptor {
    pub url: String,
    pub method: Method,
    pub check_regex: bool,
    pub regex: Option<String>,
    pub interval_sec: u32,
    pub timeout: u32,
    /// Ignored on load; set by the agent after each probe.
    pub last_checked_at: Option<DateTime<Utc>>,
}

fn default_interval() -> u32 {
    DEFAULT_REQUEST_INTERVAL_SECONDS
}

fn default_timeout() -> u32 {
    DEFAULT_REQUEST_TIMEOUT_SECONDS
}

/// Wire shape of a configured service: `method` is a bare string here so an
/// unrecognized value produces a specific, indexed [`ConfigError`] from
/// [`ServiceDescriptor::from_raw`] instead of an opaque serde parse failure.
#[derive(Debug, Deserialize)]
struct RawServiceDescriptor {
    url: String,
    method: String,
    #[serde(default)]
    check_regex: bool,
    #[serde(default)]
    regex: Option<String>,
    #[serde(default = "default_interval")]
    interval_sec: u32,
    #[serde(default = "default_timeout")]
    timeout: u32,
}

impl ServiceDescriptor {
    fn from_raw(raw: RawServiceDescriptor, index: usize) -> Result<Self, ConfigError> {
        if raw.url.len() > MAX_URL_LENGTH {
            return Err(ConfigError::UrlTooLong { index });
        }
        match url::Url::parse(&raw.url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
            _ => return Err(ConfigError::UnsupportedScheme { index }),
        }
        let method = match raw.method.as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "HEAD" => Method::HEAD,
            "OPTION" => Method::OPTION,
            other => {
                return Err(ConfigError::UnsupportedMethod {
                    index,
                    method: other.to_string(),
                })
            }
        };
        if raw.check_regex && raw.regex.as_deref().unwrap_or("").is_empty() {
            return Err(ConfigError::MissingRegex { index });
        }
        if !(MIN_HEALTHCHECK_INTERVAL_SECONDS..=MAX_HEALTHCHECK_INTERVAL_SECONDS)
            .contains(&raw.interval_sec)
        {
            return Err(ConfigError::IntervalOutOfRange {
                index,
                value: raw.interval_sec,
            });
        }
        if raw.timeout == 0 {
            return Err(ConfigError::NonPositiveTimeout { index });
        }
        Ok(ServiceDescriptor {
            url: raw.url,
            method,
            check_regex: raw.check_regex,
            regex: raw.regex,
            interval_sec: raw.interval_sec,
            timeout: raw.timeout,
            last_checked_at: None,
        })
    }

    /// Sort key used for human listing; two descriptors are equal iff this
    /// tuple matches.
    pub fn identity_key(&self) -> (String, &'static str, bool, Option<String>) {
        (
            self.url.clone(),
            self.method.as_str(),
            self.check_regex,
            self.regex.clone(),
        )
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    services: Vec<RawServiceDescriptor>,
}

/// Fully resolved startup configuration: the validated service list plus
/// the exporter's batch/interval parameters.
pub struct MonitorConfig {
    pub services: Vec<ServiceDescriptor>,
    pub database_uri: String,
    pub export_batch_size: usize,
    pub export_interval: std::time::Duration,
    pub notify_systemd: bool,
}

/// Load and validate the configuration file at `path`, pulling `DATABASE_URI`
/// from the process environment. `export_batch_size`/`export_interval`
/// override the descriptor-file defaults (CLI flags win over file-level
/// settings, matching the donor's override precedence).
pub fn load(
    path: &Path,
    export_batch_size: Option<usize>,
    export_interval_secs: Option<u64>,
    notify_systemd: bool,
) -> Result<MonitorConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let parsed: ConfigFile =
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

    if parsed.services.is_empty() {
        return Err(ConfigError::NoServices);
    }
    let services = parsed
        .services
        .into_iter()
        .enumerate()
        .map(|(index, raw)| ServiceDescriptor::from_raw(raw, index))
        .collect::<Result<Vec<_>, _>>()?;

    let database_uri = std::env::var("DATABASE_URI")
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingDatabaseUri)?;

    let export_batch_size = export_batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
    if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&export_batch_size) {
        return Err(ConfigError::BatchSizeOutOfRange {
            value: export_batch_size,
        });
    }

    let export_interval_secs = export_interval_secs.unwrap_or(DEFAULT_REQUEST_INTERVAL_SECONDS as u64);
    if !(MIN_EXPORT_INTERVAL_SECONDS..=MAX_EXPORT_INTERVAL_SECONDS).contains(&export_interval_secs) {
        return Err(ConfigError::ExportIntervalOutOfRange {
            value: export_interval_secs,
        });
    }

    Ok(MonitorConfig {
        services,
        database_uri,
        export_batch_size,
        export_interval: std::time::Duration::from_secs(export_interval_secs),
        notify_systemd,
    })
}

/// Rough probes-per-second estimate, logged at startup.
pub fn estimate_workload(services: &[ServiceDescriptor]) -> f64 {
    services
        .iter()
        .map(|s| 1.0 / s.interval_sec.max(1) as f64)
        .sum()
}
