use thiserror::Error;

/// Crate-wide error type. Fatal at the boundary it surfaces from; see
/// the error handling table for which kinds engage the killswitch.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("remote store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("reconnection attempts exceeded ({attempts} > {max})")]
    ReconnectionAttemptsExceeded { attempts: u32, max: u32 },
}

pub type Result<T> = std::result::Result<T, MonitorError>;
