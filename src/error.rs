//! Error types for the reqwest-proxy-rotor crate.

use thiserror::Error;

/// Errors returned by [`ProxyPool`](crate::ProxyPool) operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Both the actual and fresh lists were empty at checkout time.
    #[error("No proxy available in pool")]
    NoAvailableProxy,
    /// A recycle pass found nothing in the used list and nothing in the actual list.
    #[error("Used proxy list is empty")]
    EmptyUsedList,
    /// The recycle worker is already running.
    #[error("Recycle already started")]
    AlreadyStarted,
    /// The recycle worker needs a Tokio runtime to be spawned on.
    #[error("No Tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// Error returned when a proxy address cannot be parsed.
#[derive(Debug, Error)]
pub enum AddressError {
    #[error("Invalid proxy URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Proxy address has no host")]
    MissingHost,
    #[error("Invalid proxy host: {0}")]
    InvalidHost(String),
    #[error("Invalid proxy port: {0}")]
    InvalidPort(String),
    #[error("Wrong number of proxy fields: {0}")]
    FieldCount(usize),
}

/// Error raised while loading a proxy list source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
