//! Error types for the federated catalog crawler
//!
//! Errors are grouped by the component that raises them. Crawler cycles never
//! propagate errors to their caller; the types here describe what gets logged
//! through the monitor, what the cache hands back to query callers, and what
//! configuration loading and pool management can fail with.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by protocol adapters while fetching a remote catalog
#[derive(Error, Debug)]
pub enum AdapterError {
    /// The remote request could not be completed
    #[error("Catalog request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    /// The remote request did not complete within the configured timeout
    #[error("Catalog request to {url} timed out after {millis} ms")]
    Timeout { url: String, millis: u64 },

    /// The adapter cannot serve this URL (wrong scheme, missing host, ...)
    #[error("Unsupported catalog URL: {url}")]
    UnsupportedUrl { url: String },

    /// I/O error while reading a catalog
    #[error("Catalog I/O error")]
    Io(#[from] std::io::Error),

    /// The catalog payload could not be decoded
    #[error("Catalog payload could not be decoded")]
    Decode(#[from] serde_json::Error),
}

/// Cache store errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// The criterion uses an operator the converter does not understand
    #[error("Unsupported criterion operator: {operator}")]
    UnsupportedOperator { operator: String },

    /// The criterion is malformed for its operator
    #[error("Invalid criterion {criterion}: {reason}")]
    InvalidCriterion { criterion: String, reason: String },
}

/// Errors raised by query adapters
#[derive(Error, Debug)]
pub enum QueryError {
    /// The adapter could not answer the query
    #[error("Query adapter {adapter} failed: {reason}")]
    AdapterFailed { adapter: String, reason: String },

    /// The backing cache rejected the query
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Partition manager and crawler pool errors
#[derive(Error, Debug)]
pub enum PartitionError {
    /// An execution plan was created with an unusable period
    #[error("Invalid execution plan: {reason}")]
    InvalidPlan { reason: String },

    /// Operation not allowed in the pool's current state
    #[error("Cannot {operation} crawler pool in state {state}")]
    InvalidState { operation: String, state: String },

    /// Crawlers did not finish their cycle before the shutdown deadline
    #[error("{remaining} crawler(s) still running after {millis} ms shutdown timeout")]
    ShutdownTimeout { remaining: usize, millis: u64 },

    /// A crawler builder was missing a required component
    #[error("Crawler is missing required component: {component}")]
    MissingComponent { component: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be rendered as TOML
    #[error("Configuration could not be serialized")]
    Serialize(#[from] toml::ser::Error),

    /// Reading or writing the configuration file failed
    #[error("Configuration file I/O error: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The user configuration directory could not be determined
    #[error("Could not determine user config directory")]
    NoConfigDir,

    /// Configuration validation failed
    #[error("Configuration validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<String> },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Adapter error
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// Cache error
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Query adapter error
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Partition manager error
    #[error(transparent)]
    Partition(#[from] PartitionError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Adapter(AdapterError::RequestFailed { .. })
                | AppError::Adapter(AdapterError::Timeout { .. })
                | AppError::Adapter(AdapterError::Io(_))
                | AppError::Partition(PartitionError::ShutdownTimeout { .. })
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Adapter(_) => "adapter",
            AppError::Cache(_) => "cache",
            AppError::Query(_) => "query",
            AppError::Partition(_) => "partition",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Adapter result type alias
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// Cache result type alias
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Query result type alias
pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Partition result type alias
pub type PartitionResult<T> = std::result::Result<T, PartitionError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
