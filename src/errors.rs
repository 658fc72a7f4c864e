//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// Request rejected before any I/O (e.g. missing conversation key).
    Validation(String),
    /// Message store failure that is eligible for retry.
    Transient(String),
    /// Load attempt was superseded, cancelled by the caller, or timed out.
    Cancelled(String),
    /// Retries exhausted; carries the last underlying error.
    LoadExhausted {
        /// Total attempts made (initial attempt plus retries).
        attempts: u32,
        /// Rendered form of the last underlying failure.
        last_error: String,
    },
    /// Requested entity does not exist.
    NotFound(String),
    /// Reply generator failure.
    Generation(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Whether this error represents a cancellation rather than a fault.
    ///
    /// Callers typically ignore cancellations: they mean a newer request
    /// superseded this one.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Whether the loader may retry after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Db(_) | Self::Io(_))
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Validation(msg) => write!(f, "validation: {msg}"),
            Self::Transient(msg) => write!(f, "transient: {msg}"),
            Self::Cancelled(msg) => write!(f, "cancelled: {msg}"),
            Self::LoadExhausted {
                attempts,
                last_error,
            } => write!(f, "load failed after {attempts} attempts: {last_error}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Generation(msg) => write!(f, "generation: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}
