//! Error types for evsync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 4=validation, 6=sync, 7=config, etc.)
//! - Retryability flags for schedulers and wrappers
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use thiserror::Error;

use crate::normalize::ValidationError;

/// Result type alias for evsync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    DatabaseError,

    // Not Found (exit 3)
    RecordNotFound,
    ContentNotFound,

    // Validation (exit 4)
    InvalidArgument,
    InvalidEvent,

    // Transport (exit 5)
    TransportError,

    // Sync (exit 6)
    SyncInProgress,
    SinkError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::RecordNotFound => "RECORD_NOT_FOUND",
            Self::ContentNotFound => "CONTENT_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::InvalidEvent => "INVALID_EVENT",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::SyncInProgress => "SYNC_IN_PROGRESS",
            Self::SinkError => "SINK_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::DatabaseError => 2,
            Self::RecordNotFound | Self::ContentNotFound => 3,
            Self::InvalidArgument | Self::InvalidEvent => 4,
            Self::TransportError => 5,
            Self::SyncInProgress | Self::SinkError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether a later attempt may succeed without changing anything.
    ///
    /// True for contention and transient network failures. False for
    /// configuration, validation and internal errors.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SyncInProgress | Self::TransportError | Self::DatabaseError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in evsync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid event: {0}")]
    Validation(#[from] ValidationError),

    #[error("Content sink error: {0}")]
    Sink(String),

    #[error("A sync run is already in progress for organization {org}")]
    SyncInProgress { org: String },

    #[error("Tracked event not found: {event_id}")]
    RecordNotFound { event_id: String },

    #[error("Content item not found: {id}")]
    ContentNotFound { id: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Transport(_) => ErrorCode::TransportError,
            Self::Validation(_) => ErrorCode::InvalidEvent,
            Self::Sink(_) => ErrorCode::SinkError,
            Self::SyncInProgress { .. } => ErrorCode::SyncInProgress,
            Self::RecordNotFound { .. } => ErrorCode::RecordNotFound,
            Self::ContentNotFound { .. } => ErrorCode::ContentNotFound,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Whether this error belongs to a single event rather than the whole run.
    ///
    /// The engine counts these and moves on to the next event.
    #[must_use]
    pub const fn is_per_event(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Validation(_) | Self::Sink(_) | Self::ContentNotFound { .. }
        )
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Config(msg) if msg.contains("api_key") || msg.contains("org") => Some(
                "Set credentials with: evsync config set --api-key <KEY> --org <ORG>\n  \
                 or export EVSYNC_API_KEY / EVSYNC_ORG"
                    .to_string(),
            ),
            Self::SyncInProgress { org } => Some(format!(
                "Another run for '{org}' holds the lock. Wait for it to finish; \
                 abandoned locks expire after two hours."
            )),
            Self::RecordNotFound { event_id } => Some(format!(
                "No tracked record for '{event_id}'. Use `evsync status --list` to see tracked events."
            )),
            Self::Transport(_) => {
                Some("Check network access and the configured api_base_url.".to_string())
            }
            Self::Config(_)
            | Self::Validation(_)
            | Self::Sink(_)
            | Self::ContentNotFound { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
