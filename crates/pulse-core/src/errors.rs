//! Error types for the realtime core.
//!
//! Only [`RealtimeError`] ever reaches a client. [`DeliveryError`] and
//! [`StoreError`] are produced by collaborators and absorbed inside the core:
//! a failed delivery is logged, a failed backfill becomes an empty result.

use thiserror::Error;

use crate::ids::SessionId;
use crate::scope::ScopeKey;

// ── Wire error codes ────────────────────────────────────────────────────────

/// No authenticated principal on the call.
pub const AUTHENTICATION_REQUIRED: &str = "AUTHENTICATION_REQUIRED";
/// Principal may not access the requested scope.
pub const AUTHORIZATION_DENIED: &str = "AUTHORIZATION_DENIED";
/// Session is not registered.
pub const UNKNOWN_SESSION: &str = "UNKNOWN_SESSION";
/// Session ID already registered.
pub const DUPLICATE_SESSION: &str = "DUPLICATE_SESSION";
/// Scope could not be parsed.
pub const INVALID_SCOPE: &str = "INVALID_SCOPE";
/// Session was torn down while the call was in flight.
pub const SESSION_CLOSED: &str = "SESSION_CLOSED";
/// Client frame could not be decoded.
pub const INVALID_FRAME: &str = "INVALID_FRAME";

/// Errors returned by inbound lifecycle operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RealtimeError {
    /// No valid principal.
    #[error("authentication required")]
    AuthenticationRequired,

    /// Principal lacks access to the scope.
    #[error("access to {scope} denied")]
    AuthorizationDenied {
        /// The rejected scope.
        scope: ScopeKey,
    },

    /// Session absent from the registry.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// Session ID already in use.
    #[error("session already registered: {0}")]
    DuplicateSession(SessionId),

    /// Unparseable scope text.
    #[error("invalid scope: {0}")]
    InvalidScope(String),

    /// Session disconnected while the operation was running.
    #[error("session closed: {0}")]
    SessionClosed(SessionId),
}

impl RealtimeError {
    /// Wire error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthenticationRequired => AUTHENTICATION_REQUIRED,
            Self::AuthorizationDenied { .. } => AUTHORIZATION_DENIED,
            Self::UnknownSession(_) => UNKNOWN_SESSION,
            Self::DuplicateSession(_) => DUPLICATE_SESSION,
            Self::InvalidScope(_) => INVALID_SCOPE,
            Self::SessionClosed(_) => SESSION_CLOSED,
        }
    }
}

/// Per-recipient delivery failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The recipient's outbound channel is gone.
    #[error("recipient channel closed")]
    Closed,
    /// The recipient's outbound queue is full.
    #[error("recipient queue full ({dropped} dropped so far)")]
    Backpressure {
        /// Total frames dropped for this recipient.
        dropped: u64,
    },
    /// The frame could not be encoded.
    #[error("failed to encode frame: {0}")]
    Serialize(String),
    /// The transport did not accept the frame in time.
    #[error("delivery timed out")]
    TimedOut,
}

impl DeliveryError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Backpressure { .. } => "backpressure",
            Self::Serialize(_) => "serialize",
            Self::TimedOut => "timeout",
        }
    }
}

/// Activity store failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store could not be reached.
    #[error("activity store unavailable: {0}")]
    Unavailable(String),
    /// Query was rejected or failed.
    #[error("activity query failed: {0}")]
    Query(String),
}

/// Result alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, RealtimeError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
