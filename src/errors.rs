// ABOUTME: Error taxonomy for route tracking sessions and their collaborators
// ABOUTME: TrackingError for the session core, StoreError for remote/local persistence I/O
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fieldtrack Contributors

use crate::models::SessionStatus;

/// Errors from the remote route store and the durable local side channel
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The remote route store rejected or failed an operation
    #[error("remote store {operation} failed: {reason}")]
    Remote {
        /// Operation that failed (`start_session`, `submit_batch`, ...)
        operation: &'static str,
        /// Reason reported by the transport or backend
        reason: String,
    },

    /// The durable local side channel failed
    #[error("local side channel {operation} failed")]
    Local {
        /// Operation that failed (`set`, `get`, `remove`)
        operation: &'static str,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Payload could not be (de)serialized for storage
    #[error("serialization failed for {context}")]
    Serialization {
        /// What was being serialized
        context: &'static str,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },
}

/// Errors surfaced by the route session core
///
/// Nothing here may crash the host: lifecycle methods return these
/// synchronously, background failures go to the notification sink, and
/// persistence failures degrade to offline buffering instead of propagating.
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    /// Location permission was denied; requires user action, never auto-retried
    #[error("location permission denied")]
    PermissionDenied,

    /// The device could not produce a fix
    #[error("position unavailable: {reason}")]
    PositionUnavailable {
        /// Reason reported by the location provider
        reason: String,
    },

    /// A position request exceeded its caller-supplied timeout
    #[error("position request timed out after {waited_ms}ms")]
    Timeout {
        /// How long the caller waited, in milliseconds
        waited_ms: u64,
    },

    /// A lifecycle call was made from a state that does not permit it
    #[error("invalid state transition: cannot {attempted} while {from}")]
    InvalidStateTransition {
        /// State the session was in
        from: SessionStatus,
        /// Lifecycle operation that was attempted
        attempted: &'static str,
    },

    /// A session accessor was called before any session was started
    #[error("no session has been started")]
    SessionNotInitialized,

    /// A persistence operation failed in a context where it must be reported
    #[error("persistence failure during {context}")]
    Persistence {
        /// What the session was doing
        context: &'static str,
        /// Underlying store error
        #[source]
        source: StoreError,
    },
}

impl TrackingError {
    /// Whether an external recovery collaborator may retry the failed call
    ///
    /// Permission denials and invalid transitions are not retryable; device
    /// hiccups, timeouts, and persistence failures are.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::PositionUnavailable { .. } | Self::Timeout { .. } | Self::Persistence { .. } => {
                true
            }
            Self::PermissionDenied
            | Self::InvalidStateTransition { .. }
            | Self::SessionNotInitialized => false,
        }
    }
}

/// Convenience alias for session-core results
pub type TrackingResult<T> = Result<T, TrackingError>;
