// ABOUTME: Persistence collaborator contracts for route sessions
// ABOUTME: RouteStore remote API trait, SideChannel durable local fallback trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fieldtrack Contributors

/// Durable file-backed side channel
pub mod file;
/// In-memory reference implementations
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;
use crate::models::{CoordinateBatch, Position};

/// Acknowledgement returned when the remote store opens a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStartAck {
    /// Server-issued session id
    pub id: String,
    /// Server-issued start time
    pub start_time: DateTime<Utc>,
}

/// Remote route-tracking store
///
/// Batch submission is at-least-once: the backend deduplicates coordinate
/// rows by `(session_id, timestamp)`, so callers may resubmit a batch after
/// a failure or during offline recovery without corrupting the record.
#[async_trait]
pub trait RouteStore: Send + Sync {
    /// Open a session for a worker at their start position
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Remote` when the backend is unreachable or
    /// rejects the request.
    async fn start_session(
        &self,
        employee_id: &str,
        start: &Position,
    ) -> Result<SessionStartAck, StoreError>;

    /// Close a session, recording the final position when one exists
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Remote` when the backend is unreachable or
    /// rejects the request.
    async fn stop_session(&self, session_id: &str, end: Option<&Position>)
        -> Result<(), StoreError>;

    /// Submit one batch of coordinates
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Remote` when the backend is unreachable or
    /// rejects the batch.
    async fn submit_batch(&self, batch: &CoordinateBatch) -> Result<(), StoreError>;
}

/// Durable local key/value side channel
///
/// Holds unsaved coordinate tails across process restarts while the remote
/// store is unreachable. Values are opaque strings; the buffer stores JSON.
#[async_trait]
pub trait SideChannel: Send + Sync {
    /// Write or replace a value
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Local` on I/O failure.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Read a value, `None` when absent
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Local` on I/O failure.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Delete a value; absent keys are a no-op
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Local` on I/O failure.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Side-channel key for a session's unsaved coordinate tail
#[must_use]
pub fn side_channel_key(session_id: &str) -> String {
    format!("route_session_{session_id}")
}
