// ABOUTME: In-memory route store and side channel for demos and tests
// ABOUTME: Deduplicates coordinate rows by (session_id, timestamp) like the production backend
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fieldtrack Contributors

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{RouteStore, SessionStartAck, SideChannel};
use crate::errors::StoreError;
use crate::models::{CoordinateBatch, CoordinateRow, Position};

/// Remote session row kept by the in-memory store
#[derive(Debug, Clone)]
pub struct StoredSession {
    /// Session id
    pub id: String,
    /// Worker the route belongs to
    pub employee_id: String,
    /// When the session was opened
    pub start_time: DateTime<Utc>,
    /// Start position as submitted
    pub start: Position,
    /// Final position, once stopped with a fix
    pub end: Option<Position>,
    /// Whether the session has been closed
    pub stopped: bool,
}

#[derive(Default)]
struct StoreState {
    sessions: HashMap<String, StoredSession>,
    rows: Vec<CoordinateRow>,
    seen: HashSet<(String, DateTime<Utc>)>,
    batch_submissions: usize,
    rows_submitted_total: usize,
}

/// In-memory `RouteStore` mirroring the production backend's dedup behavior
///
/// Rows are deduplicated by `(session_id, timestamp)` so at-least-once
/// delivery from the persistence buffer or the recovery sweep cannot double
/// coordinates.
#[derive(Default)]
pub struct InMemoryRouteStore {
    state: Mutex<StoreState>,
}

impl InMemoryRouteStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored coordinate rows in submission order, duplicates already dropped
    #[must_use]
    pub fn rows(&self) -> Vec<CoordinateRow> {
        self.state.lock().map_or_else(|_| Vec::new(), |s| s.rows.clone())
    }

    /// Number of `submit_batch` calls that carried at least one row
    #[must_use]
    pub fn batch_submissions(&self) -> usize {
        self.state.lock().map_or(0, |s| s.batch_submissions)
    }

    /// Total rows ever submitted, counting duplicates before deduplication
    #[must_use]
    pub fn rows_submitted_total(&self) -> usize {
        self.state.lock().map_or(0, |s| s.rows_submitted_total)
    }

    /// Look up a stored session by id
    #[must_use]
    pub fn session(&self, session_id: &str) -> Option<StoredSession> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.sessions.get(session_id).cloned())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Remote {
            operation: "lock",
            reason: "store state poisoned".to_owned(),
        })
    }
}

#[async_trait]
impl RouteStore for InMemoryRouteStore {
    async fn start_session(
        &self,
        employee_id: &str,
        start: &Position,
    ) -> Result<SessionStartAck, StoreError> {
        let mut state = self.lock()?;
        let ack = SessionStartAck {
            id: Uuid::new_v4().to_string(),
            start_time: Utc::now(),
        };
        state.sessions.insert(
            ack.id.clone(),
            StoredSession {
                id: ack.id.clone(),
                employee_id: employee_id.to_owned(),
                start_time: ack.start_time,
                start: *start,
                end: None,
                stopped: false,
            },
        );
        Ok(ack)
    }

    async fn stop_session(
        &self,
        session_id: &str,
        end: Option<&Position>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let session = state.sessions.get_mut(session_id).ok_or(StoreError::Remote {
            operation: "stop_session",
            reason: format!("unknown session {session_id}"),
        })?;
        session.stopped = true;
        session.end = end.copied();
        Ok(())
    }

    async fn submit_batch(&self, batch: &CoordinateBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut state = self.lock()?;
        state.batch_submissions += 1;
        state.rows_submitted_total += batch.len();
        for row in &batch.rows {
            if state.seen.insert((row.session_id.clone(), row.timestamp)) {
                state.rows.push(row.clone());
            }
        }
        Ok(())
    }
}

/// In-memory `SideChannel` for tests and the demo binary
#[derive(Default)]
pub struct InMemorySideChannel {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemorySideChannel {
    /// Create an empty side channel
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |e| e.len())
    }

    /// Whether no keys are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
        operation: &'static str,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.entries.lock().map_err(|_| StoreError::Local {
            operation,
            source: std::io::Error::other("side channel state poisoned"),
        })
    }
}

#[async_trait]
impl SideChannel for InMemorySideChannel {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock("set")?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock("get")?.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.lock("remove")?.remove(key);
        Ok(())
    }
}
