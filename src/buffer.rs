// ABOUTME: Offline-tolerant coordinate persistence buffer with a monotonic save cursor
// ABOUTME: Decouples GPS capture rate from network availability; falls back to a durable side channel
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fieldtrack Contributors

use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use crate::models::{CoordinateBatch, Position};
use crate::store::{side_channel_key, RouteStore, SideChannel};

/// What one `flush` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was unsaved at invocation; no batch was submitted
    Empty,
    /// The batch was acknowledged remotely and the cursor advanced
    Saved {
        /// Rows acknowledged by this call
        count: usize,
    },
    /// The remote write failed; rows stay unsaved and were mirrored locally
    Deferred {
        /// Rows still awaiting remote acknowledgement
        count: usize,
    },
}

struct BufferState {
    coordinates: Vec<Position>,
    cursor: usize,
}

/// Per-session coordinate buffer between capture and the remote store
///
/// `append` is memory-only and instantaneous relative to the sampling timer.
/// `flush` submits the unsaved suffix `[cursor, len)` as one batch; the
/// cursor marks the durably-acknowledged prefix and never regresses. Flushes
/// are serialized by an async gate, so concurrent or repeated calls cannot
/// resubmit an acknowledged prefix; positions appended mid-flush simply ride
/// the next one.
///
/// Remote failures never propagate: the unsaved slice is mirrored to the
/// durable side channel under `route_session_{id}` and the session keeps
/// operating in degraded offline mode.
pub struct PersistenceBuffer {
    session_id: String,
    store: Arc<dyn RouteStore>,
    side_channel: Arc<dyn SideChannel>,
    state: Mutex<BufferState>,
    flush_gate: tokio::sync::Mutex<()>,
}

impl PersistenceBuffer {
    /// Create an empty buffer for one session
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        store: Arc<dyn RouteStore>,
        side_channel: Arc<dyn SideChannel>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            store,
            side_channel,
            state: Mutex::new(BufferState {
                coordinates: Vec::new(),
                cursor: 0,
            }),
            flush_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Session the buffer belongs to
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Append one fix to the in-memory tail; performs no I/O
    pub fn append(&self, position: Position) {
        let Ok(mut state) = self.state.lock() else {
            error!(session_id = %self.session_id, "buffer state poisoned; dropping fix");
            return;
        };
        state.coordinates.push(position);
    }

    /// Defensive copy of the full ordered coordinate list
    #[must_use]
    pub fn coordinates(&self) -> Vec<Position> {
        self.state
            .lock()
            .map_or_else(|_| Vec::new(), |s| s.coordinates.clone())
    }

    /// Total captured coordinates
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().map_or(0, |s| s.coordinates.len())
    }

    /// Whether nothing has been captured yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recently captured fix, if any
    #[must_use]
    pub fn last_position(&self) -> Option<Position> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.coordinates.last().copied())
    }

    /// Durably-acknowledged prefix length
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.state.lock().map_or(0, |s| s.cursor)
    }

    /// Coordinates captured but not yet acknowledged remotely
    #[must_use]
    pub fn unsaved_len(&self) -> usize {
        self.state
            .lock()
            .map_or(0, |s| s.coordinates.len() - s.cursor)
    }

    /// Submit the unsaved suffix as one batch
    ///
    /// All failures are handled here: on remote failure the slice is mirrored
    /// to the side channel and the outcome reports `Deferred`. Callers never
    /// see an error, per the degraded-offline-mode contract.
    pub async fn flush(&self) -> FlushOutcome {
        let _gate = self.flush_gate.lock().await;

        // Snapshot the unsaved slice as of invocation; appends racing this
        // flush land beyond `end` and belong to the next cycle.
        let (snapshot, start) = {
            let Ok(state) = self.state.lock() else {
                error!(session_id = %self.session_id, "buffer state poisoned; skipping flush");
                return FlushOutcome::Empty;
            };
            (state.coordinates[state.cursor..].to_vec(), state.cursor)
        };

        if snapshot.is_empty() {
            debug!(session_id = %self.session_id, "flush found nothing unsaved");
            return FlushOutcome::Empty;
        }

        let end = start + snapshot.len();
        let batch = CoordinateBatch::from_positions(&self.session_id, &snapshot);

        match self.store.submit_batch(&batch).await {
            Ok(()) => {
                if let Ok(mut state) = self.state.lock() {
                    state.cursor = state.cursor.max(end);
                }
                info!(
                    session_id = %self.session_id,
                    saved = snapshot.len(),
                    cursor = end,
                    "coordinate batch acknowledged"
                );
                // The durable tail is now empty; drop any stale mirror so a
                // later recovery sweep has nothing redundant to resubmit.
                let key = side_channel_key(&self.session_id);
                if let Err(e) = self.side_channel.remove(&key).await {
                    warn!(session_id = %self.session_id, error = %e, "stale side channel entry not removed");
                }
                FlushOutcome::Saved {
                    count: snapshot.len(),
                }
            }
            Err(e) => {
                warn!(
                    session_id = %self.session_id,
                    unsaved = snapshot.len(),
                    error = %e,
                    "remote batch write failed; buffering locally"
                );
                self.mirror_to_side_channel(&snapshot).await;
                FlushOutcome::Deferred {
                    count: snapshot.len(),
                }
            }
        }
    }

    /// Write the unsaved slice to the durable side channel
    ///
    /// The value always holds the full unsaved tail, so repeated failures
    /// overwrite with a superset and recovery needs only the latest entry.
    async fn mirror_to_side_channel(&self, unsaved: &[Position]) {
        let json = match serde_json::to_string(unsaved) {
            Ok(json) => json,
            Err(e) => {
                error!(session_id = %self.session_id, error = %e, "failed to encode unsaved tail");
                return;
            }
        };
        let key = side_channel_key(&self.session_id);
        match self.side_channel.set(&key, &json).await {
            Ok(()) => {
                info!(
                    session_id = %self.session_id,
                    key = %key,
                    rows = unsaved.len(),
                    "unsaved tail mirrored to side channel"
                );
            }
            Err(e) => {
                // Both persistence paths failed; the tail is still in memory
                // and the next flush cycle retries everything.
                error!(session_id = %self.session_id, error = %e, "side channel write failed");
            }
        }
    }
}
