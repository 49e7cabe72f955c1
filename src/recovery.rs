// ABOUTME: Connectivity-restoration sweep draining the durable side channel
// ABOUTME: Resubmits offline-buffered coordinate tails with at-least-once semantics
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fieldtrack Contributors

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::StoreError;
use crate::models::{CoordinateBatch, Position};
use crate::store::{side_channel_key, RouteStore, SideChannel};

/// Result of draining one session's side-channel entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// No entry was pending for the session
    Nothing,
    /// The entry was resubmitted and removed
    Drained {
        /// Rows resubmitted to the remote store
        rows: usize,
    },
}

/// Resubmit a session's offline-buffered tail once connectivity is confirmed
///
/// Delivery is at-least-once: a crash between submission and removal leaves
/// the entry in place and the next sweep submits it again, which the remote
/// store deduplicates by `(session_id, timestamp)`. Running the sweep twice
/// is therefore always safe.
///
/// # Errors
///
/// Returns the underlying `StoreError` when the side channel cannot be read
/// or the remote store rejects the batch; the entry is left in place for the
/// next sweep in both cases.
pub async fn drain_side_channel(
    store: &Arc<dyn RouteStore>,
    side_channel: &Arc<dyn SideChannel>,
    session_id: &str,
) -> Result<DrainOutcome, StoreError> {
    let key = side_channel_key(session_id);
    let Some(payload) = side_channel.get(&key).await? else {
        debug!(session_id, "no offline tail pending");
        return Ok(DrainOutcome::Nothing);
    };

    let positions: Vec<Position> =
        serde_json::from_str(&payload).map_err(|source| StoreError::Serialization {
            context: "offline coordinate tail",
            source,
        })?;

    if positions.is_empty() {
        side_channel.remove(&key).await?;
        return Ok(DrainOutcome::Nothing);
    }

    let batch = CoordinateBatch::from_positions(session_id, &positions);
    store.submit_batch(&batch).await.map_err(|e| {
        warn!(session_id, rows = batch.len(), error = %e, "recovery resubmission failed");
        e
    })?;

    // Submission acknowledged; removal failure just means one redundant
    // resubmit on the next sweep.
    side_channel.remove(&key).await?;
    info!(session_id, rows = batch.len(), "offline tail drained to remote store");
    Ok(DrainOutcome::Drained { rows: batch.len() })
}
