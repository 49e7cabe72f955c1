// ABOUTME: Derived session metrics computed on demand from the full coordinate list
// ABOUTME: Total distance, elapsed time, and average speed with no incremental state
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fieldtrack Contributors

use chrono::{DateTime, Utc};

use crate::geo;
use crate::models::{Position, SessionMetrics};

/// Compute metrics for a session's coordinates and time window
///
/// `end_time` falls back to the current instant for a running session.
/// Recomputing from the full list on every read keeps the result free of
/// incremental-update drift; typical per-session counts are in the hundreds,
/// so the cost is negligible.
#[must_use]
pub fn compute(
    coordinates: &[Position],
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
) -> SessionMetrics {
    let total_distance_km = geo::path_distance_km(coordinates);
    let total_time_sec = elapsed_whole_seconds(start_time, end_time.unwrap_or_else(Utc::now));
    let average_speed_kmh = if total_time_sec == 0 {
        0.0
    } else {
        total_distance_km / (total_time_sec as f64 / 3600.0)
    };

    SessionMetrics {
        total_distance_km,
        total_time_sec,
        average_speed_kmh,
        coordinate_count: coordinates.len(),
        last_update: coordinates.last().map(|p| p.timestamp),
    }
}

/// Whole seconds between two instants, floored and never negative
fn elapsed_whole_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    let secs = (end - start).num_seconds();
    u64::try_from(secs).unwrap_or(0)
}
