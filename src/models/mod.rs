// ABOUTME: Core data models for route tracking sessions
// ABOUTME: Position fixes, session records, derived metrics, and coordinate batches
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fieldtrack Contributors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single GPS fix from a location provider
///
/// Immutable value type. `accuracy` and `speed` are device-dependent and
/// frequently absent, so they stay optional rather than defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in decimal degrees (WGS84)
    pub latitude: f64,
    /// Longitude in decimal degrees (WGS84)
    pub longitude: f64,
    /// When the fix was taken (UTC)
    pub timestamp: DateTime<Utc>,
    /// Estimated horizontal accuracy in meters, if reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Instantaneous speed in m/s, if reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl Position {
    /// Create a position fix with only coordinates and a timestamp
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
            accuracy: None,
            speed: None,
        }
    }
}

/// Lifecycle status of a tracking session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Tracking is running: sampling, geofencing, and auto-save are live
    Active,
    /// Tracking is suspended; captured coordinates are preserved
    Paused,
    /// Terminal for the current record; also the idle state before `start`
    Completed,
}

impl SessionStatus {
    /// Label used in error messages and structured logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authoritative record of one tracking session
///
/// Coordinates live in the session's `PersistenceBuffer`, not here; this is
/// the identity and boundary data that the buffer is keyed by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session id issued by the remote route store
    pub id: String,
    /// Worker the route belongs to
    pub employee_id: String,
    /// Current lifecycle status
    pub status: SessionStatus,
    /// When the session started (issued by the remote store)
    pub start_time: DateTime<Utc>,
    /// When the session was stopped, once Completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// First captured fix; always equals `coordinates[0]`
    pub start_position: Position,
    /// Final fix, when one could be obtained during `stop`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_position: Option<Position>,
}

/// Serializable snapshot of a session for external consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    /// Session id
    pub id: String,
    /// Worker the route belongs to
    pub employee_id: String,
    /// Session start time
    pub start_time: DateTime<Utc>,
    /// Session end time, once stopped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Current lifecycle status
    pub status: SessionStatus,
    /// Start latitude in decimal degrees
    pub start_lat: f64,
    /// Start longitude in decimal degrees
    pub start_lng: f64,
    /// End latitude, when a final fix was captured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_lat: Option<f64>,
    /// End longitude, when a final fix was captured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_lng: Option<f64>,
    /// Total route distance over all captured coordinates, in km
    pub total_distance_km: f64,
}

/// Metrics derived on demand from a session's coordinate list
///
/// Never stored; recomputed from the full list on each read so there is no
/// incremental-update drift to reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Sum of pairwise great-circle distances, in km
    pub total_distance_km: f64,
    /// Elapsed whole seconds between start and end (or now), never negative
    pub total_time_sec: u64,
    /// Average speed in km/h; 0 when no time has elapsed
    pub average_speed_kmh: f64,
    /// Number of captured coordinates
    pub coordinate_count: usize,
    /// Timestamp of the most recent coordinate, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

/// Condensed per-session summary for listings and reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session id
    pub id: String,
    /// Worker the route belongs to
    pub employee_id: String,
    /// Current lifecycle status
    pub status: SessionStatus,
    /// Elapsed whole seconds
    pub duration_sec: u64,
    /// Total route distance in km
    pub distance_km: f64,
    /// Average speed in km/h
    pub average_speed_kmh: f64,
    /// Number of captured coordinates
    pub coordinate_count: usize,
    /// Session start time
    pub start_time: DateTime<Utc>,
    /// Session end time, once stopped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

/// One coordinate row as submitted to the remote route store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinateRow {
    /// Session the coordinate belongs to
    pub session_id: String,
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lng: f64,
    /// When the fix was taken (UTC)
    pub timestamp: DateTime<Utc>,
    /// Estimated horizontal accuracy in meters, if reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Instantaneous speed in m/s, if reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl CoordinateRow {
    /// Build a row from a position fix for the given session
    #[must_use]
    pub fn from_position(session_id: &str, position: &Position) -> Self {
        Self {
            session_id: session_id.to_owned(),
            lat: position.latitude,
            lng: position.longitude,
            timestamp: position.timestamp,
            accuracy: position.accuracy,
            speed: position.speed,
        }
    }
}

/// A batch of coordinates bound for one remote submission
///
/// Delivery is at-least-once: the remote store deduplicates rows by
/// `(session_id, timestamp)`, so resubmitting a batch is safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinateBatch {
    /// Session the batch belongs to
    pub session_id: String,
    /// Rows in capture order
    pub rows: Vec<CoordinateRow>,
}

impl CoordinateBatch {
    /// Build a batch from a slice of position fixes
    #[must_use]
    pub fn from_positions(session_id: &str, positions: &[Position]) -> Self {
        Self {
            session_id: session_id.to_owned(),
            rows: positions
                .iter()
                .map(|p| CoordinateRow::from_position(session_id, p))
                .collect(),
        }
    }

    /// Number of rows in the batch
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the batch carries no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
