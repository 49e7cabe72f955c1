// ABOUTME: Owner-supplied notification sink for session lifecycle and tracking events
// ABOUTME: No-op defaults so consumers implement only the callbacks they care about
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fieldtrack Contributors

use crate::errors::TrackingError;
use crate::models::{Position, SessionStatus};

/// Callbacks a session owner receives as tracking progresses
///
/// Invoked from the session's background tasks outside any internal lock;
/// implementations should stay quick and hand heavy work to their own tasks.
/// Every method has a no-op default.
pub trait NotificationSink: Send + Sync {
    /// A fix was accepted while the session was Active
    fn on_location_update(&self, _position: &Position) {}

    /// The session transitioned lifecycle status
    fn on_status_change(&self, _status: SessionStatus) {}

    /// The geofence detected a return to the start point
    fn on_geofence_return(&self, _anchor: &Position, _current: &Position) {}

    /// A classified error occurred in a background path
    fn on_error(&self, _error: &TrackingError) {}
}

/// Sink that discards every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {}
