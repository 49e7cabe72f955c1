// ABOUTME: Route session lifecycle state machine orchestrating capture, geofencing, and persistence
// ABOUTME: start/pause/resume/stop/cleanup with timer-driven sampling and auto-save tasks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fieldtrack Contributors

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::buffer::PersistenceBuffer;
use crate::config::TrackingConfig;
use crate::errors::{TrackingError, TrackingResult};
use crate::geofence::GeofenceMonitor;
use crate::metrics;
use crate::models::{Position, SessionData, SessionMetrics, SessionRecord, SessionStatus, SessionSummary};
use crate::notifications::NotificationSink;
use crate::position::PositionSource;
use crate::store::{RouteStore, SideChannel};

/// Background tasks owned by an Active session
#[derive(Default)]
struct TaskSet {
    sampler: Option<JoinHandle<()>>,
    flusher: Option<JoinHandle<()>>,
}

impl TaskSet {
    /// Abort both tasks; dropping the sampler also stops its subscription
    fn abort_all(&mut self) {
        if let Some(handle) = self.sampler.take() {
            handle.abort();
        }
        if let Some(handle) = self.flusher.take() {
            handle.abort();
        }
    }
}

struct SessionState {
    record: Option<SessionRecord>,
    buffer: Option<Arc<PersistenceBuffer>>,
    geofence: Option<GeofenceMonitor>,
    tasks: TaskSet,
}

impl SessionState {
    /// Current lifecycle status; Completed doubles as the idle pre-start state
    fn status(&self) -> SessionStatus {
        self.record
            .as_ref()
            .map_or(SessionStatus::Completed, |r| r.status)
    }
}

struct SessionInner {
    state: Mutex<SessionState>,
}

impl SessionInner {
    /// Run a closure against the locked state; no-op on a poisoned lock
    fn with_state<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
        match self.state.lock() {
            Ok(mut state) => Some(f(&mut state)),
            Err(_) => {
                error!("session state poisoned");
                None
            }
        }
    }
}

/// Lifecycle manager for exactly one logical tracking session
///
/// Owns its coordinate buffer, geofence state, and timers exclusively; there
/// is no cross-session shared mutable state. Construct one `RouteSession`
/// per active tracking session with injected collaborators.
///
/// Lifecycle transitions are `Completed -> Active` (`start`),
/// `Active <-> Paused` (`pause`/`resume`), and
/// `{Active, Paused} -> Completed` (`stop`). Anything else fails with
/// `InvalidStateTransition` and mutates nothing.
pub struct RouteSession {
    config: TrackingConfig,
    source: Arc<dyn PositionSource>,
    store: Arc<dyn RouteStore>,
    side_channel: Arc<dyn SideChannel>,
    sink: Arc<dyn NotificationSink>,
    // Serializes lifecycle operations so concurrent start/stop calls cannot
    // interleave their pre-check and commit phases.
    lifecycle: tokio::sync::Mutex<()>,
    inner: Arc<SessionInner>,
}

impl RouteSession {
    /// Create a session manager with injected collaborators
    #[must_use]
    pub fn new(
        config: TrackingConfig,
        source: Arc<dyn PositionSource>,
        store: Arc<dyn RouteStore>,
        side_channel: Arc<dyn SideChannel>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config,
            source,
            store,
            side_channel,
            sink,
            lifecycle: tokio::sync::Mutex::new(()),
            inner: Arc::new(SessionInner {
                state: Mutex::new(SessionState {
                    record: None,
                    buffer: None,
                    geofence: None,
                    tasks: TaskSet::default(),
                }),
            }),
        }
    }

    /// Start tracking for a worker: `Completed -> Active`
    ///
    /// Requests permission, acquires the initial fix (bounded by the
    /// configured timeout), and registers the session with the remote store.
    /// Any failure before the commit leaves the manager untouched in
    /// Completed.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` when a session is already Active or Paused;
    /// `PermissionDenied`, `PositionUnavailable`, or `Timeout` from the
    /// location provider; `Persistence` when the remote store rejects the
    /// session.
    pub async fn start(&self, employee_id: &str) -> TrackingResult<()> {
        let _lifecycle = self.lifecycle.lock().await;

        let status = self.status();
        if status != SessionStatus::Completed {
            return Err(TrackingError::InvalidStateTransition {
                from: status,
                attempted: "start",
            });
        }

        self.source.request_permission().await?;
        let start_fix = self
            .source
            .current_position(self.config.position_timeout)
            .await?;

        let ack = self
            .store
            .start_session(employee_id, &start_fix)
            .await
            .map_err(|source| TrackingError::Persistence {
                context: "start_session",
                source,
            })?;

        let buffer = Arc::new(PersistenceBuffer::new(
            ack.id.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.side_channel),
        ));
        buffer.append(start_fix);

        self.inner.with_state(|state| {
            state.record = Some(SessionRecord {
                id: ack.id.clone(),
                employee_id: employee_id.to_owned(),
                status: SessionStatus::Active,
                start_time: ack.start_time,
                end_time: None,
                start_position: start_fix,
                end_position: None,
            });
            state.buffer = Some(Arc::clone(&buffer));
            state.geofence = Some(GeofenceMonitor::with_radius(
                start_fix,
                self.config.geofence_radius_km,
            ));
            self.spawn_tasks(state, Arc::clone(&buffer));
        });

        info!(
            session_id = %ack.id,
            employee_id,
            start_lat = start_fix.latitude,
            start_lng = start_fix.longitude,
            "tracking session started"
        );
        self.sink.on_status_change(SessionStatus::Active);
        Ok(())
    }

    /// Suspend tracking: `Active -> Paused`
    ///
    /// Cancels the sampling subscription and the auto-save timer before
    /// returning; every captured and unflushed coordinate is preserved.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` when the session is not Active.
    pub async fn pause(&self) -> TrackingResult<()> {
        let _lifecycle = self.lifecycle.lock().await;

        let session_id = self
            .inner
            .with_state(|state| {
                if state.status() != SessionStatus::Active {
                    return Err(TrackingError::InvalidStateTransition {
                        from: state.status(),
                        attempted: "pause",
                    });
                }
                state.tasks.abort_all();
                if let Some(record) = state.record.as_mut() {
                    record.status = SessionStatus::Paused;
                }
                Ok(state.record.as_ref().map_or_else(String::new, |r| r.id.clone()))
            })
            .ok_or(TrackingError::SessionNotInitialized)??;

        info!(session_id = %session_id, "tracking session paused");
        self.sink.on_status_change(SessionStatus::Paused);
        Ok(())
    }

    /// Resume tracking: `Paused -> Active`
    ///
    /// Restarts sampling and auto-save against the same session id and
    /// accumulated coordinates. Geofence arming is recomputed from the last
    /// captured fix, so a worker who paused while far from the start comes
    /// back armed rather than losing the pending detection.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` when the session is not Paused.
    pub async fn resume(&self) -> TrackingResult<()> {
        let _lifecycle = self.lifecycle.lock().await;

        let session_id = self
            .inner
            .with_state(|state| {
                if state.status() != SessionStatus::Paused {
                    return Err(TrackingError::InvalidStateTransition {
                        from: state.status(),
                        attempted: "resume",
                    });
                }
                let buffer = state.buffer.clone().ok_or(TrackingError::SessionNotInitialized)?;
                let last = buffer.last_position();
                if let (Some(fence), Some(position)) = (state.geofence.as_mut(), last) {
                    fence.rearm_from(&position);
                }
                if let Some(record) = state.record.as_mut() {
                    record.status = SessionStatus::Active;
                }
                self.spawn_tasks(state, buffer);
                Ok(state.record.as_ref().map_or_else(String::new, |r| r.id.clone()))
            })
            .ok_or(TrackingError::SessionNotInitialized)??;

        info!(session_id = %session_id, "tracking session resumed");
        self.sink.on_status_change(SessionStatus::Active);
        Ok(())
    }

    /// Finish tracking: `{Active, Paused} -> Completed`
    ///
    /// Best-effort by design: a final fix is attempted but never blocks
    /// completion, the remaining coordinates get one synchronous flush, and
    /// the remote session close is logged on failure. The session always
    /// reaches Completed.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` when no session is Active or Paused.
    pub async fn stop(&self) -> TrackingResult<()> {
        let _lifecycle = self.lifecycle.lock().await;

        let (session_id, buffer) = self
            .inner
            .with_state(|state| {
                let status = state.status();
                if status != SessionStatus::Active && status != SessionStatus::Paused {
                    return Err(TrackingError::InvalidStateTransition {
                        from: status,
                        attempted: "stop",
                    });
                }
                state.tasks.abort_all();
                let mut session_id = String::new();
                if let Some(record) = state.record.as_mut() {
                    record.status = SessionStatus::Completed;
                    record.end_time = Some(Utc::now());
                    session_id = record.id.clone();
                }
                Ok((session_id, state.buffer.clone()))
            })
            .ok_or(TrackingError::SessionNotInitialized)??;

        // Final fix is best-effort; completion never waits on GPS availability
        let end_fix = match self
            .source
            .current_position(self.config.position_timeout)
            .await
        {
            Ok(fix) => {
                if let Some(buffer) = buffer.as_ref() {
                    buffer.append(fix);
                }
                self.inner.with_state(|state| {
                    if let Some(record) = state.record.as_mut() {
                        record.end_position = Some(fix);
                    }
                });
                Some(fix)
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "final fix unavailable; completing without it");
                self.sink.on_error(&e);
                None
            }
        };

        // One synchronous flush of everything unsaved; failures are logged
        // inside the buffer and the tail stays recoverable offline
        if let Some(buffer) = buffer.as_ref() {
            let outcome = buffer.flush().await;
            debug!(session_id = %session_id, ?outcome, "final flush finished");
        }

        if let Err(e) = self.store.stop_session(&session_id, end_fix.as_ref()).await {
            warn!(session_id = %session_id, error = %e, "remote session close failed");
        }

        info!(session_id = %session_id, "tracking session completed");
        self.sink.on_status_change(SessionStatus::Completed);
        Ok(())
    }

    /// Release every resource and clear transient state
    ///
    /// Cancels timers and subscriptions and drops the coordinate buffer and
    /// geofence. The historical record of a stopped session is left as
    /// already persisted; a still-running record is marked Completed without
    /// notifications.
    pub async fn cleanup(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.inner.with_state(|state| {
            state.tasks.abort_all();
            state.buffer = None;
            state.geofence = None;
            if let Some(record) = state.record.as_mut() {
                if record.status != SessionStatus::Completed {
                    record.status = SessionStatus::Completed;
                    record.end_time = Some(Utc::now());
                }
            }
        });
        debug!("session resources released");
    }

    /// Whether the session is currently Active
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status() == SessionStatus::Active
    }

    /// Current lifecycle status; Completed when nothing was ever started
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.inner
            .with_state(|state| state.status())
            .unwrap_or(SessionStatus::Completed)
    }

    /// Defensive copy of the ordered coordinate list
    #[must_use]
    pub fn coordinates(&self) -> Vec<Position> {
        self.inner
            .with_state(|state| state.buffer.as_ref().map(|b| b.coordinates()))
            .flatten()
            .unwrap_or_default()
    }

    /// Serializable snapshot of the session
    ///
    /// # Errors
    ///
    /// `SessionNotInitialized` before the first `start`.
    pub fn session_data(&self) -> TrackingResult<SessionData> {
        self.with_record(|record, coordinates| SessionData {
            id: record.id.clone(),
            employee_id: record.employee_id.clone(),
            start_time: record.start_time,
            end_time: record.end_time,
            status: record.status,
            start_lat: record.start_position.latitude,
            start_lng: record.start_position.longitude,
            end_lat: record.end_position.map(|p| p.latitude),
            end_lng: record.end_position.map(|p| p.longitude),
            total_distance_km: crate::geo::path_distance_km(coordinates),
        })
    }

    /// Metrics recomputed on demand from the full coordinate list
    ///
    /// # Errors
    ///
    /// `SessionNotInitialized` before the first `start`.
    pub fn session_metrics(&self) -> TrackingResult<SessionMetrics> {
        self.with_record(|record, coordinates| {
            metrics::compute(coordinates, record.start_time, record.end_time)
        })
    }

    /// Condensed summary for listings
    ///
    /// # Errors
    ///
    /// `SessionNotInitialized` before the first `start`.
    pub fn session_summary(&self) -> TrackingResult<SessionSummary> {
        self.with_record(|record, coordinates| {
            let m = metrics::compute(coordinates, record.start_time, record.end_time);
            SessionSummary {
                id: record.id.clone(),
                employee_id: record.employee_id.clone(),
                status: record.status,
                duration_sec: m.total_time_sec,
                distance_km: m.total_distance_km,
                average_speed_kmh: m.average_speed_kmh,
                coordinate_count: m.coordinate_count,
                start_time: record.start_time,
                end_time: record.end_time,
            }
        })
    }

    fn with_record<R>(
        &self,
        f: impl FnOnce(&SessionRecord, &[Position]) -> R,
    ) -> TrackingResult<R> {
        self.inner
            .with_state(|state| {
                let coordinates = state
                    .buffer
                    .as_ref()
                    .map(|b| b.coordinates())
                    .unwrap_or_default();
                state
                    .record
                    .as_ref()
                    .map(|record| f(record, &coordinates))
                    .ok_or(TrackingError::SessionNotInitialized)
            })
            .ok_or(TrackingError::SessionNotInitialized)?
    }

    /// Spawn the sampling and auto-save tasks for an Active session
    ///
    /// Called with the state lock held; both tasks re-check status under the
    /// lock before touching anything, so a task that outlives its transition
    /// by a tick cannot mutate a torn-down session.
    fn spawn_tasks(&self, state: &mut SessionState, buffer: Arc<PersistenceBuffer>) {
        let mut subscription = self.source.start_tracking(self.config.tracking_interval);
        let inner = Arc::clone(&self.inner);
        let sink = Arc::clone(&self.sink);
        state.tasks.sampler = Some(tokio::spawn(async move {
            while let Some(update) = subscription.next().await {
                match update {
                    Ok(position) => Self::accept_position(&inner, sink.as_ref(), position),
                    Err(e) => {
                        warn!(error = %e, "position stream error");
                        sink.on_error(&e);
                    }
                }
            }
            debug!("sampling task exited");
        }));

        let interval = self.config.auto_save_interval;
        state.tasks.flusher = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick of a tokio interval fires immediately; the
            // auto-save cadence starts one full interval after activation.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                buffer.flush().await;
            }
        }));
    }

    /// Handle one accepted fix: append, geofence, notify
    ///
    /// Appending and geofence toggling happen under the state lock as one
    /// atomic step; notifications go out after the lock is released.
    fn accept_position(inner: &SessionInner, sink: &dyn NotificationSink, position: Position) {
        // None = fix dropped (post-transition delivery or poisoned state);
        // Some(inner) = fix accepted, inner carrying any geofence event.
        let accepted = inner
            .with_state(|state| {
                if state.status() != SessionStatus::Active {
                    debug!("dropping fix delivered after transition");
                    return None;
                }
                let buffer = state.buffer.as_ref()?;
                buffer.append(position);
                Some(state.geofence.as_mut().and_then(|fence| fence.observe(&position)))
            })
            .flatten();

        let Some(fence_event) = accepted else {
            return;
        };

        sink.on_location_update(&position);
        if let Some(event) = fence_event {
            info!(
                distance_km = event.distance_km,
                "worker returned to start point"
            );
            sink.on_geofence_return(&event.anchor, &event.current);
        }
    }
}
