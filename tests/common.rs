// ABOUTME: Shared test doubles for route session integration tests
// ABOUTME: Manually-driven position source, fault-injecting store, recording sink
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fieldtrack Contributors
#![allow(missing_docs, dead_code, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use fieldtrack::errors::{StoreError, TrackingError, TrackingResult};
use fieldtrack::models::{CoordinateBatch, Position, SessionStatus};
use fieldtrack::notifications::NotificationSink;
use fieldtrack::position::{PositionFeed, PositionSource, PositionSubscription};
use fieldtrack::store::memory::InMemoryRouteStore;
use fieldtrack::store::{RouteStore, SessionStartAck};

/// Fixed depot used as the default fix in tests
pub const DEPOT: (f64, f64) = (40.0, -74.0);

pub fn depot_fix() -> Position {
    Position::new(DEPOT.0, DEPOT.1, Utc::now())
}

/// Fix displaced `meters` north of the depot; 1 deg latitude ~= 111.19 km
pub fn north_of_depot(meters: f64) -> Position {
    Position::new(DEPOT.0 + meters / 111_190.0, DEPOT.1, Utc::now())
}

/// Position source driven explicitly by the test
///
/// Single-shot responses come from a queue (defaulting to the depot fix when
/// empty); continuous fixes are pushed through `emit` after `start_tracking`
/// has been called by the session.
#[derive(Default)]
pub struct ManualPositionSource {
    feed: Mutex<Option<PositionFeed>>,
    single_shot: Mutex<VecDeque<TrackingResult<Position>>>,
    deny_permission: AtomicBool,
}

impl ManualPositionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny_permission(&self) {
        self.deny_permission.store(true, Ordering::SeqCst);
    }

    /// Queue the next single-shot response (used by `start` and `stop` fixes)
    pub fn queue_single_shot(&self, response: TrackingResult<Position>) {
        self.single_shot.lock().unwrap().push_back(response);
    }

    /// Whether the session has subscribed to continuous tracking
    pub fn is_tracking(&self) -> bool {
        self.feed
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|feed| !feed.is_stopped())
    }

    /// Deliver one continuous fix to the active subscription
    pub async fn emit(&self, position: Position) {
        let feed = self.feed.lock().unwrap().clone();
        let feed = feed.expect("emit before start_tracking");
        assert!(feed.deliver(Ok(position)).await, "subscription stopped");
    }

    /// Deliver a classified error to the active subscription
    pub async fn emit_error(&self, error: TrackingError) {
        let feed = self.feed.lock().unwrap().clone();
        let feed = feed.expect("emit before start_tracking");
        feed.deliver(Err(error)).await;
    }
}

#[async_trait]
impl PositionSource for ManualPositionSource {
    async fn request_permission(&self) -> TrackingResult<Position> {
        if self.deny_permission.load(Ordering::SeqCst) {
            return Err(TrackingError::PermissionDenied);
        }
        Ok(depot_fix())
    }

    async fn current_position(&self, _timeout: Duration) -> TrackingResult<Position> {
        self.single_shot
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(depot_fix()))
    }

    fn start_tracking(&self, _interval: Duration) -> PositionSubscription {
        let (feed, subscription) = PositionSubscription::channel();
        *self.feed.lock().unwrap() = Some(feed);
        subscription
    }
}

/// Route store with per-operation fault injection over the in-memory store
pub struct FaultyRouteStore {
    pub inner: Arc<InMemoryRouteStore>,
    pub fail_start: AtomicBool,
    pub fail_stop: AtomicBool,
    pub fail_submit: AtomicBool,
}

impl FaultyRouteStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(InMemoryRouteStore::new()),
            fail_start: AtomicBool::new(false),
            fail_stop: AtomicBool::new(false),
            fail_submit: AtomicBool::new(false),
        }
    }

    fn rejected(operation: &'static str) -> StoreError {
        StoreError::Remote {
            operation,
            reason: "injected network failure".to_owned(),
        }
    }
}

impl Default for FaultyRouteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RouteStore for FaultyRouteStore {
    async fn start_session(
        &self,
        employee_id: &str,
        start: &Position,
    ) -> Result<SessionStartAck, StoreError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(Self::rejected("start_session"));
        }
        self.inner.start_session(employee_id, start).await
    }

    async fn stop_session(
        &self,
        session_id: &str,
        end: Option<&Position>,
    ) -> Result<(), StoreError> {
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(Self::rejected("stop_session"));
        }
        self.inner.stop_session(session_id, end).await
    }

    async fn submit_batch(&self, batch: &CoordinateBatch) -> Result<(), StoreError> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(Self::rejected("submit_batch"));
        }
        self.inner.submit_batch(batch).await
    }
}

/// Sink recording every notification for later assertions
#[derive(Default)]
pub struct RecordingSink {
    pub statuses: Mutex<Vec<SessionStatus>>,
    pub locations: AtomicUsize,
    pub geofence_returns: AtomicUsize,
    pub errors: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statuses(&self) -> Vec<SessionStatus> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn geofence_returns(&self) -> usize {
        self.geofence_returns.load(Ordering::SeqCst)
    }

    pub fn locations(&self) -> usize {
        self.locations.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }
}

impl NotificationSink for RecordingSink {
    fn on_location_update(&self, _position: &Position) {
        self.locations.fetch_add(1, Ordering::SeqCst);
    }

    fn on_status_change(&self, status: SessionStatus) {
        self.statuses.lock().unwrap().push(status);
    }

    fn on_geofence_return(&self, _anchor: &Position, _current: &Position) {
        self.geofence_returns.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&self, _error: &TrackingError) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

/// Poll `cond` until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}
