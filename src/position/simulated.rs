// ABOUTME: Scripted location provider walking a fixed waypoint route
// ABOUTME: Deterministic fixes with optional jitter for demos and integration tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fieldtrack Contributors

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use tracing::debug;

use super::{PositionSource, PositionSubscription};
use crate::errors::{TrackingError, TrackingResult};
use crate::models::Position;

/// Location provider that replays a scripted waypoint route
///
/// Single-shot requests and continuous tracking share one cursor, so a
/// session started against this source walks the route in order regardless
/// of how fixes are requested. Once the route is exhausted the last waypoint
/// repeats, which models a stationary worker.
pub struct SimulatedPositionSource {
    waypoints: Vec<(f64, f64)>,
    cursor: Arc<AtomicUsize>,
    jitter_deg: f64,
    permission_granted: bool,
}

impl SimulatedPositionSource {
    /// Create a source that walks `waypoints` as `(latitude, longitude)` pairs
    #[must_use]
    pub fn new(waypoints: Vec<(f64, f64)>) -> Self {
        Self {
            waypoints,
            cursor: Arc::new(AtomicUsize::new(0)),
            jitter_deg: 0.0,
            permission_granted: true,
        }
    }

    /// Add uniform per-fix noise of up to `jitter_deg` degrees on each axis
    #[must_use]
    pub const fn with_jitter(mut self, jitter_deg: f64) -> Self {
        self.jitter_deg = jitter_deg;
        self
    }

    /// Make every permission request fail, for exercising denial paths
    #[must_use]
    pub const fn with_permission_denied(mut self) -> Self {
        self.permission_granted = false;
        self
    }

    fn fix_at(&self, index: usize) -> Option<Position> {
        let (lat, lng) = *self.waypoints.get(index.min(self.waypoints.len().checked_sub(1)?))?;
        let (jlat, jlng) = if self.jitter_deg > 0.0 {
            let mut rng = rand::thread_rng();
            (
                rng.gen_range(-self.jitter_deg..=self.jitter_deg),
                rng.gen_range(-self.jitter_deg..=self.jitter_deg),
            )
        } else {
            (0.0, 0.0)
        };
        let mut position = Position::new(lat + jlat, lng + jlng, Utc::now());
        position.accuracy = Some(5.0);
        Some(position)
    }

    fn next_fix(&self) -> TrackingResult<Position> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.fix_at(index).ok_or_else(|| TrackingError::PositionUnavailable {
            reason: "simulated route has no waypoints".to_owned(),
        })
    }
}

#[async_trait]
impl PositionSource for SimulatedPositionSource {
    async fn request_permission(&self) -> TrackingResult<Position> {
        if !self.permission_granted {
            return Err(TrackingError::PermissionDenied);
        }
        // Permission grant yields the current fix without consuming a waypoint
        self.fix_at(self.cursor.load(Ordering::SeqCst))
            .ok_or_else(|| TrackingError::PositionUnavailable {
                reason: "simulated route has no waypoints".to_owned(),
            })
    }

    async fn current_position(&self, timeout: Duration) -> TrackingResult<Position> {
        super::with_timeout(timeout, async { self.next_fix() }).await
    }

    fn start_tracking(&self, interval: Duration) -> PositionSubscription {
        let (feed, subscription) = PositionSubscription::channel();
        let waypoints = self.waypoints.clone();
        let cursor = Arc::clone(&self.cursor);
        let jitter_deg = self.jitter_deg;

        tokio::spawn(async move {
            let replay = Self {
                waypoints,
                cursor,
                jitter_deg,
                permission_granted: true,
            };
            loop {
                tokio::time::sleep(interval).await;
                if feed.is_stopped() {
                    break;
                }
                if !feed.deliver(replay.next_fix()).await {
                    break;
                }
            }
            debug!("simulated tracking loop exited");
        });

        subscription
    }
}
