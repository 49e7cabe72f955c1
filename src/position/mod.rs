// ABOUTME: Location provider abstraction with single-shot and continuous position delivery
// ABOUTME: PositionSource trait, mpsc-backed subscriptions with idempotent stop, timeout helper
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fieldtrack Contributors

/// Scripted position source for demos and tests
pub mod simulated;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::{TrackingError, TrackingResult};
use crate::models::Position;

/// Channel capacity for position subscriptions
///
/// Sampling runs at tens of seconds per fix; a small buffer absorbs bursts
/// from devices that deliver faster than the requested interval.
const SUBSCRIPTION_BUFFER: usize = 32;

/// Abstraction over a device's location provider
///
/// Errors are classified, never silently dropped: permission problems,
/// unavailability, and timeouts each surface as their own `TrackingError`
/// variant so callers can decide what is retryable.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Request location permission, yielding an initial fix on grant
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::PermissionDenied` when the user or platform
    /// refuses; this is never auto-retried.
    async fn request_permission(&self) -> TrackingResult<Position>;

    /// Fetch a single fix, failing rather than hanging past `timeout`
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::PositionUnavailable` when the device cannot
    /// produce a fix, or `TrackingError::Timeout` once `timeout` elapses.
    async fn current_position(&self, timeout: Duration) -> TrackingResult<Position>;

    /// Start continuous delivery at roughly `interval` per fix
    ///
    /// Devices may deliver faster than the requested interval and with
    /// irregular timing; consumers must tolerate both.
    fn start_tracking(&self, interval: Duration) -> PositionSubscription;
}

/// Producer half of a position subscription, held by source implementations
#[derive(Debug, Clone)]
pub struct PositionFeed {
    sender: mpsc::Sender<TrackingResult<Position>>,
    stopped: Arc<AtomicBool>,
}

impl PositionFeed {
    /// Whether the consumer has stopped or dropped the subscription
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst) || self.sender.is_closed()
    }

    /// Deliver one fix or classified error to the consumer
    ///
    /// Returns `false` once the subscription is stopped; producers should
    /// exit their delivery loop at that point.
    pub async fn deliver(&self, update: TrackingResult<Position>) -> bool {
        if self.is_stopped() {
            return false;
        }
        self.sender.send(update).await.is_ok()
    }
}

/// Consumer half of a continuous position stream
///
/// `stop` is idempotent: stopping twice, or stopping after the producer has
/// already exited, is a no-op. Dropping the subscription stops the producer
/// as well, so an aborted consumer task cannot leak a delivery loop.
#[derive(Debug)]
pub struct PositionSubscription {
    updates: mpsc::Receiver<TrackingResult<Position>>,
    stopped: Arc<AtomicBool>,
}

impl PositionSubscription {
    /// Create a connected feed/subscription pair
    #[must_use]
    pub fn channel() -> (PositionFeed, Self) {
        let (sender, updates) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let stopped = Arc::new(AtomicBool::new(false));
        (
            PositionFeed {
                sender,
                stopped: Arc::clone(&stopped),
            },
            Self { updates, stopped },
        )
    }

    /// Receive the next fix or classified error
    ///
    /// Returns `None` once the subscription is stopped and drained.
    pub async fn next(&mut self) -> Option<TrackingResult<Position>> {
        if self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        self.updates.recv().await
    }

    /// Stop delivery; safe to call any number of times
    pub fn stop(&mut self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.updates.close();
            debug!("position subscription stopped");
        }
    }

    /// Whether `stop` has been called
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for PositionSubscription {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Bound a position future by a caller-supplied timeout
///
/// # Errors
///
/// Returns `TrackingError::Timeout` carrying the waited duration when the
/// future does not resolve in time; otherwise forwards the future's result.
pub async fn with_timeout<F>(timeout: Duration, fut: F) -> TrackingResult<Position>
where
    F: Future<Output = TrackingResult<Position>> + Send,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(TrackingError::Timeout {
            waited_ms: timeout.as_millis() as u64,
        }),
    }
}
