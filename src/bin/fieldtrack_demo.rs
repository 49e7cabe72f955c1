// ABOUTME: Demo binary walking a simulated out-and-back delivery route
// ABOUTME: Shows lifecycle transitions, auto-save flushes, and the geofence return event
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fieldtrack Contributors

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::Notify;
use tracing::info;

use fieldtrack::config::TrackingConfig;
use fieldtrack::errors::TrackingError;
use fieldtrack::models::{Position, SessionStatus};
use fieldtrack::notifications::NotificationSink;
use fieldtrack::position::simulated::SimulatedPositionSource;
use fieldtrack::session::RouteSession;
use fieldtrack::store::memory::{InMemoryRouteStore, InMemorySideChannel};

/// Simulated route session demo
#[derive(Parser, Debug)]
#[command(name = "fieldtrack-demo", about = "Walk a simulated out-and-back route")]
struct Args {
    /// Worker id to open the session for
    #[arg(long, default_value = "demo-worker")]
    employee_id: String,

    /// Milliseconds between simulated fixes
    #[arg(long, default_value_t = 200)]
    interval_ms: u64,

    /// Geofence radius in kilometers
    #[arg(long, default_value_t = 0.1)]
    radius_km: f64,
}

/// Sink logging every notification and signalling the geofence return
struct DemoSink {
    returned: Arc<Notify>,
}

impl NotificationSink for DemoSink {
    fn on_location_update(&self, position: &Position) {
        info!(lat = position.latitude, lng = position.longitude, "fix accepted");
    }

    fn on_status_change(&self, status: SessionStatus) {
        info!(%status, "session status changed");
    }

    fn on_geofence_return(&self, _anchor: &Position, current: &Position) {
        info!(
            lat = current.latitude,
            lng = current.longitude,
            "returned to start point"
        );
        self.returned.notify_one();
    }

    fn on_error(&self, error: &TrackingError) {
        info!(%error, retryable = error.is_retryable(), "tracking error");
    }
}

/// Depot at (40.0, -74.0); 0.004 deg of latitude is ~445 m, comfortably past
/// the 150 m arming ring for the default 100 m radius.
fn out_and_back_route() -> Vec<(f64, f64)> {
    let depot = (40.0, -74.0);
    let mut route = vec![depot];
    for step in 1..=4 {
        route.push((depot.0 + 0.001 * f64::from(step), depot.1));
    }
    for step in (0..=3).rev() {
        route.push((depot.0 + 0.001 * f64::from(step), depot.1));
    }
    route
}

#[tokio::main]
async fn main() -> Result<()> {
    fieldtrack::logging::init()?;
    let args = Args::parse();

    let returned = Arc::new(Notify::new());
    let config = TrackingConfig {
        tracking_interval: Duration::from_millis(args.interval_ms),
        auto_save_interval: Duration::from_millis(args.interval_ms * 3),
        geofence_radius_km: args.radius_km,
        position_timeout: Duration::from_secs(2),
    };

    let session = RouteSession::new(
        config,
        Arc::new(SimulatedPositionSource::new(out_and_back_route()).with_jitter(0.00002)),
        Arc::new(InMemoryRouteStore::new()),
        Arc::new(InMemorySideChannel::new()),
        Arc::new(DemoSink {
            returned: Arc::clone(&returned),
        }),
    );

    session.start(&args.employee_id).await?;

    // Route length is bounded, so the return fires within a dozen intervals
    let deadline = Duration::from_millis(args.interval_ms * 30);
    if tokio::time::timeout(deadline, returned.notified()).await.is_err() {
        info!("no geofence return within deadline; stopping anyway");
    }

    session.stop().await?;

    let summary = session.session_summary()?;
    info!(
        session_id = %summary.id,
        distance_km = summary.distance_km,
        duration_sec = summary.duration_sec,
        average_speed_kmh = summary.average_speed_kmh,
        coordinates = summary.coordinate_count,
        "route complete"
    );

    session.cleanup().await;
    Ok(())
}
