// ABOUTME: Main library entry point for the Fieldtrack route session manager
// ABOUTME: Session lifecycle, geofence return detection, offline-tolerant coordinate persistence
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fieldtrack Contributors

#![deny(unsafe_code)]

//! # Fieldtrack
//!
//! Route session manager for field-worker delivery tracking: a lifecycle
//! state machine over periodic GPS sampling, with autonomous return-to-start
//! detection and coordinate persistence that tolerates intermittent
//! connectivity.
//!
//! ## Architecture
//!
//! - **`position`**: location provider abstraction with continuous and
//!   single-shot delivery
//! - **`geofence`**: two-threshold hysteresis detector for return-to-start
//!   events
//! - **`buffer`**: persistence buffer decoupling capture rate from network
//!   availability, with a durable local fallback
//! - **`session`**: the `RouteSession` state machine tying it all together
//! - **`recovery`**: connectivity-restoration sweep draining offline tails
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fieldtrack::config::TrackingConfig;
//! use fieldtrack::notifications::NullSink;
//! use fieldtrack::position::simulated::SimulatedPositionSource;
//! use fieldtrack::session::RouteSession;
//! use fieldtrack::store::memory::{InMemoryRouteStore, InMemorySideChannel};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let session = RouteSession::new(
//!         TrackingConfig::default(),
//!         Arc::new(SimulatedPositionSource::new(vec![(40.0, -74.0)])),
//!         Arc::new(InMemoryRouteStore::new()),
//!         Arc::new(InMemorySideChannel::new()),
//!         Arc::new(NullSink),
//!     );
//!     session.start("employee-42").await?;
//!     session.stop().await?;
//!     Ok(())
//! }
//! ```

/// Offline-tolerant coordinate persistence buffer
pub mod buffer;

/// Tracking configuration with environment overrides
pub mod config;

/// Error taxonomy for the session core and persistence collaborators
pub mod errors;

/// Great-circle geometry shared by geofencing and metrics
pub mod geo;

/// Return-to-start detection with two-threshold hysteresis
pub mod geofence;

/// Structured logging setup
pub mod logging;

/// Derived session metrics computed on demand
pub mod metrics;

/// Core data models for sessions, fixes, and coordinate batches
pub mod models;

/// Owner-supplied notification sink for tracking events
pub mod notifications;

/// Location provider abstraction and subscriptions
pub mod position;

/// Connectivity-restoration sweep for offline-buffered coordinates
pub mod recovery;

/// Route session lifecycle state machine
pub mod session;

/// Remote route store and durable side-channel contracts
pub mod store;

pub use buffer::{FlushOutcome, PersistenceBuffer};
pub use errors::{StoreError, TrackingError, TrackingResult};
pub use geofence::{Arming, GeofenceEvent, GeofenceMonitor};
pub use models::{Position, SessionMetrics, SessionStatus};
pub use session::RouteSession;
