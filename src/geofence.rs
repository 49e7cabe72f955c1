// ABOUTME: Geofence return-to-start detector with two-threshold hysteresis
// ABOUTME: Arms beyond 1.5x radius, fires exactly once on re-entry, then disarms
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fieldtrack Contributors

use tracing::debug;

use crate::geo;
use crate::models::Position;

/// Default detection radius around the session start point, in km
pub const DEFAULT_RADIUS_KM: f64 = 0.1;

/// Multiplier applied to the radius for the arming threshold
///
/// The worker must leave a 1.5R ring before re-entry detection becomes
/// meaningful; GPS noise near the start point cannot arm the detector.
pub const ARM_RADIUS_FACTOR: f64 = 1.5;

/// Arming state of the hysteresis detector
///
/// Kept as an explicit tagged state rather than a boolean so transitions stay
/// auditable in logs and testable in isolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arming {
    /// Inside (or never left) the arming ring; re-entry is not meaningful yet
    Disarmed,
    /// The worker has genuinely departed; the next entry into R fires
    Armed,
}

/// A return-to-start detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeofenceEvent {
    /// The session start point the fence is anchored to
    pub anchor: Position,
    /// The fix that triggered the detection
    pub current: Position,
    /// Distance from anchor at trigger time, in km
    pub distance_km: f64,
}

/// Return-to-start detector for one session
///
/// Consumes the session's position stream and emits at most one event per
/// arm/fire cycle. After firing it disarms, so loitering at the boundary
/// cannot produce repeated alerts; the worker must leave the 1.5R ring again
/// before the next detection.
#[derive(Debug, Clone)]
pub struct GeofenceMonitor {
    anchor: Position,
    radius_km: f64,
    arming: Arming,
}

impl GeofenceMonitor {
    /// Create a monitor anchored at the session start with the default radius
    #[must_use]
    pub const fn new(anchor: Position) -> Self {
        Self::with_radius(anchor, DEFAULT_RADIUS_KM)
    }

    /// Create a monitor with a custom detection radius in km
    #[must_use]
    pub const fn with_radius(anchor: Position, radius_km: f64) -> Self {
        Self {
            anchor,
            radius_km,
            arming: Arming::Disarmed,
        }
    }

    /// The anchor point the fence is centered on
    #[must_use]
    pub const fn anchor(&self) -> &Position {
        &self.anchor
    }

    /// Current arming state
    #[must_use]
    pub const fn arming(&self) -> Arming {
        self.arming
    }

    /// Detection radius in km
    #[must_use]
    pub const fn radius_km(&self) -> f64 {
        self.radius_km
    }

    /// Recompute arming from a known position, without emitting events
    ///
    /// Used on `resume`: a session paused outside the arming ring comes back
    /// armed instead of silently losing a pending detection.
    pub fn rearm_from(&mut self, position: &Position) {
        let distance_km = geo::haversine_distance_km(&self.anchor, position);
        self.arming = if distance_km > self.radius_km * ARM_RADIUS_FACTOR {
            Arming::Armed
        } else {
            Arming::Disarmed
        };
        debug!(
            distance_km,
            arming = ?self.arming,
            "geofence rearmed from last known position"
        );
    }

    /// Feed one fix through the detector
    ///
    /// Returns a `GeofenceEvent` only on the `Armed` -> inside-R transition;
    /// every other observation just updates arming state.
    pub fn observe(&mut self, position: &Position) -> Option<GeofenceEvent> {
        let distance_km = geo::haversine_distance_km(&self.anchor, position);

        match self.arming {
            Arming::Disarmed => {
                if distance_km > self.radius_km * ARM_RADIUS_FACTOR {
                    self.arming = Arming::Armed;
                    debug!(distance_km, radius_km = self.radius_km, "geofence armed");
                }
                None
            }
            Arming::Armed => {
                if distance_km <= self.radius_km {
                    self.arming = Arming::Disarmed;
                    debug!(distance_km, radius_km = self.radius_km, "geofence return detected");
                    Some(GeofenceEvent {
                        anchor: self.anchor,
                        current: *position,
                        distance_km,
                    })
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    // ~1 degree of latitude is 111.19 km on the 6371 km sphere, so meters of
    // northward displacement convert cleanly for an equatorial anchor.
    fn north_of_origin(meters: f64) -> Position {
        Position::new(meters / 111_190.0, 0.0, Utc::now())
    }

    fn monitor() -> GeofenceMonitor {
        GeofenceMonitor::with_radius(north_of_origin(0.0), 0.1)
    }

    #[test]
    fn starts_disarmed() {
        assert_eq!(monitor().arming(), Arming::Disarmed);
    }

    #[test]
    fn out_and_back_fires_exactly_once() {
        let mut m = monitor();
        let mut events = 0;
        for meters in [0.0, 200.0, 50.0] {
            if m.observe(&north_of_origin(meters)).is_some() {
                events += 1;
            }
        }
        assert_eq!(events, 1);
        assert_eq!(m.arming(), Arming::Disarmed);
    }

    #[test]
    fn oscillation_below_arming_ring_never_fires() {
        let mut m = monitor();
        for meters in [0.0, 120.0, 90.0, 120.0, 90.0] {
            assert!(m.observe(&north_of_origin(meters)).is_none());
        }
        assert_eq!(m.arming(), Arming::Disarmed);
    }

    #[test]
    fn loitering_at_boundary_after_fire_stays_quiet() {
        let mut m = monitor();
        m.observe(&north_of_origin(200.0));
        assert!(m.observe(&north_of_origin(50.0)).is_some());
        // Bouncing around the radius without leaving 1.5R again
        for meters in [110.0, 90.0, 110.0, 90.0] {
            assert!(m.observe(&north_of_origin(meters)).is_none());
        }
    }

    #[test]
    fn second_full_cycle_fires_again() {
        let mut m = monitor();
        m.observe(&north_of_origin(200.0));
        assert!(m.observe(&north_of_origin(50.0)).is_some());
        m.observe(&north_of_origin(300.0));
        assert!(m.observe(&north_of_origin(80.0)).is_some());
    }

    #[test]
    fn exact_arming_threshold_does_not_arm() {
        // Arming requires strictly greater than 1.5R
        let mut m = monitor();
        m.observe(&north_of_origin(150.0));
        assert_eq!(m.arming(), Arming::Disarmed);
    }

    #[test]
    fn rearm_from_far_position_arms_without_event() {
        let mut m = monitor();
        m.rearm_from(&north_of_origin(400.0));
        assert_eq!(m.arming(), Arming::Armed);
        m.rearm_from(&north_of_origin(100.0));
        assert_eq!(m.arming(), Arming::Disarmed);
    }

    #[test]
    fn event_carries_anchor_and_trigger_fix() {
        let mut m = monitor();
        m.observe(&north_of_origin(200.0));
        let trigger = north_of_origin(50.0);
        let event = m.observe(&trigger).unwrap();
        assert_eq!(event.current, trigger);
        assert!(event.distance_km <= 0.1);
    }
}
