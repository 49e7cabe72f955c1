// ABOUTME: Great-circle geometry shared by the geofence monitor and metrics calculator
// ABOUTME: Haversine distance on a 6371 km spherical Earth, inputs in decimal degrees
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fieldtrack Contributors

use crate::models::Position;

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine great-circle distance between two fixes, in kilometers
///
/// Spherical-model error is below 0.1% against an ellipsoidal reference for
/// GPS-grade inputs, which is well inside device accuracy.
#[must_use]
pub fn haversine_distance_km(a: &Position, b: &Position) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Sum of pairwise Haversine distances over an ordered coordinate list, in km
///
/// Returns 0 for fewer than two points.
#[must_use]
pub fn path_distance_km(coordinates: &[Position]) -> f64 {
    coordinates
        .windows(2)
        .map(|pair| haversine_distance_km(&pair[0], &pair[1]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fix(lat: f64, lng: f64) -> Position {
        Position::new(lat, lng, Utc::now())
    }

    #[test]
    fn zero_distance_for_identical_points() {
        let p = fix(45.5017, -73.5673);
        assert!(haversine_distance_km(&p, &p) < 1e-9);
    }

    #[test]
    fn known_city_pair_within_tolerance() {
        // Montreal to Toronto, ~504 km great-circle
        let montreal = fix(45.5017, -73.5673);
        let toronto = fix(43.6532, -79.3832);
        let d = haversine_distance_km(&montreal, &toronto);
        assert!((d - 504.0).abs() < 3.0, "got {d}");
    }

    #[test]
    fn one_hundredth_degree_of_latitude() {
        // 0.01 deg of latitude is ~1.112 km everywhere on the sphere
        let a = fix(40.0, -74.0);
        let b = fix(40.01, -74.0);
        let d = haversine_distance_km(&a, &b);
        assert!((d - 1.112).abs() < 0.002, "got {d}");
    }

    #[test]
    fn path_distance_sums_pairwise_legs() {
        let coords = vec![fix(40.0, -74.0), fix(40.01, -74.0), fix(40.02, -74.0)];
        let total = path_distance_km(&coords);
        let legs = haversine_distance_km(&coords[0], &coords[1])
            + haversine_distance_km(&coords[1], &coords[2]);
        assert!((total - legs).abs() < 1e-12);
    }

    #[test]
    fn path_distance_is_zero_below_two_points() {
        assert_eq!(path_distance_km(&[]), 0.0);
        assert_eq!(path_distance_km(&[fix(1.0, 1.0)]), 0.0);
    }
}
