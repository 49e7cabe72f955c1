// ABOUTME: Tracking configuration with environment variable overrides
// ABOUTME: Sampling/auto-save intervals, geofence radius, and position timeout
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fieldtrack Contributors

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::geofence::DEFAULT_RADIUS_KM;

/// Default position sampling interval
pub const DEFAULT_TRACKING_INTERVAL: Duration = Duration::from_secs(30);
/// Default buffer auto-save interval
pub const DEFAULT_AUTO_SAVE_INTERVAL: Duration = Duration::from_secs(60);
/// Default single-shot position timeout
pub const DEFAULT_POSITION_TIMEOUT: Duration = Duration::from_secs(10);

/// Tunable parameters for one route session
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// How often continuous tracking samples a fix
    pub tracking_interval: Duration,
    /// How often the persistence buffer flushes while Active
    pub auto_save_interval: Duration,
    /// Geofence detection radius around the start point, in km
    pub geofence_radius_km: f64,
    /// Timeout for single-shot position requests (start and stop fixes)
    pub position_timeout: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tracking_interval: DEFAULT_TRACKING_INTERVAL,
            auto_save_interval: DEFAULT_AUTO_SAVE_INTERVAL,
            geofence_radius_km: DEFAULT_RADIUS_KM,
            position_timeout: DEFAULT_POSITION_TIMEOUT,
        }
    }
}

impl TrackingConfig {
    /// Build a configuration from environment variables
    ///
    /// Reads `FIELDTRACK_TRACKING_INTERVAL_MS`, `FIELDTRACK_AUTO_SAVE_INTERVAL_MS`,
    /// `FIELDTRACK_GEOFENCE_RADIUS_KM`, and `FIELDTRACK_POSITION_TIMEOUT_MS`.
    /// Unset or unparseable values fall back to defaults with a warning
    /// rather than failing startup.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tracking_interval: env_duration_ms(
                "FIELDTRACK_TRACKING_INTERVAL_MS",
                defaults.tracking_interval,
            ),
            auto_save_interval: env_duration_ms(
                "FIELDTRACK_AUTO_SAVE_INTERVAL_MS",
                defaults.auto_save_interval,
            ),
            geofence_radius_km: env_f64("FIELDTRACK_GEOFENCE_RADIUS_KM", defaults.geofence_radius_km),
            position_timeout: env_duration_ms(
                "FIELDTRACK_POSITION_TIMEOUT_MS",
                defaults.position_timeout,
            ),
        }
    }
}

fn env_duration_ms(key: &str, default: Duration) -> Duration {
    match env::var(key) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(ms) if ms > 0 => Duration::from_millis(ms),
            _ => {
                warn!(key, value = %raw, "invalid duration override; using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    match env::var(key) {
        Ok(raw) => match raw.parse::<f64>() {
            Ok(v) if v > 0.0 => v,
            _ => {
                warn!(key, value = %raw, "invalid numeric override; using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = TrackingConfig::default();
        assert_eq!(config.tracking_interval, Duration::from_secs(30));
        assert_eq!(config.auto_save_interval, Duration::from_secs(60));
        assert_eq!(config.geofence_radius_km, 0.1);
        assert_eq!(config.position_timeout, Duration::from_secs(10));
    }

    #[test]
    fn invalid_override_falls_back() {
        // Scoped to a key no other test touches
        env::set_var("FIELDTRACK_TRACKING_INTERVAL_MS", "not-a-number");
        let config = TrackingConfig::from_env();
        assert_eq!(config.tracking_interval, DEFAULT_TRACKING_INTERVAL);
        env::remove_var("FIELDTRACK_TRACKING_INTERVAL_MS");
    }

    #[test]
    fn valid_override_is_applied() {
        env::set_var("FIELDTRACK_AUTO_SAVE_INTERVAL_MS", "15000");
        let config = TrackingConfig::from_env();
        assert_eq!(config.auto_save_interval, Duration::from_millis(15_000));
        env::remove_var("FIELDTRACK_AUTO_SAVE_INTERVAL_MS");
    }
}
