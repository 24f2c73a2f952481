// src/gps/data.rs
//! Location fix and route point data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One reported location reading from the provider.
///
/// Ephemeral: consumed by the filter pipeline immediately and never retained
/// beyond it, except as the pipeline's last accepted reference fix.
#[derive(Debug, Clone)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    /// Horizontal accuracy in meters (lower is better).
    pub accuracy_m: f64,
    /// Instantaneous speed in m/s as reported by the provider.
    pub speed_mps: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64, accuracy_m: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            accuracy_m,
            speed_mps: None,
            timestamp,
        }
    }
}

/// One point of the recorded route. Append-only for the session's duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl RoutePoint {
    pub fn from_fix(fix: &LocationFix) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            altitude: fix.altitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_point_from_fix() {
        let mut fix = LocationFix::new(42.438878, -71.119277, 5.0, Utc::now());
        fix.altitude = Some(100.0);

        let point = RoutePoint::from_fix(&fix);
        assert_eq!(point.latitude, 42.438878);
        assert_eq!(point.longitude, -71.119277);
        assert_eq!(point.altitude, Some(100.0));
    }
}
