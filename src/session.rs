// src/session.rs
//! Session state and the single owned context for one tracking attempt

use crate::gps::data::{LocationFix, RoutePoint};
use crate::timer::SessionTimer;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle state of a tracked session. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Tracking,
    Paused,
    Confirming,
    Saving,
    Success,
    Error,
    Discarded,
}

impl SessionState {
    /// Terminal states release the location subscription and the timer.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Success | SessionState::Error | SessionState::Discarded
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Tracking => "Tracking",
            SessionState::Paused => "Paused",
            SessionState::Confirming => "Confirming",
            SessionState::Saving => "Saving",
            SessionState::Success => "Success",
            SessionState::Error => "Error",
            SessionState::Discarded => "Discarded",
        };
        write!(f, "{}", name)
    }
}

/// The single mutable state container for one tracking attempt.
///
/// Owned exclusively by the session state machine; fully replaced (never
/// patched in place) whenever tracking restarts.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub total_distance_km: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub last_accepted_fix: Option<LocationFix>,
    pub last_altitude: Option<f64>,
    /// Displayed position; updated by every accuracy-accepted fix,
    /// including warmup fixes that feed nothing else.
    pub last_position: Option<(f64, f64)>,
    pub last_display_speed_kmh: f64,
    pub accepted_fix_count: u32,
    pub stabilized: bool,
    pub route_points: Vec<RoutePoint>,
    pub timer: SessionTimer,
    /// Whether the session was paused when the finish dialog opened;
    /// cancelling the finish returns to that state.
    pub paused_before_confirm: bool,
}

impl SessionContext {
    /// A zeroed context in the initial Tracking state.
    pub fn fresh() -> Self {
        Self {
            state: SessionState::Tracking,
            started_at: Utc::now(),
            total_distance_km: 0.0,
            elevation_gain_m: 0.0,
            elevation_loss_m: 0.0,
            last_accepted_fix: None,
            last_altitude: None,
            last_position: None,
            last_display_speed_kmh: 0.0,
            accepted_fix_count: 0,
            stabilized: false,
            route_points: Vec::new(),
            timer: SessionTimer::new(),
            paused_before_confirm: false,
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.timer.elapsed_secs()
    }

    /// Read-only view for the presentation layer.
    pub fn snapshot(&self) -> TrackingSnapshot {
        TrackingSnapshot {
            state: self.state,
            elapsed_seconds: self.elapsed_seconds(),
            total_distance_km: self.total_distance_km,
            speed_kmh: self.last_display_speed_kmh,
            elevation_gain_m: self.elevation_gain_m,
            elevation_loss_m: self.elevation_loss_m,
            position: self.last_position,
            route_len: self.route_points.len(),
            stabilized: self.stabilized,
        }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::fresh()
    }
}

/// Immutable copy of the live values the display is allowed to see.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingSnapshot {
    pub state: SessionState,
    pub elapsed_seconds: u64,
    pub total_distance_km: f64,
    pub speed_kmh: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub position: Option<(f64, f64)>,
    pub route_len: usize,
    pub stabilized: bool,
}

impl TrackingSnapshot {
    pub fn format_elapsed(&self) -> String {
        let h = self.elapsed_seconds / 3600;
        let m = (self.elapsed_seconds % 3600) / 60;
        let s = self.elapsed_seconds % 60;
        format!("{:02}:{:02}:{:02}", h, m, s)
    }
}
