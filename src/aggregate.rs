// src/aggregate.rs
//! Final session aggregate, built once when a session is confirmed

use crate::gps::data::RoutePoint;
use crate::session::SessionContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable summary of a finished session, read from the frozen context.
#[derive(Debug, Clone, Serialize)]
pub struct SessionAggregate {
    pub elapsed_seconds: u64,
    pub total_distance_km: f64,
    pub average_speed_kmh: f64,
    pub elevation_gain_m: i64,
    pub elevation_loss_m: i64,
    /// Present only when the route holds more than one point.
    pub route_points: Option<Vec<RoutePoint>>,
}

impl SessionAggregate {
    /// Build the aggregate from a frozen session context.
    pub fn from_context(ctx: &SessionContext) -> Self {
        let elapsed = ctx.elapsed_seconds();
        let average_speed_kmh = if elapsed > 0 {
            ctx.total_distance_km / (elapsed as f64 / 3600.0)
        } else {
            0.0
        };

        let route_points = if ctx.route_points.len() > 1 {
            Some(ctx.route_points.clone())
        } else {
            None
        };

        Self {
            elapsed_seconds: elapsed,
            total_distance_km: ctx.total_distance_km,
            average_speed_kmh,
            elevation_gain_m: ctx.elevation_gain_m.round() as i64,
            elevation_loss_m: ctx.elevation_loss_m.round() as i64,
            route_points,
        }
    }
}

/// The finalized request handed to the persistence service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub user_id: String,
    pub activity_type: String,
    pub activity_name: String,
    pub date: DateTime<Utc>,
    pub duration_minutes: u64,
    pub distance_km: f64,
    pub has_gps: bool,
    pub average_speed_kmh: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_points: Option<Vec<RoutePoint>>,
    pub elevation_gain_m: i64,
    pub elevation_loss_m: i64,
}

/// Identity and labelling carried over from configuration into the record.
#[derive(Debug, Clone)]
pub struct RecordMeta {
    pub user_id: String,
    pub activity_type: String,
    pub activity_name: String,
}

impl SessionRecord {
    pub fn build(aggregate: SessionAggregate, meta: &RecordMeta, date: DateTime<Utc>) -> Self {
        Self {
            user_id: meta.user_id.clone(),
            activity_type: meta.activity_type.clone(),
            activity_name: meta.activity_name.clone(),
            date,
            duration_minutes: aggregate.elapsed_seconds.div_ceil(60),
            distance_km: aggregate.total_distance_km,
            has_gps: true,
            average_speed_kmh: aggregate.average_speed_kmh,
            route_points: aggregate.route_points,
            elevation_gain_m: aggregate.elevation_gain_m,
            elevation_loss_m: aggregate.elevation_loss_m,
        }
    }
}
