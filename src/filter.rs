// src/filter.rs
//! Location fix filtering and distance/elevation accumulation
//!
//! Validates and stabilizes raw fixes before they touch any session
//! aggregate. Noise is absorbed silently: a filtered fix never raises an
//! error, it just contributes nothing.

use crate::gps::data::{LocationFix, RoutePoint};
use crate::session::SessionContext;

/// Fixes with worse horizontal accuracy than this are discarded outright.
pub const MIN_ACCURACY_M: f64 = 20.0;
/// Number of accuracy-accepted fixes consumed before distance counting starts.
pub const WARMUP_COUNT: u32 = 3;
/// Segments shorter than this do not add to the total distance.
pub const MIN_DISTANCE_M: f64 = 5.0;
/// Implied speeds above this are treated as GPS jumps.
pub const MAX_PLAUSIBLE_SPEED_KMH: f64 = 50.0;
/// Reported speeds below this display as standing still.
pub const MIN_DISPLAY_SPEED_KMH: f64 = 0.5;

const EARTH_RADIUS_KM: f64 = 6371.0;
/// Altitude deltas within this band are noise and accumulate nothing.
const ELEVATION_NOISE_M: f64 = 1.0;

/// What a single fix ended up contributing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixOutcome {
    /// Failed the accuracy gate; nothing changed.
    Rejected,
    /// Accuracy-accepted warmup fix; display position updated only.
    Warmup,
    /// The fix that completed warmup and seeded the accumulator.
    Stabilized,
    /// Post-stabilization fix. `distance_km` is the counted contribution,
    /// 0.0 when the movement or plausibility filter dropped the segment.
    Tracked { distance_km: f64 },
}

/// Run one raw fix through the full pipeline, mutating the session context.
///
/// Callers must feed fixes strictly in arrival order; the plausibility
/// filter trusts only the relative time between consecutive accepted fixes.
pub fn apply_fix(ctx: &mut SessionContext, fix: &LocationFix) -> FixOutcome {
    // Accuracy gate: no counters advance for a low-quality fix.
    if fix.accuracy_m > MIN_ACCURACY_M {
        tracing::trace!("fix rejected: accuracy {:.1} m", fix.accuracy_m);
        return FixOutcome::Rejected;
    }

    ctx.last_position = Some((fix.latitude, fix.longitude));
    ctx.accepted_fix_count += 1;

    if !ctx.stabilized {
        if ctx.accepted_fix_count < WARMUP_COUNT {
            return FixOutcome::Warmup;
        }
        // Warmup complete: this fix seeds the accumulator and the route.
        ctx.stabilized = true;
        ctx.last_altitude = fix.altitude;
        ctx.route_points.push(RoutePoint::from_fix(fix));
        ctx.last_accepted_fix = Some(fix.clone());
        return FixOutcome::Stabilized;
    }

    let mut counted_km = 0.0;
    if let Some(prev) = ctx.last_accepted_fix.as_ref() {
        let distance_km = haversine_km(prev.latitude, prev.longitude, fix.latitude, fix.longitude);
        let distance_m = distance_km * 1000.0;

        if distance_m >= MIN_DISTANCE_M {
            let hours =
                (fix.timestamp - prev.timestamp).num_milliseconds() as f64 / 3_600_000.0;
            let implied_kmh = if hours > 0.0 {
                distance_km / hours
            } else {
                f64::INFINITY
            };

            if implied_kmh <= MAX_PLAUSIBLE_SPEED_KMH {
                ctx.total_distance_km += distance_km;
                counted_km = distance_km;
            } else {
                tracing::trace!(
                    "segment dropped: implied speed {:.1} km/h over {:.1} m",
                    implied_kmh,
                    distance_m
                );
            }
        }
    }

    // Elevation deltas accumulate outside the noise band; the reference
    // altitude always advances so sub-threshold drift cannot pile up.
    if let Some(alt) = fix.altitude {
        if let Some(last) = ctx.last_altitude {
            let delta = alt - last;
            if delta > ELEVATION_NOISE_M {
                ctx.elevation_gain_m += delta;
            } else if delta < -ELEVATION_NOISE_M {
                ctx.elevation_loss_m += -delta;
            }
        }
        ctx.last_altitude = Some(alt);
    }

    // Route fidelity is independent of distance filtering: every
    // accuracy-accepted fix past stabilization becomes a route point, and
    // the reference fix advances even when the segment was dropped.
    ctx.route_points.push(RoutePoint::from_fix(fix));
    ctx.last_accepted_fix = Some(fix.clone());

    FixOutcome::Tracked {
        distance_km: counted_km,
    }
}

/// Instantaneous speed for display, in km/h. Speeds under the display
/// threshold (and missing or negative readings) show as 0.
pub fn display_speed_kmh(fix: &LocationFix) -> f64 {
    match fix.speed_mps {
        Some(mps) if mps >= 0.0 => {
            let kmh = mps * 3.6;
            if kmh < MIN_DISPLAY_SPEED_KMH {
                0.0
            } else {
                kmh
            }
        }
        _ => 0.0,
    }
}

/// Great-circle distance between two points, in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn fix_at(lat: f64, lon: f64, accuracy: f64, secs: i64) -> LocationFix {
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        LocationFix::new(lat, lon, accuracy, base + Duration::seconds(secs))
    }

    /// Feed three good warmup fixes at the origin, leaving ctx stabilized.
    fn stabilized_ctx(altitude: Option<f64>) -> SessionContext {
        let mut ctx = SessionContext::fresh();
        for i in 0..3 {
            let mut fix = fix_at(0.0, 0.0, 5.0, i);
            fix.altitude = altitude;
            apply_fix(&mut ctx, &fix);
        }
        assert!(ctx.stabilized);
        ctx
    }

    #[test]
    fn test_accuracy_gate_discards_fix() {
        let mut ctx = SessionContext::fresh();
        let fix = fix_at(1.0, 1.0, 25.0, 0);

        assert_eq!(apply_fix(&mut ctx, &fix), FixOutcome::Rejected);
        assert_eq!(ctx.accepted_fix_count, 0);
        assert_eq!(ctx.total_distance_km, 0.0);
        assert!(ctx.last_accepted_fix.is_none());
        assert!(ctx.last_position.is_none());
    }

    #[test]
    fn test_warmup_fixes_feed_nothing() {
        let mut ctx = SessionContext::fresh();

        assert_eq!(apply_fix(&mut ctx, &fix_at(0.0, 0.0, 5.0, 0)), FixOutcome::Warmup);
        assert_eq!(apply_fix(&mut ctx, &fix_at(0.0, 0.001, 5.0, 1)), FixOutcome::Warmup);
        assert_eq!(ctx.total_distance_km, 0.0);
        assert!(ctx.route_points.is_empty());
        assert!(!ctx.stabilized);
        // Position display still follows warmup fixes.
        assert_eq!(ctx.last_position, Some((0.0, 0.001)));
    }

    #[test]
    fn test_third_fix_stabilizes_and_seeds() {
        let mut ctx = SessionContext::fresh();
        apply_fix(&mut ctx, &fix_at(0.0, 0.0, 5.0, 0));
        apply_fix(&mut ctx, &fix_at(0.0, 0.0, 5.0, 1));

        let mut third = fix_at(0.0, 0.0, 5.0, 2);
        third.altitude = Some(10.0);
        assert_eq!(apply_fix(&mut ctx, &third), FixOutcome::Stabilized);

        assert!(ctx.stabilized);
        assert_eq!(ctx.accepted_fix_count, 3);
        assert_eq!(ctx.last_altitude, Some(10.0));
        assert_eq!(ctx.route_points.len(), 1);
        assert!(ctx.last_accepted_fix.is_some());
        assert_eq!(ctx.total_distance_km, 0.0);
    }

    #[test]
    fn test_scenario_warmup_then_movement() {
        // Three warmup fixes at the origin, then a real movement of about
        // 111 m east with a 2 m climb, slow enough to be plausible.
        let mut ctx = stabilized_ctx(Some(10.0));

        let mut moved = fix_at(0.0, 0.0010, 5.0, 12);
        moved.altitude = Some(12.0);
        let outcome = apply_fix(&mut ctx, &moved);

        let expected_km = haversine_km(0.0, 0.0, 0.0, 0.0010);
        assert!(expected_km > 0.100 && expected_km < 0.120);
        assert_eq!(outcome, FixOutcome::Tracked { distance_km: expected_km });
        assert!((ctx.total_distance_km - expected_km).abs() < 1e-9);
        assert!((ctx.elevation_gain_m - 2.0).abs() < 1e-9);
        assert_eq!(ctx.elevation_loss_m, 0.0);
        assert_eq!(ctx.route_points.len(), 2);
    }

    #[test]
    fn test_minimum_movement_filtered() {
        let mut ctx = stabilized_ctx(None);

        // ~3.3 m east of the origin: below the 5 m movement threshold.
        let near = fix_at(0.0, 0.00003, 5.0, 10);
        let outcome = apply_fix(&mut ctx, &near);

        assert_eq!(outcome, FixOutcome::Tracked { distance_km: 0.0 });
        assert_eq!(ctx.total_distance_km, 0.0);
        // Route and reference fix still advance.
        assert_eq!(ctx.route_points.len(), 2);
        assert_eq!(ctx.last_accepted_fix.as_ref().unwrap().longitude, 0.00003);
    }

    #[test]
    fn test_implausible_speed_dropped() {
        let mut ctx = stabilized_ctx(None);

        // ~111 m in one second: 400 km/h, far beyond plausibility.
        let jump = fix_at(0.0, 0.0010, 5.0, 3);
        let outcome = apply_fix(&mut ctx, &jump);

        assert_eq!(outcome, FixOutcome::Tracked { distance_km: 0.0 });
        assert_eq!(ctx.total_distance_km, 0.0);
    }

    #[test]
    fn test_rejected_jump_still_advances_reference() {
        // Preserved quirk: a distance-rejected jump still becomes the
        // reference fix for the next segment.
        let mut ctx = stabilized_ctx(None);

        let jump = fix_at(0.0, 0.0010, 5.0, 3);
        apply_fix(&mut ctx, &jump);
        assert_eq!(ctx.last_accepted_fix.as_ref().unwrap().longitude, 0.0010);

        // The next fix is measured from the jump, not from the origin.
        let follow = fix_at(0.0, 0.0010, 5.0, 13);
        apply_fix(&mut ctx, &follow);
        assert_eq!(ctx.total_distance_km, 0.0);
    }

    #[test]
    fn test_zero_time_delta_counts_as_jump() {
        let mut ctx = stabilized_ctx(None);

        // Same timestamp as the stabilizing fix: implied speed is infinite.
        let dup = fix_at(0.0, 0.0010, 5.0, 2);
        let outcome = apply_fix(&mut ctx, &dup);
        assert_eq!(outcome, FixOutcome::Tracked { distance_km: 0.0 });
        assert_eq!(ctx.total_distance_km, 0.0);
    }

    #[test]
    fn test_elevation_noise_band() {
        let mut ctx = stabilized_ctx(Some(100.0));

        // +0.8 m: inside the noise band, but the reference still advances.
        let mut small = fix_at(0.0, 0.0001, 5.0, 10);
        small.altitude = Some(100.8);
        apply_fix(&mut ctx, &small);
        assert_eq!(ctx.elevation_gain_m, 0.0);
        assert_eq!(ctx.last_altitude, Some(100.8));

        // +0.9 m from the new reference: still sub-threshold, so repeated
        // slow drift never accumulates.
        let mut drift = fix_at(0.0, 0.0002, 5.0, 20);
        drift.altitude = Some(101.7);
        apply_fix(&mut ctx, &drift);
        assert_eq!(ctx.elevation_gain_m, 0.0);

        // -3 m: a real descent.
        let mut down = fix_at(0.0, 0.0003, 5.0, 30);
        down.altitude = Some(98.7);
        apply_fix(&mut ctx, &down);
        assert_eq!(ctx.elevation_gain_m, 0.0);
        assert!((ctx.elevation_loss_m - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_warmup_altitude_not_counted() {
        // Altitude motion during warmup is invisible: the reference is
        // seeded only by the stabilizing fix.
        let mut ctx = SessionContext::fresh();
        for (i, alt) in [50.0, 80.0, 120.0].iter().enumerate() {
            let mut fix = fix_at(0.0, 0.0, 5.0, i as i64);
            fix.altitude = Some(*alt);
            apply_fix(&mut ctx, &fix);
        }
        assert_eq!(ctx.elevation_gain_m, 0.0);
        assert_eq!(ctx.last_altitude, Some(120.0));
    }

    #[test]
    fn test_distance_is_monotonic() {
        let mut ctx = stabilized_ctx(None);
        let mut previous = 0.0;
        for i in 1..30 {
            // A mix of plausible steps, micro-steps and wild jumps.
            let lon = match i % 3 {
                0 => i as f64 * 0.0001,
                1 => i as f64 * 0.0001 + 0.000001,
                _ => i as f64 * 0.01,
            };
            apply_fix(&mut ctx, &fix_at(0.0, lon, 5.0, i * 10));
            assert!(ctx.total_distance_km >= previous);
            previous = ctx.total_distance_km;
        }
        assert!(ctx.elevation_gain_m >= 0.0);
        assert!(ctx.elevation_loss_m >= 0.0);
    }

    #[test]
    fn test_display_speed() {
        let mut fix = fix_at(0.0, 0.0, 5.0, 0);
        assert_eq!(display_speed_kmh(&fix), 0.0);

        fix.speed_mps = Some(2.0); // 7.2 km/h
        assert!((display_speed_kmh(&fix) - 7.2).abs() < 1e-9);

        fix.speed_mps = Some(0.1); // 0.36 km/h: below display threshold
        assert_eq!(display_speed_kmh(&fix), 0.0);

        fix.speed_mps = Some(-1.0);
        assert_eq!(display_speed_kmh(&fix), 0.0);
    }

    #[test]
    fn test_haversine_known_distance() {
        // One degree of longitude at the equator is about 111.19 km.
        let d = haversine_km(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111.19).abs() < 0.05);

        assert_eq!(haversine_km(45.0, 7.0, 45.0, 7.0), 0.0);
    }
}
