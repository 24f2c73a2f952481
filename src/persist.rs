// src/persist.rs
//! Persistence boundary: the session sink trait and the file-based sink

use crate::aggregate::SessionRecord;
use crate::error::{Result, TrackerError};
use async_trait::async_trait;
use std::path::PathBuf;

/// Result of a persistence attempt.
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub success: bool,
    pub session_id: Option<String>,
}

/// Destination for one finalized session record.
///
/// Exactly one save is in flight at a time; the state machine enforces
/// single-flight and never retries automatically.
#[async_trait]
pub trait SessionSink: Send + Sync {
    async fn save(&self, record: &SessionRecord) -> Result<SaveOutcome>;
}

/// Sink that archives each session as a pretty-printed JSON file, plus a
/// GPX track when the record carries a route.
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn session_id(record: &SessionRecord) -> String {
        format!(
            "{}-{}",
            record.activity_type,
            record.date.format("%Y%m%d-%H%M%S")
        )
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", session_id))
    }

    fn gpx_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.gpx", session_id))
    }
}

#[async_trait]
impl SessionSink for JsonFileSink {
    async fn save(&self, record: &SessionRecord) -> Result<SaveOutcome> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| TrackerError::Persistence(format!("Failed to create session directory: {}", e)))?;

        let session_id = Self::session_id(record);
        let json = serde_json::to_string_pretty(record)?;

        tokio::fs::write(self.session_path(&session_id), json)
            .await
            .map_err(|e| TrackerError::Persistence(format!("Failed to write session record: {}", e)))?;

        if record.route_points.is_some() {
            let gpx = record_to_gpx(record);
            tokio::fs::write(self.gpx_path(&session_id), gpx)
                .await
                .map_err(|e| TrackerError::Persistence(format!("Failed to write GPX track: {}", e)))?;
        }

        tracing::info!("session {} saved to {}", session_id, self.dir.display());
        Ok(SaveOutcome {
            success: true,
            session_id: Some(session_id),
        })
    }
}

/// Sink that rejects every save. Useful when running with persistence
/// pointed at an unwritable location, and in failure-path tests.
pub struct RejectingSink;

#[async_trait]
impl SessionSink for RejectingSink {
    async fn save(&self, _record: &SessionRecord) -> Result<SaveOutcome> {
        Err(TrackerError::Persistence("sink rejects all sessions".to_string()))
    }
}

/// Render the recorded route as a GPX 1.1 track.
fn record_to_gpx(record: &SessionRecord) -> String {
    let mut gpx = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="Activity Tracker" xmlns="http://www.topografix.com/GPX/1/1">
"#,
    );

    gpx.push_str("  <trk>\n");
    gpx.push_str(&format!(
        "    <name>{}</name>\n",
        escape_xml(&record.activity_name)
    ));
    gpx.push_str("    <trkseg>\n");

    for point in record.route_points.as_deref().unwrap_or(&[]) {
        gpx.push_str(&format!(
            "      <trkpt lat=\"{}\" lon=\"{}\">",
            point.latitude, point.longitude
        ));
        if let Some(ele) = point.altitude {
            gpx.push_str(&format!("<ele>{}</ele>", ele));
        }
        gpx.push_str("</trkpt>\n");
    }

    gpx.push_str("    </trkseg>\n  </trk>\n</gpx>\n");
    gpx
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{RecordMeta, SessionAggregate, SessionRecord};
    use crate::gps::data::RoutePoint;
    use crate::session::SessionContext;
    use chrono::Utc;

    fn sample_record(with_route: bool) -> SessionRecord {
        let mut ctx = SessionContext::fresh();
        ctx.total_distance_km = 2.5;
        for _ in 0..900 {
            ctx.timer.tick();
        }
        if with_route {
            ctx.route_points.push(RoutePoint {
                latitude: 0.0,
                longitude: 0.0,
                altitude: Some(10.0),
            });
            ctx.route_points.push(RoutePoint {
                latitude: 0.0,
                longitude: 0.001,
                altitude: None,
            });
        }
        let meta = RecordMeta {
            user_id: "user-1".to_string(),
            activity_type: "ride".to_string(),
            activity_name: "Evening Ride <loop>".to_string(),
        };
        SessionRecord::build(SessionAggregate::from_context(&ctx), &meta, Utc::now())
    }

    #[tokio::test]
    async fn test_save_writes_json_and_gpx() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path());

        let outcome = sink.save(&sample_record(true)).await.unwrap();
        assert!(outcome.success);
        let session_id = outcome.session_id.unwrap();

        let json_path = dir.path().join(format!("{}.json", session_id));
        let gpx_path = dir.path().join(format!("{}.gpx", session_id));
        assert!(json_path.exists());
        assert!(gpx_path.exists());

        let contents = std::fs::read_to_string(gpx_path).unwrap();
        assert!(contents.contains("<trkpt"));
        assert!(contents.contains("Evening Ride &lt;loop&gt;"));
    }

    #[tokio::test]
    async fn test_save_without_route_skips_gpx() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path());

        let outcome = sink.save(&sample_record(false)).await.unwrap();
        let session_id = outcome.session_id.unwrap();
        assert!(dir.path().join(format!("{}.json", session_id)).exists());
        assert!(!dir.path().join(format!("{}.gpx", session_id)).exists());
    }

    #[tokio::test]
    async fn test_rejecting_sink_fails() {
        let result = RejectingSink.save(&sample_record(false)).await;
        assert!(result.is_err());
    }
}
