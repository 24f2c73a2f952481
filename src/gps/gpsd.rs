// src/gps/gpsd.rs
//! GPSD client: the concrete location provider backing the fix stream

use super::data::LocationFix;
use crate::error::{Result, TrackerError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::TcpStream,
};

/// Accuracy assigned to fixes whose TPV message carries no error estimate.
/// Deliberately poor so the pipeline's accuracy gate drops them.
const UNKNOWN_ACCURACY_M: f64 = 100.0;

#[derive(Debug, Deserialize)]
struct GpsdMessage {
    class: String,
    #[serde(flatten)]
    data: HashMap<String, serde_json::Value>,
}

/// Connect to a gpsd daemon and enable the JSON watch stream.
pub async fn connect_gpsd(host: &str, port: u16) -> Result<BufReader<TcpStream>> {
    let mut stream = TcpStream::connect(format!("{}:{}", host, port))
        .await
        .map_err(|e| TrackerError::Connection(format!("Failed to connect to gpsd at {}:{}: {}", host, port, e)))?;

    // Send WATCH command to start receiving JSON data
    let watch_cmd = "?WATCH={\"enable\":true,\"json\":true}\n";
    stream
        .write_all(watch_cmd.as_bytes())
        .await
        .map_err(|e| TrackerError::Connection(format!("Failed to send WATCH command: {}", e)))?;

    tracing::debug!("gpsd watch enabled on {}:{}", host, port);
    Ok(BufReader::new(stream))
}

/// Parse one line of gpsd JSON into a location fix.
///
/// Returns `Ok(None)` for message classes other than TPV and for TPV
/// messages without a usable 2D position.
pub fn parse_fix_line(line: &str) -> Result<Option<LocationFix>> {
    let msg: GpsdMessage = serde_json::from_str(line)
        .map_err(|e| TrackerError::Parse(format!("Failed to parse gpsd JSON: {}", e)))?;

    if msg.class != "TPV" {
        return Ok(None);
    }

    parse_tpv_message(&msg.data)
}

fn parse_tpv_message(msg_data: &HashMap<String, serde_json::Value>) -> Result<Option<LocationFix>> {
    // Mode 2 or better means the receiver has a position solution.
    let mode = msg_data.get("mode").and_then(|v| v.as_u64()).unwrap_or(0);
    if mode < 2 {
        return Ok(None);
    }

    let (lat, lon) = match (
        msg_data.get("lat").and_then(|v| v.as_f64()),
        msg_data.get("lon").and_then(|v| v.as_f64()),
    ) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Ok(None),
    };

    // eph is gpsd's combined horizontal error estimate; fall back to the
    // larger of the per-axis estimates when it is absent.
    let accuracy_m = msg_data
        .get("eph")
        .and_then(|v| v.as_f64())
        .or_else(|| {
            let epx = msg_data.get("epx").and_then(|v| v.as_f64());
            let epy = msg_data.get("epy").and_then(|v| v.as_f64());
            match (epx, epy) {
                (Some(x), Some(y)) => Some(x.max(y)),
                (Some(x), None) => Some(x),
                (None, Some(y)) => Some(y),
                (None, None) => None,
            }
        })
        .unwrap_or(UNKNOWN_ACCURACY_M);

    let timestamp = msg_data
        .get("time")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<DateTime<Utc>>().ok())
        .unwrap_or_else(Utc::now);

    let mut fix = LocationFix::new(lat, lon, accuracy_m, timestamp);
    fix.altitude = msg_data
        .get("altHAE")
        .and_then(|v| v.as_f64())
        .or_else(|| msg_data.get("alt").and_then(|v| v.as_f64()));
    fix.speed_mps = msg_data.get("speed").and_then(|v| v.as_f64());

    Ok(Some(fix))
}
