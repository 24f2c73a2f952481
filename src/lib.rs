// src/lib.rs
//! Activity Tracker Library
//!
//! Real-time activity tracking core: filters a noisy stream of GPS fixes
//! into distance/elevation/speed aggregates and drives the lifecycle of a
//! tracked workout session.

pub mod aggregate;
pub mod config;
pub mod display;
pub mod error;
pub mod filter;
pub mod gps;
pub mod persist;
pub mod session;
pub mod timer;
pub mod tracker;

// Re-export main types for convenience
pub use aggregate::{RecordMeta, SessionAggregate, SessionRecord};
pub use error::{Result, TrackerError};
pub use gps::{FixSubscription, GpsdProvider, LocationFix, RoutePoint};
pub use persist::{JsonFileSink, SaveOutcome, SessionSink};
pub use session::{SessionContext, SessionState, TrackingSnapshot};
pub use tracker::{SessionCommand, SessionTracker};
