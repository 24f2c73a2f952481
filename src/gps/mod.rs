// src/gps/mod.rs
//! Location fix data and providers

pub mod data;
pub mod gpsd;
pub mod provider;

pub use data::{LocationFix, RoutePoint};
pub use provider::{FixSubscription, GpsdProvider};
