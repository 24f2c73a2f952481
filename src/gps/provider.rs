// src/gps/provider.rs
//! Location subscription handle and the gpsd-backed provider

use super::data::LocationFix;
use super::gpsd;
use crate::error::Result;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

/// A live stream of location fixes with an idempotent teardown.
///
/// Dropping the subscription, or calling `unsubscribe()` any number of
/// times, stops the producing task; fixes already in flight are drained or
/// discarded by the consumer's cancellation check.
pub struct FixSubscription {
    rx: mpsc::Receiver<LocationFix>,
    active: Arc<AtomicBool>,
}

impl FixSubscription {
    /// Wrap an existing fix channel, e.g. for a non-gpsd source or a test.
    pub fn from_channel(rx: mpsc::Receiver<LocationFix>) -> Self {
        Self {
            rx,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Receive the next fix; `None` once the source is gone.
    pub async fn recv(&mut self) -> Option<LocationFix> {
        self.rx.recv().await
    }

    /// Stop the producing side. Safe to call repeatedly.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::Relaxed) {
            tracing::debug!("location subscription closed");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }
}

impl Drop for FixSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Location provider backed by a gpsd daemon.
#[derive(Debug, Clone)]
pub struct GpsdProvider {
    host: String,
    port: u16,
}

impl GpsdProvider {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Connect and start the reader task delivering fixes to the returned
    /// subscription. The task ends when the daemon closes the stream, the
    /// subscription is torn down, or the consumer goes away.
    pub async fn subscribe(&self) -> Result<FixSubscription> {
        let mut reader = gpsd::connect_gpsd(&self.host, self.port).await?;

        let (tx, rx) = mpsc::channel(32);
        let active = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&active);

        tokio::spawn(async move {
            let mut line = String::new();

            while flag.load(Ordering::Relaxed) {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => break, // EOF
                    Ok(_) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match gpsd::parse_fix_line(line) {
                            Ok(Some(fix)) => {
                                if tx.send(fix).await.is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                tracing::trace!("ignoring gpsd line: {}", e);
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!("gpsd read error: {}", e);
                        break;
                    }
                }
            }
            tracing::debug!("gpsd reader task finished");
        });

        Ok(FixSubscription { rx, active })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_subscription_delivers_fixes() {
        let (tx, rx) = mpsc::channel(4);
        let mut sub = FixSubscription::from_channel(rx);

        tx.send(LocationFix::new(1.0, 2.0, 5.0, Utc::now()))
            .await
            .unwrap();
        drop(tx);

        let fix = sub.recv().await.unwrap();
        assert_eq!(fix.latitude, 1.0);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let (_tx, rx) = mpsc::channel::<LocationFix>(1);
        let sub = FixSubscription::from_channel(rx);

        assert!(sub.is_active());
        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
    }
}
