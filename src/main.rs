// src/main.rs
//! Activity Tracker - GPS workout tracking with a live terminal display

use activity_tracker::{
    aggregate::RecordMeta,
    config::TrackerConfig,
    display::TerminalDisplay,
    persist::JsonFileSink,
    tracker::SessionTracker,
    GpsdProvider, SessionState,
};
use anyhow::Context;
use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "activity-tracker", about = "Track a GPS workout session")]
struct Args {
    /// gpsd host to subscribe to
    #[arg(long)]
    gpsd_host: Option<String>,

    /// gpsd port
    #[arg(long)]
    gpsd_port: Option<u16>,

    /// User the session is recorded for
    #[arg(long)]
    user: Option<String>,

    /// Activity type (run, ride, hike, ...)
    #[arg(long)]
    activity_type: Option<String>,

    /// Display name of the activity
    #[arg(long)]
    activity_name: Option<String>,

    /// Directory where finished sessions are archived
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Persist the effective settings as the new defaults
    #[arg(long)]
    save_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = TrackerConfig::load().unwrap_or_default();
    if let Some(host) = args.gpsd_host {
        config.gpsd_host = host;
    }
    if let Some(port) = args.gpsd_port {
        config.gpsd_port = port;
    }
    if let Some(user) = args.user {
        config.user_id = user;
    }
    if let Some(activity_type) = args.activity_type {
        config.activity_type = activity_type;
    }
    if let Some(activity_name) = args.activity_name {
        config.activity_name = activity_name;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    if args.save_config {
        config.save().context("failed to save config")?;
    }

    init_logging(&config.output_dir)?;

    println!("Starting Activity Tracker...");
    println!(
        "Connecting to gpsd at {}:{}",
        config.gpsd_host, config.gpsd_port
    );

    let provider = GpsdProvider::new(config.gpsd_host.clone(), config.gpsd_port);
    let fixes = provider
        .subscribe()
        .await
        .context("failed to subscribe to the location provider")?;

    let sink = Arc::new(JsonFileSink::new(&config.output_dir));
    let meta = RecordMeta {
        user_id: config.user_id.clone(),
        activity_type: config.activity_type.clone(),
        activity_name: config.activity_name.clone(),
    };

    let tracker = SessionTracker::new(sink, meta);
    let snapshot = tracker.shared_snapshot();

    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let tracker_handle = tokio::spawn(tracker.run(fixes, cmd_rx));

    let display_running = Arc::new(AtomicBool::new(true));
    let display_flag = Arc::clone(&display_running);
    let display_snapshot = Arc::clone(&snapshot);
    let display_handle = tokio::spawn(async move {
        TerminalDisplay::new()
            .run(display_snapshot, display_flag, cmd_tx)
            .await
    });

    let final_state = tracker_handle.await.context("tracker task failed")?;

    display_running.store(false, Ordering::Relaxed);
    display_handle
        .await
        .context("display task failed")?
        .context("display error")?;

    match final_state {
        SessionState::Success => println!(
            "Session saved under {}",
            config.output_dir.display()
        ),
        SessionState::Discarded => println!("Session discarded."),
        SessionState::Error => println!("Session could not be saved."),
        other => println!("Session ended while {}.", other),
    }

    Ok(())
}

/// Log to a file next to the session archive; the terminal belongs to the
/// live display.
fn init_logging(output_dir: &std::path::Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(output_dir).context("failed to create output directory")?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(output_dir.join("activity-tracker.log"))
        .context("failed to open log file")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "activity_tracker=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(log_file),
        )
        .init();

    Ok(())
}
