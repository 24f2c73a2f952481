// src/display/terminal.rs
//! Terminal-based live session display
//!
//! Read-only consumer of the tracking snapshot; the only thing it feeds
//! back into the core is user commands mapped from key presses.

use crate::{
    error::{Result, TrackerError},
    session::{SessionState, TrackingSnapshot},
    tracker::SessionCommand,
};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, DisableLineWrap, EnableLineWrap},
};
use std::{
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};
use tokio::sync::mpsc;
use tokio::time::sleep;

pub struct TerminalDisplay;

impl TerminalDisplay {
    pub fn new() -> Self {
        Self
    }

    /// Start the display loop; returns when the running flag clears.
    pub async fn run(
        &self,
        snapshot: Arc<RwLock<TrackingSnapshot>>,
        running: Arc<AtomicBool>,
        commands: mpsc::Sender<SessionCommand>,
    ) -> Result<()> {
        let mut stdout = io::stdout();
        terminal::enable_raw_mode().map_err(TrackerError::Io)?;
        execute!(stdout, Hide, DisableLineWrap).map_err(TrackerError::Io)?;

        // Keys are read on a plain thread; crossterm's event polling is
        // blocking and must not stall the display loop.
        spawn_key_thread(Arc::clone(&snapshot), Arc::clone(&running), commands);

        while running.load(Ordering::Relaxed) {
            execute!(stdout, Clear(ClearType::All), MoveTo(0, 0)).map_err(TrackerError::Io)?;

            let current = snapshot.read().unwrap().clone();
            render(&mut stdout, &current)?;

            stdout.flush().map_err(TrackerError::Io)?;
            sleep(Duration::from_millis(500)).await;
        }

        execute!(stdout, Show, EnableLineWrap).map_err(TrackerError::Io)?;
        terminal::disable_raw_mode().map_err(TrackerError::Io)?;
        println!("\nShutting down...");
        Ok(())
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_key_thread(
    snapshot: Arc<RwLock<TrackingSnapshot>>,
    running: Arc<AtomicBool>,
    commands: mpsc::Sender<SessionCommand>,
) {
    std::thread::spawn(move || {
        while running.load(Ordering::Relaxed) {
            match event::poll(Duration::from_millis(200)) {
                Ok(true) => {
                    if let Ok(Event::Key(key)) = event::read() {
                        let state = snapshot.read().unwrap().state;
                        if let Some(cmd) = map_key(key, state) {
                            if commands.blocking_send(cmd).is_err() {
                                break;
                            }
                        }
                    }
                }
                Ok(false) => {}
                Err(_) => break,
            }
        }
    });
}

/// Map a key press to a session command, given the current state.
fn map_key(key: KeyEvent, state: SessionState) -> Option<SessionCommand> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(SessionCommand::Shutdown);
    }

    match key.code {
        KeyCode::Char(' ') => match state {
            SessionState::Tracking => Some(SessionCommand::Pause),
            SessionState::Paused => Some(SessionCommand::Resume),
            _ => None,
        },
        KeyCode::Char('f') => Some(SessionCommand::Finish),
        KeyCode::Char('y') => Some(SessionCommand::ConfirmSave),
        KeyCode::Char('n') => Some(SessionCommand::CancelFinish),
        KeyCode::Char('d') => Some(SessionCommand::Discard),
        KeyCode::Char('q') => Some(SessionCommand::Shutdown),
        _ => None,
    }
}

fn render(stdout: &mut impl Write, snapshot: &TrackingSnapshot) -> Result<()> {
    execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("=".repeat(60)),
        Print("\r\n"),
        Print("Activity Tracker - Live Session"),
        Print("\r\n"),
        Print("=".repeat(60)),
        Print("\r\n"),
        ResetColor
    )
    .map_err(TrackerError::Io)?;

    let state_color = match snapshot.state {
        SessionState::Tracking => Color::Green,
        SessionState::Paused => Color::Yellow,
        SessionState::Confirming | SessionState::Saving => Color::Cyan,
        SessionState::Success => Color::Green,
        SessionState::Error => Color::Red,
        SessionState::Discarded => Color::DarkGrey,
    };
    execute!(
        stdout,
        Print("State: "),
        SetForegroundColor(state_color),
        Print(format!("{}", snapshot.state)),
        ResetColor,
        Print("\r\n\r\n")
    )
    .map_err(TrackerError::Io)?;

    execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("SESSION:\r\n"),
        ResetColor,
        Print(format!("  Elapsed:    {}\r\n", snapshot.format_elapsed())),
        Print(format!("  Distance:   {:>9.2} km\r\n", snapshot.total_distance_km)),
        Print(format!("  Speed:      {:>9.1} km/h\r\n", snapshot.speed_kmh)),
        Print(format!("  Ascent:     {:>9.0} m\r\n", snapshot.elevation_gain_m)),
        Print(format!("  Descent:    {:>9.0} m\r\n", snapshot.elevation_loss_m)),
        Print(format!("  Route pts:  {:>9}\r\n", snapshot.route_len)),
    )
    .map_err(TrackerError::Io)?;

    let position_str = match snapshot.position {
        Some((lat, lon)) => format!("{:>12.6}, {:>12.6}", lat, lon),
        None => "waiting for fix...".to_string(),
    };
    let signal_str = if snapshot.stabilized {
        "stable"
    } else {
        "warming up"
    };
    execute!(
        stdout,
        Print(format!("  Position:   {} ({})\r\n\r\n", position_str, signal_str))
    )
    .map_err(TrackerError::Io)?;

    let controls = match snapshot.state {
        SessionState::Tracking => "[space] pause   [f] finish   [q] quit",
        SessionState::Paused => "[space] resume   [f] finish   [q] quit",
        SessionState::Confirming => "[y] save   [n] keep going   [d] discard",
        SessionState::Saving => "saving...",
        SessionState::Error => "[y] retry save   [q] quit",
        SessionState::Success | SessionState::Discarded => "[q] quit",
    };
    execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("=".repeat(60)),
        Print("\r\n"),
        Print(controls),
        Print("\r\n"),
        ResetColor
    )
    .map_err(TrackerError::Io)?;

    Ok(())
}
