// src/tracker.rs
/// Session state machine: the single consumer of fixes and timer ticks

use crate::{
    aggregate::{RecordMeta, SessionAggregate, SessionRecord},
    error::Result,
    filter::{self, FixOutcome},
    gps::{data::LocationFix, provider::FixSubscription},
    persist::{SaveOutcome, SessionSink},
    session::{SessionContext, SessionState, TrackingSnapshot},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, RwLock,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// User intents fed into the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Pause,
    Resume,
    Finish,
    CancelFinish,
    ConfirmSave,
    Discard,
    Shutdown,
}

/// What a command asks the event loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandEffect {
    None,
    StartSave,
    Teardown,
}

/// Exclusive owner of the session context.
///
/// All mutation happens through the handlers below, driven one event at a
/// time by `run()`: location fixes, one-second ticks and user commands are
/// merged into a single ordered stream, so no two events ever race on the
/// context. The presentation layer only sees the published snapshot.
pub struct SessionTracker<S: SessionSink> {
    ctx: SessionContext,
    sink: Arc<S>,
    meta: RecordMeta,
    snapshot: Arc<RwLock<TrackingSnapshot>>,
    cancelled: Arc<AtomicBool>,
    /// Bumped on every context reset; stale completions compare against it.
    epoch: u64,
}

impl<S: SessionSink> SessionTracker<S> {
    pub fn new(sink: Arc<S>, meta: RecordMeta) -> Self {
        let ctx = SessionContext::fresh();
        let snapshot = Arc::new(RwLock::new(ctx.snapshot()));
        Self {
            ctx,
            sink,
            meta,
            snapshot,
            cancelled: Arc::new(AtomicBool::new(false)),
            epoch: 0,
        }
    }

    /// Shared read-only view for the presentation layer.
    pub fn shared_snapshot(&self) -> Arc<RwLock<TrackingSnapshot>> {
        Arc::clone(&self.snapshot)
    }

    /// Marker checked by every handler; set on teardown so late callbacks
    /// become no-ops.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn state(&self) -> SessionState {
        self.ctx.state
    }

    /// Replace the whole context for a fresh tracking attempt. Nothing is
    /// carried over from the previous run.
    pub fn reset(&mut self) {
        self.ctx = SessionContext::fresh();
        self.epoch += 1;
        self.publish();
    }

    fn publish(&self) {
        *self.snapshot.write().unwrap() = self.ctx.snapshot();
    }

    fn handle_fix(&mut self, fix: LocationFix) {
        if self.cancelled.load(Ordering::Relaxed) {
            return;
        }
        // Fixes keep arriving while paused or confirming; they must not
        // touch the accumulators or the stabilization state.
        if self.ctx.state != SessionState::Tracking {
            return;
        }

        let outcome = filter::apply_fix(&mut self.ctx, &fix);
        if outcome != FixOutcome::Rejected {
            self.ctx.last_display_speed_kmh = filter::display_speed_kmh(&fix);
        }
        self.publish();
    }

    fn handle_tick(&mut self) {
        if self.cancelled.load(Ordering::Relaxed) {
            return;
        }
        // The timer itself refuses to advance unless the session is
        // actively tracking.
        self.ctx.timer.tick();
        self.publish();
    }

    fn handle_command(&mut self, cmd: SessionCommand) -> CommandEffect {
        use SessionCommand::*;
        use SessionState::*;

        let effect = match (cmd, self.ctx.state) {
            (Pause, Tracking) => {
                self.ctx.timer.pause();
                self.ctx.state = Paused;
                CommandEffect::None
            }
            (Resume, Paused) => {
                self.ctx.timer.resume();
                self.ctx.state = Tracking;
                CommandEffect::None
            }
            (Finish, Tracking) => {
                self.ctx.timer.pause();
                self.ctx.paused_before_confirm = false;
                self.ctx.state = Confirming;
                CommandEffect::None
            }
            (Finish, Paused) => {
                self.ctx.paused_before_confirm = true;
                self.ctx.state = Confirming;
                CommandEffect::None
            }
            (CancelFinish, Confirming) => {
                if self.ctx.paused_before_confirm {
                    self.ctx.state = Paused;
                } else {
                    self.ctx.timer.resume();
                    self.ctx.state = Tracking;
                }
                CommandEffect::None
            }
            (ConfirmSave, Confirming) => {
                self.ctx.state = Saving;
                CommandEffect::StartSave
            }
            // Manual retry after a failed save; never automatic.
            (ConfirmSave, Error) => {
                self.ctx.state = Saving;
                CommandEffect::StartSave
            }
            (ConfirmSave, Saving) => {
                // Single-flight: a duplicate save request is a no-op.
                tracing::debug!("save already in flight, ignoring");
                CommandEffect::None
            }
            (Discard, Confirming) => {
                self.ctx.state = Discarded;
                CommandEffect::None
            }
            (Shutdown, _) => CommandEffect::Teardown,
            (cmd, state) => {
                tracing::debug!("command {:?} ignored in state {}", cmd, state);
                CommandEffect::None
            }
        };

        self.publish();
        effect
    }

    /// Build the aggregate from the frozen context and run the one
    /// persistence call. Invoked only on the transition into Saving.
    async fn save_session(&mut self) {
        let aggregate = SessionAggregate::from_context(&self.ctx);
        let record = SessionRecord::build(aggregate, &self.meta, self.ctx.started_at);

        let epoch = self.epoch;
        let result = self.sink.save(&record).await;
        self.finish_save(result, epoch);
    }

    fn finish_save(&mut self, result: Result<SaveOutcome>, epoch: u64) {
        // A completion from a torn-down or reset session must not mutate
        // the context that replaced it.
        if epoch != self.epoch
            || self.cancelled.load(Ordering::Relaxed)
            || self.ctx.state != SessionState::Saving
        {
            tracing::debug!("dropping stale save completion");
            return;
        }

        match result {
            Ok(outcome) if outcome.success => {
                tracing::info!(
                    "session saved{}",
                    outcome
                        .session_id
                        .as_deref()
                        .map(|id| format!(" as {}", id))
                        .unwrap_or_default()
                );
                self.ctx.state = SessionState::Success;
            }
            Ok(_) => {
                tracing::error!("persistence service reported failure");
                self.ctx.state = SessionState::Error;
            }
            Err(e) => {
                tracing::error!("save failed: {}", e);
                self.ctx.state = SessionState::Error;
            }
        }
        self.publish();
    }

    /// Drive the session to completion.
    ///
    /// Returns the final state. The subscription and the tick interval are
    /// released on every terminal transition and on teardown; in the Error
    /// state the loop stays alive so the user can retry or shut down.
    pub async fn run(
        mut self,
        mut fixes: FixSubscription,
        mut commands: mpsc::Receiver<SessionCommand>,
    ) -> SessionState {
        let mut ticker = interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first interval tick fires immediately; swallow it so the
        // elapsed counter starts at zero.
        ticker.tick().await;

        let mut fixes_open = true;

        loop {
            let effect = tokio::select! {
                _ = ticker.tick(), if !self.ctx.state.is_terminal() => {
                    self.handle_tick();
                    CommandEffect::None
                }
                maybe_fix = fixes.recv(), if fixes_open => {
                    match maybe_fix {
                        Some(fix) => self.handle_fix(fix),
                        None => {
                            fixes_open = false;
                            tracing::warn!("location stream ended");
                        }
                    }
                    CommandEffect::None
                }
                maybe_cmd = commands.recv() => {
                    match maybe_cmd {
                        Some(cmd) => self.handle_command(cmd),
                        // The owning side went away: tear down.
                        None => CommandEffect::Teardown,
                    }
                }
            };

            match effect {
                CommandEffect::None => {}
                CommandEffect::StartSave => {
                    // No further fixes are accepted once saving starts.
                    fixes.unsubscribe();
                    self.save_session().await;
                }
                CommandEffect::Teardown => {
                    self.cancelled.store(true, Ordering::Relaxed);
                    fixes.unsubscribe();
                    break;
                }
            }

            match self.ctx.state {
                SessionState::Success | SessionState::Discarded => {
                    self.cancelled.store(true, Ordering::Relaxed);
                    fixes.unsubscribe();
                    break;
                }
                SessionState::Error => {
                    // Stay alive for a manual retry; the subscription is
                    // already gone.
                    fixes.unsubscribe();
                }
                _ => {}
            }
        }

        self.publish();
        tracing::info!("session ended in state {}", self.ctx.state);
        self.ctx.state
    }
}
