// src/timer.rs
//! Session elapsed-time counter with pause/resume

/// One-second-resolution elapsed counter.
///
/// The counter only advances on `tick()` while running; pausing freezes the
/// value without resetting it. The owning state machine holds the single
/// interval that drives `tick()`.
#[derive(Debug, Clone)]
pub struct SessionTimer {
    elapsed_secs: u64,
    running: bool,
}

impl SessionTimer {
    /// Create a fresh timer, running from zero.
    pub fn new() -> Self {
        Self {
            elapsed_secs: 0,
            running: true,
        }
    }

    /// Advance by one second if the timer is running.
    pub fn tick(&mut self) {
        if self.running {
            self.elapsed_secs += 1;
        }
    }

    /// Freeze the counter at its current value.
    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Resume counting from the frozen value.
    pub fn resume(&mut self) {
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }
}

impl Default for SessionTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_advances_while_running() {
        let mut timer = SessionTimer::new();
        timer.tick();
        timer.tick();
        assert_eq!(timer.elapsed_secs(), 2);
    }

    #[test]
    fn test_pause_freezes_and_resume_continues() {
        let mut timer = SessionTimer::new();
        timer.tick();
        timer.pause();
        timer.tick();
        timer.tick();
        assert_eq!(timer.elapsed_secs(), 1);

        timer.resume();
        timer.tick();
        assert_eq!(timer.elapsed_secs(), 2);
    }
}
