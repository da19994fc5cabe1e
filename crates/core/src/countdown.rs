//! Exam countdown state machine.
//!
//! `Countdown` knows nothing about wall-clock time: whoever drives it calls
//! [`Countdown::tick`] once per elapsed second. Reaching zero moves it to
//! `Stopped(Expired)` exactly once; any stop is terminal.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CountdownError {
    #[error("countdown duration must be at least one second")]
    ZeroDuration,
}

/// Why a countdown stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The user submitted before time ran out.
    Submitted,
    /// Remaining time reached zero.
    Expired,
    /// The owning session went away.
    TornDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Running,
    Stopped(StopReason),
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// One second consumed, time left.
    Running { remaining_secs: u32 },
    /// This tick consumed the last second. Fires once per countdown.
    Expired,
    /// The countdown was already stopped; nothing changed.
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    duration_secs: u32,
    remaining_secs: u32,
    state: TimerState,
}

impl Countdown {
    /// # Errors
    ///
    /// Returns `CountdownError::ZeroDuration` for a zero-second budget.
    pub fn new(duration_secs: u32) -> Result<Self, CountdownError> {
        if duration_secs == 0 {
            return Err(CountdownError::ZeroDuration);
        }
        Ok(Self {
            duration_secs,
            remaining_secs: duration_secs,
            state: TimerState::Running,
        })
    }

    /// Consume one second.
    pub fn tick(&mut self) -> Tick {
        if self.state != TimerState::Running {
            return Tick::Inactive;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.state = TimerState::Stopped(StopReason::Expired);
            return Tick::Expired;
        }
        Tick::Running {
            remaining_secs: self.remaining_secs,
        }
    }

    /// Stop a running countdown. Returns `false` if it was already stopped.
    pub fn stop(&mut self, reason: StopReason) -> bool {
        if self.state != TimerState::Running {
            return false;
        }
        self.state = TimerState::Stopped(reason);
        true
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        self.state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    /// Seconds consumed so far.
    #[must_use]
    pub fn elapsed_secs(&self) -> u32 {
        self.duration_secs - self.remaining_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_duration_is_rejected() {
        assert_eq!(Countdown::new(0).unwrap_err(), CountdownError::ZeroDuration);
    }

    #[test]
    fn one_second_countdown_expires_on_first_tick() {
        let mut c = Countdown::new(1).unwrap();
        assert_eq!(c.tick(), Tick::Expired);
        assert_eq!(c.state(), TimerState::Stopped(StopReason::Expired));
        assert_eq!(c.tick(), Tick::Inactive);
        assert_eq!(c.remaining_secs(), 0);
        assert_eq!(c.elapsed_secs(), 1);
    }

    #[test]
    fn remaining_decreases_once_per_tick() {
        let mut c = Countdown::new(3).unwrap();
        assert_eq!(c.tick(), Tick::Running { remaining_secs: 2 });
        assert_eq!(c.tick(), Tick::Running { remaining_secs: 1 });
        assert_eq!(c.tick(), Tick::Expired);
        let expirations = (0..5).filter(|_| c.tick() == Tick::Expired).count();
        assert_eq!(expirations, 0);
    }

    #[test]
    fn manual_stop_is_terminal() {
        let mut c = Countdown::new(10).unwrap();
        c.tick();
        assert!(c.stop(StopReason::Submitted));
        assert!(!c.stop(StopReason::TornDown));
        assert_eq!(c.tick(), Tick::Inactive);
        assert_eq!(c.state(), TimerState::Stopped(StopReason::Submitted));
        assert_eq!(c.elapsed_secs(), 1);
    }

    #[test]
    fn stop_after_expiry_is_ignored() {
        let mut c = Countdown::new(1).unwrap();
        c.tick();
        assert!(!c.stop(StopReason::Submitted));
        assert_eq!(c.state(), TimerState::Stopped(StopReason::Expired));
    }
}
