use std::sync::{Arc, Mutex};
use std::time::Duration;

use prep_core::countdown::{Countdown, CountdownError, StopReason, Tick, TimerState};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::debug;

const TICK: Duration = Duration::from_secs(1);

/// Drives a [`Countdown`] once per second on the tokio runtime.
///
/// Remaining seconds are published on a watch channel. Expiry is signalled
/// through a oneshot, so it can fire at most once. Stopping or dropping the
/// timer aborts the tick task.
pub struct SessionTimer {
    countdown: Arc<Mutex<Countdown>>,
    remaining: watch::Receiver<u32>,
    expired: Option<oneshot::Receiver<()>>,
    task: JoinHandle<()>,
}

impl SessionTimer {
    /// Start counting down from `duration_secs`. The first tick lands one
    /// second from now.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `CountdownError::ZeroDuration` for a zero budget.
    pub fn start(duration_secs: u32) -> Result<Self, CountdownError> {
        let countdown = Arc::new(Mutex::new(Countdown::new(duration_secs)?));
        let (remaining_tx, remaining_rx) = watch::channel(duration_secs);
        let (expired_tx, expired_rx) = oneshot::channel();
        let task = tokio::spawn(run_ticks(Arc::clone(&countdown), remaining_tx, expired_tx));
        Ok(Self {
            countdown,
            remaining: remaining_rx,
            expired: Some(expired_rx),
            task,
        })
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.countdown
            .lock()
            .map_or(0, |countdown| countdown.remaining_secs())
    }

    /// Seconds actually ticked so far.
    #[must_use]
    pub fn elapsed_secs(&self) -> u32 {
        self.countdown
            .lock()
            .map_or(0, |countdown| countdown.elapsed_secs())
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        self.countdown
            .lock()
            .map_or(TimerState::Stopped(StopReason::TornDown), |countdown| {
                countdown.state()
            })
    }

    /// Watch remaining seconds as they change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.remaining.clone()
    }

    /// Stop the countdown and cancel the pending tick.
    ///
    /// Returns `false` if the countdown had already stopped.
    pub fn stop(&mut self, reason: StopReason) -> bool {
        let changed = self
            .countdown
            .lock()
            .is_ok_and(|mut countdown| countdown.stop(reason));
        self.task.abort();
        if changed {
            debug!(?reason, "session timer stopped");
        }
        changed
    }

    /// Resolve once the countdown reaches zero.
    ///
    /// Returns `false` if the timer was stopped first, or if expiry was
    /// already consumed by an earlier call. Cancel safe: dropping the future
    /// before it resolves leaves expiry armed for the next call.
    pub async fn wait_expired(&mut self) -> bool {
        let Some(rx) = self.expired.as_mut() else {
            return false;
        };
        let fired = rx.await.is_ok();
        self.expired = None;
        fired
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        self.stop(StopReason::TornDown);
    }
}

async fn run_ticks(
    countdown: Arc<Mutex<Countdown>>,
    remaining_tx: watch::Sender<u32>,
    expired_tx: oneshot::Sender<()>,
) {
    let mut interval = time::interval_at(Instant::now() + TICK, TICK);
    loop {
        interval.tick().await;
        let tick = {
            let Ok(mut guard) = countdown.lock() else {
                return;
            };
            guard.tick()
        };
        match tick {
            Tick::Running { remaining_secs } => {
                debug!(remaining_secs, "tick");
                remaining_tx.send_replace(remaining_secs);
            }
            Tick::Expired => {
                debug!("countdown expired");
                remaining_tx.send_replace(0);
                let _ = expired_tx.send(());
                return;
            }
            Tick::Inactive => return,
        }
    }
}
