use std::sync::Arc;

use prep_core::Clock;
use prep_core::model::{StreakRecord, UserId};
use prep_core::streak::{self, StreakOutcome};
use storage::repository::StreakRepository;
use tracing::{debug, info};

use crate::error::StreakServiceError;
use crate::retry::{RetryPolicy, SyncStatus};

/// Result of recording a practice action for the streak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakUpdate {
    pub outcome: StreakOutcome,
    pub sync: SyncStatus,
}

/// Applies the daily streak rules and writes the result back.
#[derive(Clone)]
pub struct StreakService {
    clock: Clock,
    streaks: Arc<dyn StreakRepository>,
    retry: RetryPolicy,
}

impl StreakService {
    #[must_use]
    pub fn new(clock: Clock, streaks: Arc<dyn StreakRepository>) -> Self {
        Self {
            clock,
            streaks,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Record that `user` practiced today.
    ///
    /// Writes at most once, and not at all when the streak is unchanged.
    /// A failed write is reported through `sync` rather than as an error.
    ///
    /// # Errors
    ///
    /// Returns `StreakServiceError::ClockSkew` when today is before the stored
    /// practice date (nothing is written), or `Storage` if the read fails.
    pub async fn record_practice(&self, user: UserId) -> Result<StreakUpdate, StreakServiceError> {
        let previous = self.streaks.get_streak(user).await?;
        let today = self.clock.today();
        let outcome = streak::evaluate(previous.as_ref(), today)?;

        if !outcome.is_changed() {
            debug!(user_id = %user, "streak already counted today");
            return Ok(StreakUpdate {
                outcome,
                sync: SyncStatus::Skipped,
            });
        }

        let record = outcome.record;
        let sync = match self
            .retry
            .run("put_streak", || self.streaks.put_streak(user, &record))
            .await
        {
            Ok(()) => {
                info!(
                    user_id = %user,
                    change = ?outcome.change,
                    current = record.current_streak(),
                    longest = record.longest_streak(),
                    "streak updated"
                );
                SyncStatus::Synced
            }
            Err(err) => SyncStatus::failed(err),
        };
        Ok(StreakUpdate { outcome, sync })
    }

    /// # Errors
    ///
    /// Returns `StreakServiceError::Storage` on read failure.
    pub async fn current(&self, user: UserId) -> Result<Option<StreakRecord>, StreakServiceError> {
        Ok(self.streaks.get_streak(user).await?)
    }
}
