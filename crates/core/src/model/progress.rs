use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::TopicId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("questions_correct ({correct}) exceeds questions_attempted ({attempted})")]
    CorrectExceedsAttempted { attempted: u32, correct: u32 },
}

/// Cumulative practice counters for one user on one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    topic_id: TopicId,
    questions_attempted: u32,
    questions_correct: u32,
    last_practiced_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// First answer on a topic.
    #[must_use]
    pub fn first_answer(topic_id: TopicId, is_correct: bool, at: DateTime<Utc>) -> Self {
        Self {
            topic_id,
            questions_attempted: 1,
            questions_correct: u32::from(is_correct),
            last_practiced_at: at,
        }
    }

    /// Rehydrate from storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::CorrectExceedsAttempted` for inconsistent counters.
    pub fn from_persisted(
        topic_id: TopicId,
        questions_attempted: u32,
        questions_correct: u32,
        last_practiced_at: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        if questions_correct > questions_attempted {
            return Err(ProgressError::CorrectExceedsAttempted {
                attempted: questions_attempted,
                correct: questions_correct,
            });
        }
        Ok(Self {
            topic_id,
            questions_attempted,
            questions_correct,
            last_practiced_at,
        })
    }

    /// Counters only ever grow.
    #[must_use]
    pub fn record_answer(&self, is_correct: bool, at: DateTime<Utc>) -> Self {
        Self {
            topic_id: self.topic_id,
            questions_attempted: self.questions_attempted.saturating_add(1),
            questions_correct: self
                .questions_correct
                .saturating_add(u32::from(is_correct)),
            last_practiced_at: at.max(self.last_practiced_at),
        }
    }

    #[must_use]
    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    #[must_use]
    pub fn questions_attempted(&self) -> u32 {
        self.questions_attempted
    }

    #[must_use]
    pub fn questions_correct(&self) -> u32 {
        self.questions_correct
    }

    #[must_use]
    pub fn last_practiced_at(&self) -> DateTime<Utc> {
        self.last_practiced_at
    }
}

/// Totals over every topic a user has practiced, plus the live streak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub total_correct: u32,
    pub total_attempted: u32,
    pub current_streak: u32,
}

impl AggregateStats {
    #[must_use]
    pub fn from_progress(records: &[ProgressRecord], current_streak: u32) -> Self {
        let (total_attempted, total_correct) =
            records.iter().fold((0_u32, 0_u32), |(attempted, correct), r| {
                (
                    attempted.saturating_add(r.questions_attempted),
                    correct.saturating_add(r.questions_correct),
                )
            });
        Self {
            total_correct,
            total_attempted,
            current_streak,
        }
    }

    /// Accuracy in percent, `0.0` when nothing was attempted.
    #[must_use]
    pub fn accuracy_percent(&self) -> f64 {
        if self.total_attempted == 0 {
            return 0.0;
        }
        f64::from(self.total_correct) / f64::from(self.total_attempted) * 100.0
    }

    /// Exact check of `accuracy_percent() >= threshold` without float rounding.
    #[must_use]
    pub fn accuracy_at_least(&self, threshold_percent: u32) -> bool {
        if self.total_attempted == 0 {
            return threshold_percent == 0;
        }
        u64::from(self.total_correct) * 100
            >= u64::from(threshold_percent) * u64::from(self.total_attempted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    #[test]
    fn record_answer_only_grows() {
        let now = fixed_now();
        let first = ProgressRecord::first_answer(TopicId::new(3), false, now);
        assert_eq!(first.questions_attempted(), 1);
        assert_eq!(first.questions_correct(), 0);

        let next = first.record_answer(true, now + Duration::minutes(1));
        assert_eq!(next.questions_attempted(), 2);
        assert_eq!(next.questions_correct(), 1);
        assert_eq!(next.last_practiced_at(), now + Duration::minutes(1));
    }

    #[test]
    fn persisted_counters_are_checked() {
        let err = ProgressRecord::from_persisted(TopicId::new(1), 2, 3, fixed_now()).unwrap_err();
        assert_eq!(
            err,
            ProgressError::CorrectExceedsAttempted {
                attempted: 2,
                correct: 3
            }
        );
    }

    #[test]
    fn aggregate_sums_topics() {
        let now = fixed_now();
        let records = vec![
            ProgressRecord::from_persisted(TopicId::new(1), 10, 8, now).unwrap(),
            ProgressRecord::from_persisted(TopicId::new(2), 15, 12, now).unwrap(),
        ];
        let stats = AggregateStats::from_progress(&records, 4);
        assert_eq!(stats.total_attempted, 25);
        assert_eq!(stats.total_correct, 20);
        assert_eq!(stats.current_streak, 4);
        assert!(stats.accuracy_at_least(80));
        assert!(!stats.accuracy_at_least(81));
        assert!((stats.accuracy_percent() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn empty_aggregate_has_zero_accuracy() {
        let stats = AggregateStats::default();
        assert_eq!(stats.accuracy_percent(), 0.0);
        assert!(!stats.accuracy_at_least(1));
    }
}
