use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StreakRecordError {
    #[error("current streak must be at least 1")]
    ZeroStreak,

    #[error("current streak ({current}) exceeds longest streak ({longest})")]
    CurrentExceedsLongest { current: u32, longest: u32 },

    #[error("longest streak ({longest}) exceeds total practice days ({total})")]
    LongestExceedsTotal { longest: u32, total: u32 },
}

/// Daily practice streak for a single user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakRecord {
    current_streak: u32,
    longest_streak: u32,
    last_practice_date: NaiveDate,
    total_practice_days: u32,
}

impl StreakRecord {
    /// A streak that starts today.
    #[must_use]
    pub fn started(today: NaiveDate) -> Self {
        Self {
            current_streak: 1,
            longest_streak: 1,
            last_practice_date: today,
            total_practice_days: 1,
        }
    }

    /// Rehydrate from storage.
    ///
    /// # Errors
    ///
    /// Returns `StreakRecordError` if the counters are inconsistent.
    pub fn from_persisted(
        current_streak: u32,
        longest_streak: u32,
        last_practice_date: NaiveDate,
        total_practice_days: u32,
    ) -> Result<Self, StreakRecordError> {
        if current_streak == 0 {
            return Err(StreakRecordError::ZeroStreak);
        }
        if current_streak > longest_streak {
            return Err(StreakRecordError::CurrentExceedsLongest {
                current: current_streak,
                longest: longest_streak,
            });
        }
        if longest_streak > total_practice_days {
            return Err(StreakRecordError::LongestExceedsTotal {
                longest: longest_streak,
                total: total_practice_days,
            });
        }
        Ok(Self {
            current_streak,
            longest_streak,
            last_practice_date,
            total_practice_days,
        })
    }

    #[must_use]
    pub fn current_streak(&self) -> u32 {
        self.current_streak
    }

    #[must_use]
    pub fn longest_streak(&self) -> u32 {
        self.longest_streak
    }

    #[must_use]
    pub fn last_practice_date(&self) -> NaiveDate {
        self.last_practice_date
    }

    #[must_use]
    pub fn total_practice_days(&self) -> u32 {
        self.total_practice_days
    }

    pub(crate) fn extended(&self, today: NaiveDate) -> Self {
        let current = self.current_streak.saturating_add(1);
        Self {
            current_streak: current,
            longest_streak: self.longest_streak.max(current),
            last_practice_date: today,
            total_practice_days: self.total_practice_days.saturating_add(1),
        }
    }

    pub(crate) fn restarted(&self, today: NaiveDate) -> Self {
        Self {
            current_streak: 1,
            longest_streak: self.longest_streak,
            last_practice_date: today,
            total_practice_days: self.total_practice_days.saturating_add(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn persisted_record_is_validated() {
        assert_eq!(
            StreakRecord::from_persisted(0, 3, date(2024, 1, 1), 5).unwrap_err(),
            StreakRecordError::ZeroStreak
        );
        assert!(matches!(
            StreakRecord::from_persisted(4, 3, date(2024, 1, 1), 5),
            Err(StreakRecordError::CurrentExceedsLongest { .. })
        ));
        assert!(matches!(
            StreakRecord::from_persisted(2, 6, date(2024, 1, 1), 5),
            Err(StreakRecordError::LongestExceedsTotal { .. })
        ));
        assert!(StreakRecord::from_persisted(5, 7, date(2024, 1, 1), 20).is_ok());
    }
}
