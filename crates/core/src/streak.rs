//! Daily streak evaluation.

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::StreakRecord;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StreakError {
    /// `today` is earlier than the stored last practice date.
    #[error("today ({today}) is before last practice date ({last})")]
    ClockSkew { last: NaiveDate, today: NaiveDate },
}

/// How a streak moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    /// No prior record.
    Started,
    /// Practiced yesterday, streak grows.
    Extended,
    /// Gap of more than one day, streak back to 1.
    Reset,
    /// Already practiced today.
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakOutcome {
    pub record: StreakRecord,
    pub change: StreakChange,
}

impl StreakOutcome {
    /// Whether the record needs to be written back.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.change != StreakChange::Unchanged
    }
}

/// Compute the next streak record for a practice action on `today`.
///
/// # Errors
///
/// Returns `StreakError::ClockSkew` when `today` precedes the last practice date.
pub fn evaluate(
    previous: Option<&StreakRecord>,
    today: NaiveDate,
) -> Result<StreakOutcome, StreakError> {
    let Some(prev) = previous else {
        return Ok(StreakOutcome {
            record: StreakRecord::started(today),
            change: StreakChange::Started,
        });
    };

    let last = prev.last_practice_date();
    let days = (today - last).num_days();

    let outcome = match days {
        d if d < 0 => return Err(StreakError::ClockSkew { last, today }),
        0 => StreakOutcome {
            record: *prev,
            change: StreakChange::Unchanged,
        },
        1 => StreakOutcome {
            record: prev.extended(today),
            change: StreakChange::Extended,
        },
        _ => StreakOutcome {
            record: prev.restarted(today),
            change: StreakChange::Reset,
        },
    };
    Ok(outcome)
}
