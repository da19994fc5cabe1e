use thiserror::Error;

use crate::countdown::CountdownError;
use crate::model::{
    AchievementError, AttemptError, CatalogError, ProgressError, QuestionError, StreakRecordError,
};
use crate::streak::StreakError;

/// Umbrella for every validation failure the domain layer can raise.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Achievement(#[from] AchievementError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    StreakRecord(#[from] StreakRecordError),
    #[error(transparent)]
    Streak(#[from] StreakError),
    #[error(transparent)]
    Countdown(#[from] CountdownError),
}
