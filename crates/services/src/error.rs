//! Shared error types for the services crate.

use thiserror::Error;

use prep_core::countdown::CountdownError;
use prep_core::model::{AchievementError, AttemptError, CatalogError, QuestionError};
use prep_core::streak::StreakError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `SessionContext`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("no user is logged in")]
    Unauthenticated,
    #[error("admin access required")]
    Forbidden,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `StreakService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StreakServiceError {
    #[error(transparent)]
    ClockSkew(#[from] StreakError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the practice loop.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PracticeError {
    #[error("topic not found")]
    NotFound,
    #[error("no questions available for this topic")]
    NoQuestions,
    #[error("current question was already answered")]
    AlreadyAnswered,
    #[error("practice session already finished")]
    Finished,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the mock exam workflow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExamError {
    #[error("mock exam or attempt not found")]
    NotFound,
    #[error("mock exam has no questions")]
    NoQuestions,
    #[error("question {0} is not part of this exam")]
    UnknownQuestion(u64),
    #[error("question index {index} is out of range (exam has {len})")]
    OutOfRange { index: usize, len: usize },
    #[error("exam already submitted")]
    AlreadySubmitted,
    #[error("exam has not been submitted yet")]
    NotSubmitted,
    #[error(transparent)]
    Countdown(#[from] CountdownError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the tutor chat gateway and service.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TutorError {
    #[error("message is required")]
    EmptyMessage,
    #[error("tutor is not configured")]
    NotConfigured,
    #[error("tutor request failed with status {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("tutor returned an unreadable response: {0}")]
    Decode(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `DashboardService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DashboardError {
    #[error("no track selected")]
    NoTrackSelection,
    #[error("track or exam type not found")]
    NotFound,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Raised when a CSV batch contains nothing worth inserting.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ImportError {
    #[error("import contained no valid rows ({skipped} skipped)")]
    NoValidRows { skipped: usize },
}

/// Errors emitted by `AdminService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdminError {
    #[error("topic, mock exam or question not found")]
    NotFound,
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Achievement(#[from] AchievementError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
