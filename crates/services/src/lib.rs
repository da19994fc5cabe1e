#![forbid(unsafe_code)]

pub mod achievement_service;
pub mod admin;
pub mod app_services;
pub mod context;
pub mod dashboard;
pub mod error;
pub mod retry;
pub mod sessions;
pub mod streak_service;
pub mod tutor;

pub use prep_core::Clock;

pub use achievement_service::{AchievementService, FailedUnlock, UnlockReport};
pub use admin::{AdminService, ImportReport};
pub use app_services::AppServices;
pub use context::SessionContext;
pub use dashboard::{Dashboard, DashboardService, LEADERBOARD_SIZE, SubjectOverview, TopicOverview};
pub use error::{
    AdminError, AppServicesError, AuthError, DashboardError, ExamError, ImportError,
    PracticeError, StreakServiceError, TutorError,
};
pub use retry::{RetryPolicy, SyncStatus};
pub use sessions::{
    AttemptReport, MockExamService, PracticeLoopService, PracticeSession, RunningExam,
    SessionTimer, Submission, SubmitKind,
};
pub use streak_service::{StreakService, StreakUpdate};
pub use tutor::{ChatGateway, TutorProxy, TutorService};
