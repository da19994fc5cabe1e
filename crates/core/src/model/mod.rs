mod achievement;
mod answers;
mod attempt;
mod catalog;
mod ids;
mod progress;
mod question;
mod streak;
mod user;

pub use ids::{
    AchievementId, AttemptId, ExamTypeId, MockExamId, ParseIdError, QuestionId, SubjectId,
    TopicId, TrackId, UserId,
};

pub use achievement::{Achievement, AchievementError, ConditionType, UnlockedAchievement};
pub use answers::AnswerMap;
pub use attempt::{AttemptError, AttemptResult, StoredAttempt};
pub use catalog::{
    CatalogError, ExamType, MockExam, Subject, Topic, Track, TrackColor, TrackSelection,
};
pub use progress::{AggregateStats, ProgressError, ProgressRecord};
pub use question::{
    Difficulty, OptionLabel, Question, QuestionDraft, QuestionError, QuestionOptions,
    ValidatedQuestion,
};
pub use streak::{StreakRecord, StreakRecordError};
pub use user::{AuthIdentity, AuthUser, ChatMessage, ChatRole, LeaderboardEntry, UserProfile};
