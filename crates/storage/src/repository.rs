use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prep_core::model::{
    Achievement, AchievementId, AttemptId, AttemptResult, ChatMessage, ConditionType, ExamType,
    ExamTypeId, LeaderboardEntry, MockExam, MockExamId, ProgressRecord, Question, QuestionId,
    StoredAttempt, StreakRecord, Subject, SubjectId, Topic, TopicId, Track, TrackId,
    TrackSelection, UnlockedAchievement, UserId, UserProfile, ValidatedQuestion,
};
use thiserror::Error;

use crate::memory::InMemoryRepository;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Insert shape for a mock exam whose id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMockExamRecord {
    pub name: String,
    pub exam_type_id: Option<ExamTypeId>,
    pub duration_minutes: u32,
    pub total_questions: u32,
    pub created_at: DateTime<Utc>,
}

impl NewMockExamRecord {
    /// Take the fields of an already validated exam, ignoring its id.
    #[must_use]
    pub fn from_exam(exam: &MockExam) -> Self {
        Self {
            name: exam.name.clone(),
            exam_type_id: exam.exam_type_id,
            duration_minutes: exam.duration_minutes,
            total_questions: exam.total_questions,
            created_at: exam.created_at,
        }
    }
}

/// Insert shape for an achievement rule whose id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAchievementRecord {
    pub name: String,
    pub description: String,
    pub condition: ConditionType,
    pub threshold: u32,
}

impl NewAchievementRecord {
    #[must_use]
    pub fn from_achievement(achievement: &Achievement) -> Self {
        Self {
            name: achievement.name.clone(),
            description: achievement.description.clone(),
            condition: achievement.condition,
            threshold: achievement.threshold,
        }
    }
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Exam bodies, tracks, subjects and topics.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the exam type cannot be stored.
    async fn upsert_exam_type(&self, exam_type: &ExamType) -> Result<(), StorageError>;

    /// All exam types ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn list_exam_types(&self) -> Result<Vec<ExamType>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the track cannot be stored.
    async fn upsert_track(&self, track: &Track) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_track(&self, id: TrackId) -> Result<Option<Track>, StorageError>;

    /// All tracks ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn list_tracks(&self) -> Result<Vec<Track>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the subject cannot be stored.
    async fn upsert_subject(&self, subject: &Subject) -> Result<(), StorageError>;

    /// Subjects visible on `track`: compulsory ones plus those of the track,
    /// ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn subjects_for_track(&self, track: TrackId) -> Result<Vec<Subject>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the topic cannot be stored.
    async fn upsert_topic(&self, topic: &Topic) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError>;

    /// Topics belonging to any of `subjects`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn topics_for_subjects(&self, subjects: &[SubjectId]) -> Result<Vec<Topic>, StorageError>;
}

//
// ─── QUESTIONS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Insert questions, returning the assigned ids in input order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any question cannot be stored; nothing is
    /// inserted in that case.
    async fn insert_questions(
        &self,
        questions: &[ValidatedQuestion],
    ) -> Result<Vec<QuestionId>, StorageError>;

    /// Up to `limit` questions of a topic, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn questions_for_topic(
        &self,
        topic: TopicId,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError>;

    /// Fetch questions by id, preserving the order of `ids`. Unknown ids are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError>;

    /// Most recently created questions first, optionally within one topic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn recent_questions(
        &self,
        topic: Option<TopicId>,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such question exists.
    async fn delete_question(&self, id: QuestionId) -> Result<(), StorageError>;
}

//
// ─── MOCK EXAMS ────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait MockExamRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the exam cannot be stored.
    async fn insert_mock_exam(&self, exam: NewMockExamRecord) -> Result<MockExamId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_mock_exam(&self, id: MockExamId) -> Result<Option<MockExam>, StorageError>;

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn list_mock_exams(&self) -> Result<Vec<MockExam>, StorageError>;

    /// Replace the exam's question list with `questions`, in order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the exam does not exist.
    async fn set_exam_questions(
        &self,
        exam: MockExamId,
        questions: &[QuestionId],
    ) -> Result<(), StorageError>;

    /// Question ids of an exam in their configured order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn exam_question_ids(&self, exam: MockExamId) -> Result<Vec<QuestionId>, StorageError>;
}

//
// ─── USER RESULTS ──────────────────────────────────────────────────────────────
//

/// Completed mock exam attempts. Attempts are append-only.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn append_attempt(&self, attempt: &AttemptResult) -> Result<AttemptId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_attempt(&self, id: AttemptId) -> Result<Option<StoredAttempt>, StorageError>;

    /// A user's attempts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn attempts_for_user(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<StoredAttempt>, StorageError>;
}

/// Per-user, per-topic practice counters.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_progress(
        &self,
        user: UserId,
        topic: TopicId,
    ) -> Result<Option<ProgressRecord>, StorageError>;

    /// Insert or replace the row for `(user, record.topic_id())`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_progress(&self, user: UserId, record: &ProgressRecord)
    -> Result<(), StorageError>;

    /// Every topic row for a user, ordered by topic id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn progress_for_user(&self, user: UserId) -> Result<Vec<ProgressRecord>, StorageError>;
}

#[async_trait]
pub trait StreakRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_streak(&self, user: UserId) -> Result<Option<StreakRecord>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn put_streak(&self, user: UserId, record: &StreakRecord) -> Result<(), StorageError>;
}

/// Achievement catalog and unlock records.
#[async_trait]
pub trait AchievementRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the rule cannot be stored.
    async fn insert_achievement(
        &self,
        achievement: NewAchievementRecord,
    ) -> Result<AchievementId, StorageError>;

    /// The catalog ordered by threshold, then id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn list_achievements(&self) -> Result<Vec<Achievement>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn unlocked_ids(&self, user: UserId) -> Result<HashSet<AchievementId>, StorageError>;

    /// Record an unlock. Returns `false` when the pair was already recorded;
    /// the original timestamp is kept.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn record_unlock(&self, unlock: &UnlockedAchievement) -> Result<bool, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn unlocks_for_user(
        &self,
        user: UserId,
    ) -> Result<Vec<UnlockedAchievement>, StorageError>;
}

#[async_trait]
pub trait ChatHistoryRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the message cannot be stored.
    async fn append_message(&self, message: &ChatMessage) -> Result<(), StorageError>;

    /// The latest `limit` messages of a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn recent_messages(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, StorageError>;

    /// Delete every message of a user, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn clear_messages(&self, user: UserId) -> Result<u64, StorageError>;
}

/// Profiles, track selections and the leaderboard view over progress.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be stored.
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_profile(&self, user: UserId) -> Result<Option<UserProfile>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the selection cannot be stored.
    async fn set_track_selection(&self, selection: &TrackSelection) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_track_selection(
        &self,
        user: UserId,
    ) -> Result<Option<TrackSelection>, StorageError>;

    /// Users with any progress, ranked by total correct descending, then
    /// total attempted ascending, then user id. Ranks start at 1.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StorageError>;
}

/// Username shown for users without a stored profile name.
pub const ANONYMOUS_USERNAME: &str = "Student";

/// Aggregates every repository behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn CatalogRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub mock_exams: Arc<dyn MockExamRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub streaks: Arc<dyn StreakRepository>,
    pub achievements: Arc<dyn AchievementRepository>,
    pub chat: Arc<dyn ChatHistoryRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Wire a single adapter implementing every repository trait.
    pub(crate) fn from_repository<R>(repo: R) -> Self
    where
        R: CatalogRepository
            + QuestionRepository
            + MockExamRepository
            + AttemptRepository
            + ProgressRepository
            + StreakRepository
            + AchievementRepository
            + ChatHistoryRepository
            + ProfileRepository
            + Clone
            + 'static,
    {
        Self {
            catalog: Arc::new(repo.clone()),
            questions: Arc::new(repo.clone()),
            mock_exams: Arc::new(repo.clone()),
            attempts: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            streaks: Arc::new(repo.clone()),
            achievements: Arc::new(repo.clone()),
            chat: Arc::new(repo.clone()),
            profiles: Arc::new(repo),
        }
    }
}
