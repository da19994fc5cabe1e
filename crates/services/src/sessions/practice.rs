use std::sync::Arc;

use chrono::{DateTime, Utc};
use prep_core::Clock;
use prep_core::model::{
    Achievement, AnswerMap, OptionLabel, ProgressRecord, Question, QuestionId, Topic, TopicId,
    UserId,
};
use prep_core::scoring::{self, Score};
use prep_core::streak::StreakOutcome;
use rand::rng;
use rand::seq::SliceRandom;
use storage::repository::{CatalogRepository, ProgressRepository, QuestionRepository, StorageError};
use tracing::{info, warn};

use super::progress::SessionProgress;
use crate::achievement_service::AchievementService;
use crate::context::SessionContext;
use crate::error::PracticeError;
use crate::retry::{RetryPolicy, SyncStatus};
use crate::streak_service::StreakService;

/// Questions loaded per practice round.
pub const PRACTICE_QUESTION_LIMIT: u32 = 20;

//
// ─── ANSWER RESULTS ────────────────────────────────────────────────────────────
//

/// Immediate feedback on one practice answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub question_id: QuestionId,
    pub selected: OptionLabel,
    pub correct: OptionLabel,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

/// Feedback plus what happened to the background writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PracticeAnswerResult {
    pub feedback: AnswerFeedback,
    pub progress_sync: SyncStatus,
    pub achievements_sync: SyncStatus,
    pub unlocked: Vec<Achievement>,
}

/// Where the session is after `advance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PracticeStep {
    /// Index of the question now shown.
    Next(usize),
    Finished(Score),
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory practice round over one topic.
pub struct PracticeSession {
    user: UserId,
    topic: Topic,
    questions: Vec<Question>,
    current: usize,
    answers: AnswerMap,
    feedback: Option<AnswerFeedback>,
    started_at: DateTime<Utc>,
    streak: Option<StreakOutcome>,
    streak_sync: SyncStatus,
    finished: bool,
}

impl PracticeSession {
    #[must_use]
    pub fn user(&self) -> UserId {
        self.user
    }

    #[must_use]
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The streak as evaluated when the round started, if that succeeded.
    #[must_use]
    pub fn streak(&self) -> Option<&StreakOutcome> {
        self.streak.as_ref()
    }

    #[must_use]
    pub fn streak_sync(&self) -> &SyncStatus {
        &self.streak_sync
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        if self.finished {
            return None;
        }
        self.questions.get(self.current)
    }

    /// Feedback for the current question once it has been answered.
    #[must_use]
    pub fn feedback(&self) -> Option<&AnswerFeedback> {
        self.feedback.as_ref()
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Running score over the answers given so far.
    #[must_use]
    pub fn score(&self) -> Score {
        scoring::score(&self.questions, &self.answers)
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.questions.len();
        let answered = self.answers.len();
        SessionProgress {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            is_complete: self.finished,
        }
    }

    /// Move to the next question, or finish after the last one.
    ///
    /// Unanswered questions may be skipped; they score as incorrect.
    pub fn advance(&mut self) -> PracticeStep {
        if !self.finished && self.current + 1 < self.questions.len() {
            self.current += 1;
            self.feedback = None;
            return PracticeStep::Next(self.current);
        }
        self.finished = true;
        self.feedback = None;
        PracticeStep::Finished(self.score())
    }

    fn record(&mut self, selected: OptionLabel) -> Result<AnswerFeedback, PracticeError> {
        if self.feedback.is_some() {
            return Err(PracticeError::AlreadyAnswered);
        }
        let question = self
            .current_question()
            .ok_or(PracticeError::Finished)?;
        let feedback = AnswerFeedback {
            question_id: question.id,
            selected,
            correct: question.correct,
            is_correct: question.is_correct(selected),
            explanation: question.explanation.clone(),
        };
        self.answers.select(feedback.question_id, selected);
        self.feedback = Some(feedback.clone());
        Ok(feedback)
    }
}

//
// ─── LOOP SERVICE ──────────────────────────────────────────────────────────────
//

/// Starts practice rounds and persists progress as answers come in.
#[derive(Clone)]
pub struct PracticeLoopService {
    clock: Clock,
    context: SessionContext,
    catalog: Arc<dyn CatalogRepository>,
    questions: Arc<dyn QuestionRepository>,
    progress: Arc<dyn ProgressRepository>,
    streaks: StreakService,
    achievements: AchievementService,
    retry: RetryPolicy,
    shuffle: bool,
}

impl PracticeLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        context: SessionContext,
        catalog: Arc<dyn CatalogRepository>,
        questions: Arc<dyn QuestionRepository>,
        progress: Arc<dyn ProgressRepository>,
        streaks: StreakService,
        achievements: AchievementService,
    ) -> Self {
        Self {
            clock,
            context,
            catalog,
            questions,
            progress,
            streaks,
            achievements,
            retry: RetryPolicy::default(),
            shuffle: false,
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Start a practice round for `topic_id` and count today towards the streak.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Auth` without a logged-in user, `NotFound` for an
    /// unknown topic, `NoQuestions` when the topic is empty, or `Storage` if
    /// loading fails.
    pub async fn start(&self, topic_id: TopicId) -> Result<PracticeSession, PracticeError> {
        let user = self.context.require_user()?;
        let topic = self
            .catalog
            .get_topic(topic_id)
            .await?
            .ok_or(PracticeError::NotFound)?;

        let mut questions = self
            .questions
            .questions_for_topic(topic_id, PRACTICE_QUESTION_LIMIT)
            .await?;
        if questions.is_empty() {
            return Err(PracticeError::NoQuestions);
        }
        if self.shuffle {
            questions.shuffle(&mut rng());
        }

        let (streak, streak_sync) = match self.streaks.record_practice(user.id).await {
            Ok(update) => (Some(update.outcome), update.sync),
            Err(err) => {
                warn!(user_id = %user.id, error = %err, "streak not recorded");
                (None, SyncStatus::failed(err))
            }
        };

        info!(
            user_id = %user.id,
            topic_id = topic_id.value(),
            questions = questions.len(),
            "practice started"
        );

        Ok(PracticeSession {
            user: user.id,
            topic,
            questions,
            current: 0,
            answers: AnswerMap::new(),
            feedback: None,
            started_at: self.clock.now(),
            streak,
            streak_sync,
            finished: false,
        })
    }

    /// Answer the current question.
    ///
    /// The progress upsert and achievement check never fail the answer;
    /// their outcome is reported in the returned sync fields.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::AlreadyAnswered` if the current question already
    /// has feedback and `Finished` once the round is over.
    pub async fn answer(
        &self,
        session: &mut PracticeSession,
        selected: OptionLabel,
    ) -> Result<PracticeAnswerResult, PracticeError> {
        let feedback = session.record(selected)?;
        let user = session.user;
        let topic = session.topic.id;
        let now = self.clock.now();

        let progress_sync = match self
            .retry
            .run("upsert_progress", || {
                self.bump_progress(user, topic, feedback.is_correct, now)
            })
            .await
        {
            Ok(()) => SyncStatus::Synced,
            Err(err) => {
                warn!(user_id = %user, topic_id = topic.value(), error = %err, "progress not saved");
                SyncStatus::failed(err)
            }
        };

        let (achievements_sync, unlocked) = match self.achievements.check(user).await {
            Ok(report) => {
                let sync = match report.failed.first() {
                    Some(failure) => SyncStatus::failed(&failure.reason),
                    None => SyncStatus::Synced,
                };
                (sync, report.unlocked)
            }
            Err(err) => {
                warn!(user_id = %user, error = %err, "achievement check failed");
                (SyncStatus::failed(err), Vec::new())
            }
        };

        Ok(PracticeAnswerResult {
            feedback,
            progress_sync,
            achievements_sync,
            unlocked,
        })
    }

    async fn bump_progress(
        &self,
        user: UserId,
        topic: TopicId,
        is_correct: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let next = match self.progress.get_progress(user, topic).await? {
            Some(existing) => existing.record_answer(is_correct, at),
            None => ProgressRecord::first_answer(topic, is_correct, at),
        };
        self.progress.upsert_progress(user, &next).await
    }
}

#[cfg(test)]
mod tests {
    use prep_core::model::{
        AuthIdentity, QuestionDraft, QuestionOptions, Subject, SubjectId, Topic,
    };
    use prep_core::time::{fixed_clock, fixed_now};
    use storage::InMemoryRepository;

    use super::*;

    async fn seeded(count: usize) -> (Arc<InMemoryRepository>, PracticeLoopService) {
        let repo = Arc::new(InMemoryRepository::new());
        repo.upsert_subject(&Subject::new(SubjectId::new(1), "Maths", None, true).unwrap())
            .await
            .unwrap();
        repo.upsert_topic(&Topic::new(TopicId::new(1), SubjectId::new(1), "Algebra", None).unwrap())
            .await
            .unwrap();
        let drafts: Vec<_> = (0..count)
            .map(|i| {
                QuestionDraft {
                    topic_id: TopicId::new(1),
                    exam_type_id: None,
                    prompt: format!("q{i}"),
                    options: QuestionOptions::new("a", "b", "c", "d"),
                    correct: OptionLabel::A,
                    explanation: Some("first option".into()),
                    difficulty: None,
                }
                .validate(fixed_now())
                .unwrap()
            })
            .collect();
        repo.insert_questions(&drafts).await.unwrap();

        let clock = fixed_clock();
        let context = SessionContext::new(repo.clone());
        context
            .login(AuthIdentity {
                id: UserId::random(),
                email: "ada@example.com".into(),
                display_name: None,
                avatar_url: None,
            })
            .await
            .unwrap();
        let service = PracticeLoopService::new(
            clock,
            context,
            repo.clone(),
            repo.clone(),
            repo.clone(),
            StreakService::new(clock, repo.clone()),
            AchievementService::new(clock, repo.clone(), repo.clone(), repo.clone()),
        )
        .with_retry(RetryPolicy::once());
        (repo, service)
    }

    #[tokio::test]
    async fn loads_at_most_twenty_questions() {
        let (_repo, service) = seeded(25).await;
        let session = service.start(TopicId::new(1)).await.unwrap();
        assert_eq!(session.questions().len(), 20);
        assert_eq!(session.streak_sync(), &SyncStatus::Synced);
        assert_eq!(session.streak().map(|s| s.record.current_streak()), Some(1));
    }

    #[tokio::test]
    async fn answering_twice_is_rejected_and_progress_accumulates() {
        let (repo, service) = seeded(2).await;
        let mut session = service.start(TopicId::new(1)).await.unwrap();

        let first = service.answer(&mut session, OptionLabel::A).await.unwrap();
        assert!(first.feedback.is_correct);
        assert_eq!(first.feedback.explanation.as_deref(), Some("first option"));
        assert_eq!(first.progress_sync, SyncStatus::Synced);
        assert!(matches!(
            service.answer(&mut session, OptionLabel::B).await,
            Err(PracticeError::AlreadyAnswered)
        ));

        assert_eq!(session.advance(), PracticeStep::Next(1));
        let second = service.answer(&mut session, OptionLabel::C).await.unwrap();
        assert!(!second.feedback.is_correct);
        assert_eq!(second.feedback.correct, OptionLabel::A);

        let PracticeStep::Finished(score) = session.advance() else {
            panic!("expected the round to finish");
        };
        assert_eq!((score.correct, score.total), (1, 2));
        assert!(session.current_question().is_none());

        let stored = repo
            .get_progress(session.user(), TopicId::new(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.questions_attempted(), 2);
        assert_eq!(stored.questions_correct(), 1);
    }

    #[tokio::test]
    async fn empty_topic_and_unknown_topic() {
        let (_repo, service) = seeded(0).await;
        assert!(matches!(
            service.start(TopicId::new(1)).await,
            Err(PracticeError::NoQuestions)
        ));
        assert!(matches!(
            service.start(TopicId::new(99)).await,
            Err(PracticeError::NotFound)
        ));
    }
}
