use std::sync::Arc;

use chrono::{DateTime, Utc};
use prep_core::Clock;
use prep_core::countdown::{StopReason, TimerState};
use prep_core::model::{
    AnswerMap, AttemptId, AttemptResult, MockExam, MockExamId, OptionLabel, Question, QuestionId,
    UserId,
};
use prep_core::scoring;
use storage::repository::{AttemptRepository, MockExamRepository, QuestionRepository};
use tokio::sync::watch;
use tracing::{info, warn};

use super::progress::SessionProgress;
use super::timer::SessionTimer;
use crate::context::SessionContext;
use crate::error::ExamError;
use crate::retry::RetryPolicy;

/// How a mock exam came to be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitKind {
    Manual,
    /// The countdown reached zero.
    Automatic,
}

//
// ─── REPORTS ───────────────────────────────────────────────────────────────────
//

/// One question in the post-exam review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionReview {
    pub question: Question,
    pub selected: Option<OptionLabel>,
    pub is_correct: bool,
}

/// Score sheet for a finished attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptReport {
    pub attempt_id: AttemptId,
    pub exam: MockExam,
    pub score: u32,
    pub total: u32,
    pub percent: u32,
    pub elapsed_secs: u32,
    pub completed_at: DateTime<Utc>,
    pub review: Vec<QuestionReview>,
}

impl AttemptReport {
    fn build(
        attempt_id: AttemptId,
        exam: &MockExam,
        questions: &[Question],
        attempt: &AttemptResult,
    ) -> Self {
        let score = scoring::score(questions, attempt.answers());
        let percent = score.percent();
        let review = questions
            .iter()
            .zip(&score.outcomes)
            .map(|(question, outcome)| QuestionReview {
                question: question.clone(),
                selected: outcome.selected,
                is_correct: outcome.is_correct(),
            })
            .collect();
        Self {
            attempt_id,
            exam: exam.clone(),
            score: score.correct,
            total: score.total,
            percent,
            elapsed_secs: attempt.elapsed_secs(),
            completed_at: attempt.completed_at(),
            review,
        }
    }
}

/// What `submit` hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub kind: SubmitKind,
    pub report: AttemptReport,
}

//
// ─── RUNNING EXAM ──────────────────────────────────────────────────────────────
//

struct PendingAttempt {
    kind: SubmitKind,
    attempt: AttemptResult,
    attempt_id: Option<AttemptId>,
}

/// A mock exam in progress: questions, answers and the countdown.
///
/// Dropping it cancels the timer.
pub struct RunningExam {
    user: UserId,
    exam: MockExam,
    questions: Vec<Question>,
    answers: AnswerMap,
    current: usize,
    timer: SessionTimer,
    started_at: DateTime<Utc>,
    submission: Option<PendingAttempt>,
}

impl RunningExam {
    #[must_use]
    pub fn exam(&self) -> &MockExam {
        &self.exam
    }

    #[must_use]
    pub fn user(&self) -> UserId {
        self.user
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.timer.remaining_secs()
    }

    #[must_use]
    pub fn timer_state(&self) -> TimerState {
        self.timer.state()
    }

    /// Watch the countdown tick.
    #[must_use]
    pub fn watch_remaining(&self) -> watch::Receiver<u32> {
        self.timer.subscribe()
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.submission.is_some()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.questions.len();
        let answered = self.answers.len();
        SessionProgress {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            is_complete: self.is_submitted(),
        }
    }

    /// Pick an option for a question, replacing any earlier choice.
    ///
    /// Returns the previous choice.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::AlreadySubmitted` after submission and
    /// `UnknownQuestion` for ids outside this exam.
    pub fn select(
        &mut self,
        question: QuestionId,
        label: OptionLabel,
    ) -> Result<Option<OptionLabel>, ExamError> {
        if self.is_submitted() {
            return Err(ExamError::AlreadySubmitted);
        }
        if !self.questions.iter().any(|q| q.id == question) {
            return Err(ExamError::UnknownQuestion(question.value()));
        }
        Ok(self.answers.select(question, label))
    }

    /// # Errors
    ///
    /// Returns `ExamError::OutOfRange` for an index past the last question.
    pub fn go_to(&mut self, index: usize) -> Result<&Question, ExamError> {
        let len = self.questions.len();
        if index >= len {
            return Err(ExamError::OutOfRange { index, len });
        }
        self.current = index;
        Ok(&self.questions[index])
    }

    /// Move forward, staying on the last question.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&Question> {
        if self.current + 1 < self.questions.len() {
            self.current += 1;
        }
        self.current()
    }

    /// Move back, staying on the first question.
    pub fn previous(&mut self) -> Option<&Question> {
        self.current = self.current.saturating_sub(1);
        self.current()
    }

    fn report(&self) -> Result<Submission, ExamError> {
        let pending = self.submission.as_ref().ok_or(ExamError::NotSubmitted)?;
        let attempt_id = pending.attempt_id.ok_or(ExamError::NotSubmitted)?;
        Ok(Submission {
            kind: pending.kind,
            report: AttemptReport::build(attempt_id, &self.exam, &self.questions, &pending.attempt),
        })
    }
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Loads, times, submits and reports mock exams.
#[derive(Clone)]
pub struct MockExamService {
    clock: Clock,
    context: SessionContext,
    mock_exams: Arc<dyn MockExamRepository>,
    questions: Arc<dyn QuestionRepository>,
    attempts: Arc<dyn AttemptRepository>,
    retry: RetryPolicy,
}

impl MockExamService {
    #[must_use]
    pub fn new(
        clock: Clock,
        context: SessionContext,
        mock_exams: Arc<dyn MockExamRepository>,
        questions: Arc<dyn QuestionRepository>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self {
            clock,
            context,
            mock_exams,
            questions,
            attempts,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Every mock exam, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Storage` on read failure.
    pub async fn list(&self) -> Result<Vec<MockExam>, ExamError> {
        Ok(self.mock_exams.list_mock_exams().await?)
    }

    /// Load a mock exam and start its countdown.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Auth` without a logged-in user, `NotFound` for an
    /// unknown exam, `NoQuestions` when none are assigned, or `Storage`.
    pub async fn start(&self, mock_exam_id: MockExamId) -> Result<RunningExam, ExamError> {
        let user = self.context.require_user()?;
        let (exam, questions) = self.load(mock_exam_id).await?;
        if questions.is_empty() {
            return Err(ExamError::NoQuestions);
        }

        let timer = SessionTimer::start(exam.duration_secs())?;
        info!(
            user_id = %user.id,
            mock_exam_id = mock_exam_id.value(),
            questions = questions.len(),
            duration_secs = exam.duration_secs(),
            "mock exam started"
        );

        Ok(RunningExam {
            user: user.id,
            exam,
            questions,
            answers: AnswerMap::new(),
            current: 0,
            timer,
            started_at: self.clock.now(),
            submission: None,
        })
    }

    /// Stop the clock, score the answers and persist the attempt.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::AlreadySubmitted` on a second call. When the
    /// attempt cannot be stored within the retry budget, returns `Storage`;
    /// the exam stays submitted and [`Self::finalize_attempt`] can try again.
    pub async fn submit(
        &self,
        running: &mut RunningExam,
        kind: SubmitKind,
    ) -> Result<Submission, ExamError> {
        if running.is_submitted() {
            return Err(ExamError::AlreadySubmitted);
        }
        let reason = match kind {
            SubmitKind::Manual => StopReason::Submitted,
            SubmitKind::Automatic => StopReason::Expired,
        };
        running.timer.stop(reason);

        let score = scoring::score(&running.questions, &running.answers);
        let attempt = AttemptResult::new(
            running.user,
            running.exam.id,
            score.correct,
            score.total,
            running.timer.elapsed_secs(),
            running.answers.clone(),
            self.clock.now(),
        )?;
        running.submission = Some(PendingAttempt {
            kind,
            attempt,
            attempt_id: None,
        });
        info!(
            user_id = %running.user,
            mock_exam_id = running.exam.id.value(),
            ?kind,
            score = score.correct,
            total = score.total,
            elapsed_secs = running.timer.elapsed_secs(),
            "mock exam submitted"
        );

        self.finalize_attempt(running).await
    }

    /// Persist a submitted attempt that previously failed to store.
    ///
    /// Returns the existing report when the attempt is already stored.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::NotSubmitted` before submission, or `Storage` once
    /// the retry budget is spent.
    pub async fn finalize_attempt(&self, running: &mut RunningExam) -> Result<Submission, ExamError> {
        let pending = running.submission.as_mut().ok_or(ExamError::NotSubmitted)?;
        if pending.attempt_id.is_none() {
            let attempt = &pending.attempt;
            let stored = self
                .retry
                .run("append_attempt", || self.attempts.append_attempt(attempt))
                .await;
            match stored {
                Ok(id) => pending.attempt_id = Some(id),
                Err(err) => {
                    warn!(
                        user_id = %running.user,
                        mock_exam_id = running.exam.id.value(),
                        error = %err,
                        "attempt not saved"
                    );
                    return Err(err.into());
                }
            }
        }
        running.report()
    }

    /// Wait for the countdown to run out, then submit automatically.
    ///
    /// Returns `None` if the exam was submitted or stopped first. The wait
    /// itself is cancel safe, so it can race user input in a `select!`.
    /// Once the automatic submit has begun the exam counts as submitted, and
    /// [`Self::finalize_attempt`] finishes storing it if that was cut short.
    ///
    /// # Errors
    ///
    /// Propagates failures from the automatic submit.
    pub async fn wait_for_expiry(
        &self,
        running: &mut RunningExam,
    ) -> Result<Option<Submission>, ExamError> {
        if !running.timer.wait_expired().await || running.is_submitted() {
            return Ok(None);
        }
        self.submit(running, SubmitKind::Automatic).await.map(Some)
    }

    /// Rebuild the score sheet for a stored attempt.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::NotFound` for an unknown attempt or exam.
    pub async fn attempt_report(&self, attempt_id: AttemptId) -> Result<AttemptReport, ExamError> {
        let stored = self
            .attempts
            .get_attempt(attempt_id)
            .await?
            .ok_or(ExamError::NotFound)?;
        let (exam, questions) = self.load(stored.attempt.mock_exam_id()).await?;
        Ok(AttemptReport::build(stored.id, &exam, &questions, &stored.attempt))
    }

    /// The logged-in user's attempts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Auth` without a user or `Storage` on read failure.
    pub async fn history(&self, limit: u32) -> Result<Vec<AttemptReport>, ExamError> {
        let user = self.context.require_user()?;
        let attempts = self.attempts.attempts_for_user(user.id, limit).await?;
        let mut reports = Vec::with_capacity(attempts.len());
        for stored in attempts {
            let (exam, questions) = self.load(stored.attempt.mock_exam_id()).await?;
            reports.push(AttemptReport::build(stored.id, &exam, &questions, &stored.attempt));
        }
        Ok(reports)
    }

    async fn load(&self, mock_exam_id: MockExamId) -> Result<(MockExam, Vec<Question>), ExamError> {
        let exam = self
            .mock_exams
            .get_mock_exam(mock_exam_id)
            .await?
            .ok_or(ExamError::NotFound)?;
        let ids = self.mock_exams.exam_question_ids(mock_exam_id).await?;
        let questions = self.questions.get_questions(&ids).await?;
        Ok((exam, questions))
    }
}
