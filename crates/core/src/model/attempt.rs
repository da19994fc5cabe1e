use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::answers::AnswerMap;
use crate::model::ids::{AttemptId, MockExamId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("score ({score}) exceeds total questions ({total})")]
    ScoreExceedsTotal { score: u32, total: u32 },
}

/// Outcome of one submitted mock exam. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptResult {
    user_id: UserId,
    mock_exam_id: MockExamId,
    score: u32,
    total_questions: u32,
    elapsed_secs: u32,
    answers: AnswerMap,
    completed_at: DateTime<Utc>,
}

impl AttemptResult {
    /// # Errors
    ///
    /// Returns `AttemptError::ScoreExceedsTotal` if `score > total_questions`.
    pub fn new(
        user_id: UserId,
        mock_exam_id: MockExamId,
        score: u32,
        total_questions: u32,
        elapsed_secs: u32,
        answers: AnswerMap,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        if score > total_questions {
            return Err(AttemptError::ScoreExceedsTotal {
                score,
                total: total_questions,
            });
        }
        Ok(Self {
            user_id,
            mock_exam_id,
            score,
            total_questions,
            elapsed_secs,
            answers,
            completed_at,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn mock_exam_id(&self) -> MockExamId {
        self.mock_exam_id
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}

/// A persisted attempt together with its storage id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAttempt {
    pub id: AttemptId,
    pub attempt: AttemptResult,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn rejects_score_above_total() {
        let err = AttemptResult::new(
            UserId::random(),
            MockExamId::new(1),
            5,
            4,
            30,
            AnswerMap::new(),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, AttemptError::ScoreExceedsTotal { score: 5, total: 4 });
    }
}
