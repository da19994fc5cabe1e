//! Scoring of tracked answers against a question set.

use crate::model::{AnswerMap, OptionLabel, Question, QuestionId};

/// Correctness of a single question within a scored set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionOutcome {
    pub question_id: QuestionId,
    pub selected: Option<OptionLabel>,
    pub correct: OptionLabel,
}

impl QuestionOutcome {
    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.selected == Some(self.correct)
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.selected.is_some()
    }
}

/// Result of scoring a question set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Score {
    pub correct: u32,
    pub total: u32,
    pub outcomes: Vec<QuestionOutcome>,
}

impl Score {
    /// Percentage rounded down, `0` for an empty set.
    #[must_use]
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        let pct = u64::from(self.correct) * 100 / u64::from(self.total);
        u32::try_from(pct).unwrap_or(100)
    }

    #[must_use]
    pub fn answered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_answered()).count()
    }
}

/// Score `answers` against `questions`.
///
/// Unanswered questions count as incorrect. Answers for questions outside the
/// set are ignored. Pure and deterministic.
#[must_use]
pub fn score(questions: &[Question], answers: &AnswerMap) -> Score {
    let outcomes: Vec<QuestionOutcome> = questions
        .iter()
        .map(|q| QuestionOutcome {
            question_id: q.id,
            selected: answers.get(q.id),
            correct: q.correct,
        })
        .collect();

    let correct = outcomes.iter().filter(|o| o.is_correct()).count();

    Score {
        correct: u32::try_from(correct).unwrap_or(u32::MAX),
        total: u32::try_from(questions.len()).unwrap_or(u32::MAX),
        outcomes,
    }
}
