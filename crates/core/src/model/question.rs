use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{ExamTypeId, QuestionId, TopicId};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyPrompt,

    #[error("option {0} cannot be empty")]
    EmptyOption(OptionLabel),

    #[error("invalid option label: {0:?}")]
    InvalidLabel(String),

    #[error("invalid difficulty: {0:?}")]
    InvalidDifficulty(String),
}

//
// ─── OPTION LABEL ─────────────────────────────────────────────────────────────
//

/// One of the four answer slots every question carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OptionLabel {
    A,
    B,
    C,
    D,
}

impl OptionLabel {
    pub const ALL: [OptionLabel; 4] = [Self::A, Self::B, Self::C, Self::D];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionLabel {
    type Err = QuestionError;

    /// Accepts upper or lower case, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            _ => Err(QuestionError::InvalidLabel(s.to_string())),
        }
    }
}

//
// ─── DIFFICULTY ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => Err(QuestionError::InvalidDifficulty(s.to_string())),
        }
    }
}

//
// ─── QUESTION TYPES ───────────────────────────────────────────────────────────
//

/// The four option texts, indexed by label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOptions {
    pub a: String,
    pub b: String,
    pub c: String,
    pub d: String,
}

impl QuestionOptions {
    #[must_use]
    pub fn new(
        a: impl Into<String>,
        b: impl Into<String>,
        c: impl Into<String>,
        d: impl Into<String>,
    ) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            c: c.into(),
            d: d.into(),
        }
    }

    #[must_use]
    pub fn get(&self, label: OptionLabel) -> &str {
        match label {
            OptionLabel::A => &self.a,
            OptionLabel::B => &self.b,
            OptionLabel::C => &self.c,
            OptionLabel::D => &self.d,
        }
    }

    /// Label/text pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (OptionLabel, &str)> {
        OptionLabel::ALL.into_iter().map(|label| (label, self.get(label)))
    }
}

/// Unvalidated question as authored by an administrator or read from a CSV row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub topic_id: TopicId,
    pub exam_type_id: Option<ExamTypeId>,
    pub prompt: String,
    pub options: QuestionOptions,
    pub correct: OptionLabel,
    pub explanation: Option<String>,
    pub difficulty: Option<Difficulty>,
}

impl QuestionDraft {
    /// Trim text fields and reject blanks.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyPrompt` or `QuestionError::EmptyOption` when a
    /// required text field is blank.
    pub fn validate(self, now: DateTime<Utc>) -> Result<ValidatedQuestion, QuestionError> {
        let prompt = self.prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }

        let mut texts = Vec::with_capacity(4);
        for (label, text) in self.options.iter() {
            let text = text.trim();
            if text.is_empty() {
                return Err(QuestionError::EmptyOption(label));
            }
            texts.push(text.to_string());
        }
        let [a, b, c, d]: [String; 4] = texts
            .try_into()
            .map_err(|_| QuestionError::EmptyOption(OptionLabel::D))?;

        let explanation = self
            .explanation
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());

        Ok(ValidatedQuestion {
            topic_id: self.topic_id,
            exam_type_id: self.exam_type_id,
            prompt,
            options: QuestionOptions { a, b, c, d },
            correct: self.correct,
            explanation,
            difficulty: self.difficulty,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuestion {
    pub topic_id: TopicId,
    pub exam_type_id: Option<ExamTypeId>,
    pub prompt: String,
    pub options: QuestionOptions,
    pub correct: OptionLabel,
    pub explanation: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub created_at: DateTime<Utc>,
}

impl ValidatedQuestion {
    #[must_use]
    pub fn assign_id(self, id: QuestionId) -> Question {
        Question {
            id,
            topic_id: self.topic_id,
            exam_type_id: self.exam_type_id,
            prompt: self.prompt,
            options: self.options,
            correct: self.correct,
            explanation: self.explanation,
            difficulty: self.difficulty,
            created_at: self.created_at,
        }
    }
}

/// A multiple-choice question. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: QuestionId,
    pub topic_id: TopicId,
    pub exam_type_id: Option<ExamTypeId>,
    pub prompt: String,
    pub options: QuestionOptions,
    pub correct: OptionLabel,
    pub explanation: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub created_at: DateTime<Utc>,
}

impl Question {
    #[must_use]
    pub fn is_correct(&self, selected: OptionLabel) -> bool {
        self.correct == selected
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
