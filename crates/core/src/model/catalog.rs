use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{ExamTypeId, MockExamId, SubjectId, TopicId, TrackId, UserId};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("name cannot be empty")]
    EmptyName,

    #[error("mock exam duration must be at least one minute")]
    ZeroDuration,

    #[error("mock exam must contain at least one question")]
    NoQuestions,

    #[error("unknown track colour: {0:?}")]
    UnknownColor(String),
}

fn non_blank(name: impl Into<String>) -> Result<String, CatalogError> {
    let name = name.into().trim().to_string();
    if name.is_empty() {
        return Err(CatalogError::EmptyName);
    }
    Ok(name)
}

//
// ─── EXAM TYPES / TRACKS ──────────────────────────────────────────────────────
//

/// An examining body such as WAEC or JAMB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamType {
    pub id: ExamTypeId,
    pub name: String,
    pub description: String,
}

impl ExamType {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyName` for a blank name.
    pub fn new(
        id: ExamTypeId,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            id,
            name: non_blank(name)?,
            description: description.into(),
        })
    }
}

/// Colour tag for a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackColor {
    #[default]
    Blue,
    Green,
    Orange,
    Purple,
}

impl TrackColor {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Orange => "orange",
            Self::Purple => "purple",
        }
    }

    #[must_use]
    pub fn hex(self) -> &'static str {
        match self {
            Self::Blue => "#3b82f6",
            Self::Green => "#22c55e",
            Self::Orange => "#f97316",
            Self::Purple => "#a855f7",
        }
    }
}

impl FromStr for TrackColor {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blue" => Ok(Self::Blue),
            "green" => Ok(Self::Green),
            "orange" => Ok(Self::Orange),
            "purple" => Ok(Self::Purple),
            _ => Err(CatalogError::UnknownColor(s.to_string())),
        }
    }
}

/// Curriculum grouping, e.g. Science, Art or Commercial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub color: TrackColor,
}

impl Track {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyName` for a blank name.
    pub fn new(id: TrackId, name: impl Into<String>, color: TrackColor) -> Result<Self, CatalogError> {
        Ok(Self {
            id,
            name: non_blank(name)?,
            color,
        })
    }
}

//
// ─── SUBJECTS / TOPICS ────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    /// `None` for subjects shared by every track.
    pub track_id: Option<TrackId>,
    pub is_compulsory: bool,
}

impl Subject {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyName` for a blank name.
    pub fn new(
        id: SubjectId,
        name: impl Into<String>,
        track_id: Option<TrackId>,
        is_compulsory: bool,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            id,
            name: non_blank(name)?,
            track_id,
            is_compulsory,
        })
    }

    /// Compulsory subjects are visible on every track.
    #[must_use]
    pub fn visible_on(&self, track: TrackId) -> bool {
        self.is_compulsory || self.track_id == Some(track)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub id: TopicId,
    pub subject_id: SubjectId,
    pub name: String,
    pub description: Option<String>,
}

impl Topic {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyName` for a blank name.
    pub fn new(
        id: TopicId,
        subject_id: SubjectId,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            id,
            subject_id,
            name: non_blank(name)?,
            description: description.filter(|d| !d.trim().is_empty()),
        })
    }
}

//
// ─── MOCK EXAMS ───────────────────────────────────────────────────────────────
//

/// A fixed, timed question set assembled by an administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockExam {
    pub id: MockExamId,
    pub name: String,
    pub exam_type_id: Option<ExamTypeId>,
    pub duration_minutes: u32,
    pub total_questions: u32,
    pub created_at: DateTime<Utc>,
}

impl MockExam {
    /// # Errors
    ///
    /// Returns `CatalogError` for a blank name, a zero duration or zero questions.
    pub fn new(
        id: MockExamId,
        name: impl Into<String>,
        exam_type_id: Option<ExamTypeId>,
        duration_minutes: u32,
        total_questions: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CatalogError> {
        if duration_minutes == 0 {
            return Err(CatalogError::ZeroDuration);
        }
        if total_questions == 0 {
            return Err(CatalogError::NoQuestions);
        }
        Ok(Self {
            id,
            name: non_blank(name)?,
            exam_type_id,
            duration_minutes,
            total_questions,
            created_at,
        })
    }

    /// Time budget in seconds.
    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_minutes.saturating_mul(60)
    }
}

/// The track and exam body a user prepares for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackSelection {
    pub user_id: UserId,
    pub track_id: TrackId,
    pub exam_type_id: ExamTypeId,
}
