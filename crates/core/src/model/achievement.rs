use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{AchievementId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AchievementError {
    #[error("achievement name cannot be empty")]
    EmptyName,

    #[error("unknown condition type: {0:?}")]
    UnknownCondition(String),

    #[error("accuracy threshold must be between 0 and 100, got {0}")]
    AccuracyOutOfRange(u32),
}

/// Which aggregate stat an achievement rule looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionType {
    /// Total correct answers across all topics.
    Questions,
    /// Current daily streak.
    Streak,
    /// Accuracy in percent, gated by a minimum sample size.
    Accuracy,
}

impl ConditionType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Questions => "questions",
            Self::Streak => "streak",
            Self::Accuracy => "accuracy",
        }
    }

    /// Unit shown next to a threshold.
    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            Self::Questions => "correct answers",
            Self::Streak => "days",
            Self::Accuracy => "% accuracy",
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionType {
    type Err = AchievementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "questions" => Ok(Self::Questions),
            "streak" => Ok(Self::Streak),
            "accuracy" => Ok(Self::Accuracy),
            other => Err(AchievementError::UnknownCondition(other.to_string())),
        }
    }
}

/// A badge rule authored by an administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Achievement {
    pub id: AchievementId,
    pub name: String,
    pub description: String,
    pub condition: ConditionType,
    pub threshold: u32,
}

impl Achievement {
    /// # Errors
    ///
    /// Returns `AchievementError` for a blank name or an accuracy threshold above 100.
    pub fn new(
        id: AchievementId,
        name: impl Into<String>,
        description: impl Into<String>,
        condition: ConditionType,
        threshold: u32,
    ) -> Result<Self, AchievementError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(AchievementError::EmptyName);
        }
        if condition == ConditionType::Accuracy && threshold > 100 {
            return Err(AchievementError::AccuracyOutOfRange(threshold));
        }
        Ok(Self {
            id,
            name,
            description: description.into(),
            condition,
            threshold,
        })
    }
}

/// First time a user met an achievement's threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockedAchievement {
    pub user_id: UserId,
    pub achievement_id: AchievementId,
    pub unlocked_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_type_round_trips_through_str() {
        for c in [
            ConditionType::Questions,
            ConditionType::Streak,
            ConditionType::Accuracy,
        ] {
            assert_eq!(c.as_str().parse::<ConditionType>().unwrap(), c);
        }
        assert!("speed".parse::<ConditionType>().is_err());
    }

    #[test]
    fn accuracy_threshold_is_bounded() {
        let err = Achievement::new(
            AchievementId::new(1),
            "Sharpshooter",
            "",
            ConditionType::Accuracy,
            120,
        )
        .unwrap_err();
        assert_eq!(err, AchievementError::AccuracyOutOfRange(120));
    }

    #[test]
    fn blank_name_is_rejected() {
        assert_eq!(
            Achievement::new(AchievementId::new(1), "  ", "", ConditionType::Streak, 3)
                .unwrap_err(),
            AchievementError::EmptyName
        );
    }
}
