use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use prep_core::model::{
    Achievement, AchievementId, AnswerMap, AttemptId, AttemptResult, ChatMessage, ChatRole,
    ConditionType, Difficulty, ExamTypeId, MockExam, MockExamId, OptionLabel, ProgressRecord,
    Question, QuestionId, QuestionOptions, StoredAttempt, StreakRecord, SubjectId, TopicId,
    TrackId, UnlockedAchievement, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

/// Numeric ids are stored as `INTEGER`, which is signed in `SQLite`.
pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn topic_id_from_i64(v: i64) -> Result<TopicId, StorageError> {
    Ok(TopicId::new(i64_to_u64("topic_id", v)?))
}

pub(crate) fn subject_id_from_i64(v: i64) -> Result<SubjectId, StorageError> {
    Ok(SubjectId::new(i64_to_u64("subject_id", v)?))
}

pub(crate) fn track_id_from_i64(v: i64) -> Result<TrackId, StorageError> {
    Ok(TrackId::new(i64_to_u64("track_id", v)?))
}

pub(crate) fn exam_type_id_from_i64(v: i64) -> Result<ExamTypeId, StorageError> {
    Ok(ExamTypeId::new(i64_to_u64("exam_type_id", v)?))
}

pub(crate) fn mock_exam_id_from_i64(v: i64) -> Result<MockExamId, StorageError> {
    Ok(MockExamId::new(i64_to_u64("mock_exam_id", v)?))
}

pub(crate) fn achievement_id_from_i64(v: i64) -> Result<AchievementId, StorageError> {
    Ok(AchievementId::new(i64_to_u64("achievement_id", v)?))
}

pub(crate) fn attempt_id_from_i64(v: i64) -> Result<AttemptId, StorageError> {
    Ok(AttemptId::new(i64_to_u64("attempt_id", v)?))
}

pub(crate) fn user_id_from_row(row: &SqliteRow, column: &str) -> Result<UserId, StorageError> {
    let raw: Uuid = row.try_get(column).map_err(ser)?;
    Ok(UserId::new(raw))
}

pub(crate) fn parse_chat_role(s: &str) -> Result<ChatRole, StorageError> {
    match s {
        "user" => Ok(ChatRole::User),
        "assistant" => Ok(ChatRole::Assistant),
        _ => Err(StorageError::Serialization(format!("invalid role: {s}"))),
    }
}

/// Persisted answers are a JSON object of question id to label. Entries with
/// an unknown label are dropped.
pub(crate) fn answers_from_json(raw: &str) -> Result<AnswerMap, StorageError> {
    let entries: BTreeMap<String, serde_json::Value> = serde_json::from_str(raw).map_err(ser)?;
    Ok(AnswerMap::from_raw(entries.into_iter().filter_map(
        |(k, v)| v.as_str().map(|label| (k, label.to_string())),
    )))
}

pub(crate) fn answers_to_json(answers: &AnswerMap) -> Result<String, StorageError> {
    serde_json::to_string(answers).map_err(ser)
}

pub(crate) fn map_question_row(row: &SqliteRow) -> Result<Question, StorageError> {
    let correct: String = row.try_get("correct_answer").map_err(ser)?;
    let difficulty: Option<String> = row.try_get("difficulty").map_err(ser)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(ser)?;

    Ok(Question {
        id: question_id_from_i64(row.try_get("id").map_err(ser)?)?,
        topic_id: topic_id_from_i64(row.try_get("topic_id").map_err(ser)?)?,
        exam_type_id: row
            .try_get::<Option<i64>, _>("exam_type_id")
            .map_err(ser)?
            .map(exam_type_id_from_i64)
            .transpose()?,
        prompt: row.try_get("question_text").map_err(ser)?,
        options: QuestionOptions::new(
            row.try_get::<String, _>("option_a").map_err(ser)?,
            row.try_get::<String, _>("option_b").map_err(ser)?,
            row.try_get::<String, _>("option_c").map_err(ser)?,
            row.try_get::<String, _>("option_d").map_err(ser)?,
        ),
        correct: correct.parse::<OptionLabel>().map_err(ser)?,
        explanation: row.try_get("explanation").map_err(ser)?,
        difficulty: difficulty
            .map(|d| d.parse::<Difficulty>().map_err(ser))
            .transpose()?,
        created_at,
    })
}

pub(crate) fn map_mock_exam_row(row: &SqliteRow) -> Result<MockExam, StorageError> {
    MockExam::new(
        mock_exam_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<Option<i64>, _>("exam_type_id")
            .map_err(ser)?
            .map(exam_type_id_from_i64)
            .transpose()?,
        i64_to_u32("duration_minutes", row.try_get("duration_minutes").map_err(ser)?)?,
        i64_to_u32("total_questions", row.try_get("total_questions").map_err(ser)?)?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_attempt_row(row: &SqliteRow) -> Result<StoredAttempt, StorageError> {
    let answers: String = row.try_get("answers").map_err(ser)?;
    let attempt = AttemptResult::new(
        user_id_from_row(row, "user_id")?,
        mock_exam_id_from_i64(row.try_get("mock_exam_id").map_err(ser)?)?,
        i64_to_u32("score", row.try_get("score").map_err(ser)?)?,
        i64_to_u32("total_questions", row.try_get("total_questions").map_err(ser)?)?,
        i64_to_u32("time_taken_seconds", row.try_get("time_taken_seconds").map_err(ser)?)?,
        answers_from_json(&answers)?,
        row.try_get("completed_at").map_err(ser)?,
    )
    .map_err(ser)?;

    Ok(StoredAttempt {
        id: attempt_id_from_i64(row.try_get("id").map_err(ser)?)?,
        attempt,
    })
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<ProgressRecord, StorageError> {
    ProgressRecord::from_persisted(
        topic_id_from_i64(row.try_get("topic_id").map_err(ser)?)?,
        i64_to_u32("questions_attempted", row.try_get("questions_attempted").map_err(ser)?)?,
        i64_to_u32("questions_correct", row.try_get("questions_correct").map_err(ser)?)?,
        row.try_get("last_practiced_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_streak_row(row: &SqliteRow) -> Result<StreakRecord, StorageError> {
    let last: NaiveDate = row.try_get("last_practice_date").map_err(ser)?;
    StreakRecord::from_persisted(
        i64_to_u32("current_streak", row.try_get("current_streak").map_err(ser)?)?,
        i64_to_u32("longest_streak", row.try_get("longest_streak").map_err(ser)?)?,
        last,
        i64_to_u32("total_practice_days", row.try_get("total_practice_days").map_err(ser)?)?,
    )
    .map_err(ser)
}

pub(crate) fn map_achievement_row(row: &SqliteRow) -> Result<Achievement, StorageError> {
    let condition: String = row.try_get("condition_type").map_err(ser)?;
    Achievement::new(
        achievement_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<String, _>("description").map_err(ser)?,
        condition.parse::<ConditionType>().map_err(ser)?,
        i64_to_u32("condition_value", row.try_get("condition_value").map_err(ser)?)?,
    )
    .map_err(ser)
}

pub(crate) fn map_unlock_row(row: &SqliteRow) -> Result<UnlockedAchievement, StorageError> {
    Ok(UnlockedAchievement {
        user_id: user_id_from_row(row, "user_id")?,
        achievement_id: achievement_id_from_i64(row.try_get("achievement_id").map_err(ser)?)?,
        unlocked_at: row.try_get("unlocked_at").map_err(ser)?,
    })
}

pub(crate) fn map_chat_row(row: &SqliteRow) -> Result<ChatMessage, StorageError> {
    let role: String = row.try_get("role").map_err(ser)?;
    Ok(ChatMessage {
        user_id: user_id_from_row(row, "user_id")?,
        role: parse_chat_role(&role)?,
        message: row.try_get("message").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}
