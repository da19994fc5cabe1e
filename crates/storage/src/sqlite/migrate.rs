use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Version 1: catalog, questions, mock exams and per-user tables.
const SCHEMA_V1: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS exam_types (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT ''
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS tracks (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        color TEXT NOT NULL CHECK (color IN ('blue', 'green', 'orange', 'purple'))
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS subjects (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        track_id INTEGER,
        is_compulsory INTEGER NOT NULL DEFAULT 0 CHECK (is_compulsory IN (0, 1)),
        FOREIGN KEY (track_id) REFERENCES tracks(id) ON DELETE SET NULL
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS topics (
        id INTEGER PRIMARY KEY,
        subject_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        FOREIGN KEY (subject_id) REFERENCES subjects(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS questions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        topic_id INTEGER NOT NULL,
        exam_type_id INTEGER,
        question_text TEXT NOT NULL,
        option_a TEXT NOT NULL,
        option_b TEXT NOT NULL,
        option_c TEXT NOT NULL,
        option_d TEXT NOT NULL,
        correct_answer TEXT NOT NULL CHECK (correct_answer IN ('A', 'B', 'C', 'D')),
        explanation TEXT,
        difficulty TEXT CHECK (difficulty IN ('easy', 'medium', 'hard')),
        created_at TEXT NOT NULL,
        FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE,
        FOREIGN KEY (exam_type_id) REFERENCES exam_types(id) ON DELETE SET NULL
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS mock_exams (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        exam_type_id INTEGER,
        duration_minutes INTEGER NOT NULL CHECK (duration_minutes >= 1),
        total_questions INTEGER NOT NULL CHECK (total_questions >= 1),
        created_at TEXT NOT NULL,
        FOREIGN KEY (exam_type_id) REFERENCES exam_types(id) ON DELETE SET NULL
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS mock_questions (
        mock_exam_id INTEGER NOT NULL,
        question_id INTEGER NOT NULL,
        question_order INTEGER NOT NULL CHECK (question_order >= 0),
        PRIMARY KEY (mock_exam_id, question_id),
        FOREIGN KEY (mock_exam_id) REFERENCES mock_exams(id) ON DELETE CASCADE,
        FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS user_mock_attempts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id BLOB NOT NULL,
        mock_exam_id INTEGER NOT NULL,
        score INTEGER NOT NULL CHECK (score >= 0),
        total_questions INTEGER NOT NULL CHECK (total_questions >= score),
        time_taken_seconds INTEGER NOT NULL CHECK (time_taken_seconds >= 0),
        answers TEXT NOT NULL,
        completed_at TEXT NOT NULL,
        FOREIGN KEY (mock_exam_id) REFERENCES mock_exams(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS user_progress (
        user_id BLOB NOT NULL,
        topic_id INTEGER NOT NULL,
        questions_attempted INTEGER NOT NULL CHECK (questions_attempted >= 0),
        questions_correct INTEGER NOT NULL
            CHECK (questions_correct >= 0 AND questions_correct <= questions_attempted),
        last_practiced_at TEXT NOT NULL,
        PRIMARY KEY (user_id, topic_id),
        FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS user_streaks (
        user_id BLOB PRIMARY KEY,
        current_streak INTEGER NOT NULL CHECK (current_streak >= 1),
        longest_streak INTEGER NOT NULL CHECK (longest_streak >= current_streak),
        last_practice_date TEXT NOT NULL,
        total_practice_days INTEGER NOT NULL CHECK (total_practice_days >= longest_streak)
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS achievements (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        condition_type TEXT NOT NULL CHECK (condition_type IN ('questions', 'streak', 'accuracy')),
        condition_value INTEGER NOT NULL CHECK (condition_value >= 0)
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS user_achievements (
        user_id BLOB NOT NULL,
        achievement_id INTEGER NOT NULL,
        unlocked_at TEXT NOT NULL,
        PRIMARY KEY (user_id, achievement_id),
        FOREIGN KEY (achievement_id) REFERENCES achievements(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS chat_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id BLOB NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
        message TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS user_profiles (
        id BLOB PRIMARY KEY,
        username TEXT,
        is_admin INTEGER NOT NULL DEFAULT 0 CHECK (is_admin IN (0, 1))
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS user_track_selection (
        user_id BLOB PRIMARY KEY,
        track_id INTEGER NOT NULL,
        exam_type_id INTEGER NOT NULL,
        FOREIGN KEY (track_id) REFERENCES tracks(id) ON DELETE CASCADE,
        FOREIGN KEY (exam_type_id) REFERENCES exam_types(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_questions_topic_id
        ON questions (topic_id, id);
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_mock_questions_order
        ON mock_questions (mock_exam_id, question_order);
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_attempts_user_completed
        ON user_mock_attempts (user_id, completed_at);
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_chat_history_user_created
        ON chat_history (user_id, created_at, id);
    ",
];

/// Applies each schema version once, tracked in `schema_migrations`.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    for (version, statements) in [(1_i64, SCHEMA_V1)] {
        if is_applied(pool, version).await? {
            continue;
        }
        let mut tx = pool.begin().await?;
        for statement in statements {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }
        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(version)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
    }
    Ok(())
}
