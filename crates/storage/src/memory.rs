//! In-memory adapter for tests and prototyping.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use prep_core::model::{
    Achievement, AchievementId, AttemptId, AttemptResult, ChatMessage, ExamType, ExamTypeId,
    LeaderboardEntry, MockExam, MockExamId, ProgressRecord, Question, QuestionId, StoredAttempt,
    StreakRecord, Subject, SubjectId, Topic, TopicId, Track, TrackId, TrackSelection,
    UnlockedAchievement, UserId, UserProfile, ValidatedQuestion,
};

use crate::repository::{
    ANONYMOUS_USERNAME, AchievementRepository, AttemptRepository, CatalogRepository,
    ChatHistoryRepository, MockExamRepository, NewAchievementRecord, NewMockExamRecord,
    ProfileRepository, ProgressRepository, QuestionRepository, StorageError, StreakRepository,
};

#[derive(Default)]
struct State {
    exam_types: BTreeMap<ExamTypeId, ExamType>,
    tracks: BTreeMap<TrackId, Track>,
    subjects: BTreeMap<SubjectId, Subject>,
    topics: BTreeMap<TopicId, Topic>,
    questions: BTreeMap<QuestionId, Question>,
    mock_exams: BTreeMap<MockExamId, MockExam>,
    exam_questions: HashMap<MockExamId, Vec<QuestionId>>,
    attempts: BTreeMap<AttemptId, AttemptResult>,
    progress: BTreeMap<(UserId, TopicId), ProgressRecord>,
    streaks: HashMap<UserId, StreakRecord>,
    achievements: BTreeMap<AchievementId, Achievement>,
    unlocks: HashMap<(UserId, AchievementId), UnlockedAchievement>,
    chat: Vec<ChatMessage>,
    profiles: HashMap<UserId, UserProfile>,
    selections: HashMap<UserId, TrackSelection>,
    next_id: u64,
}

impl State {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<State>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn to_limit(limit: u32) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn upsert_exam_type(&self, exam_type: &ExamType) -> Result<(), StorageError> {
        self.lock()?
            .exam_types
            .insert(exam_type.id, exam_type.clone());
        Ok(())
    }

    async fn list_exam_types(&self) -> Result<Vec<ExamType>, StorageError> {
        Ok(self.lock()?.exam_types.values().cloned().collect())
    }

    async fn upsert_track(&self, track: &Track) -> Result<(), StorageError> {
        self.lock()?.tracks.insert(track.id, track.clone());
        Ok(())
    }

    async fn get_track(&self, id: TrackId) -> Result<Option<Track>, StorageError> {
        Ok(self.lock()?.tracks.get(&id).cloned())
    }

    async fn list_tracks(&self) -> Result<Vec<Track>, StorageError> {
        Ok(self.lock()?.tracks.values().cloned().collect())
    }

    async fn upsert_subject(&self, subject: &Subject) -> Result<(), StorageError> {
        self.lock()?.subjects.insert(subject.id, subject.clone());
        Ok(())
    }

    async fn subjects_for_track(&self, track: TrackId) -> Result<Vec<Subject>, StorageError> {
        Ok(self
            .lock()?
            .subjects
            .values()
            .filter(|s| s.visible_on(track))
            .cloned()
            .collect())
    }

    async fn upsert_topic(&self, topic: &Topic) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.subjects.contains_key(&topic.subject_id) {
            return Err(StorageError::NotFound);
        }
        guard.topics.insert(topic.id, topic.clone());
        Ok(())
    }

    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError> {
        Ok(self.lock()?.topics.get(&id).cloned())
    }

    async fn topics_for_subjects(&self, subjects: &[SubjectId]) -> Result<Vec<Topic>, StorageError> {
        Ok(self
            .lock()?
            .topics
            .values()
            .filter(|t| subjects.contains(&t.subject_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn insert_questions(
        &self,
        questions: &[ValidatedQuestion],
    ) -> Result<Vec<QuestionId>, StorageError> {
        let mut guard = self.lock()?;
        if questions
            .iter()
            .any(|q| !guard.topics.contains_key(&q.topic_id))
        {
            return Err(StorageError::NotFound);
        }
        let mut ids = Vec::with_capacity(questions.len());
        for question in questions {
            let id = QuestionId::new(guard.allocate_id());
            guard
                .questions
                .insert(id, question.clone().assign_id(id));
            ids.push(id);
        }
        Ok(ids)
    }

    async fn questions_for_topic(
        &self,
        topic: TopicId,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError> {
        Ok(self
            .lock()?
            .questions
            .values()
            .filter(|q| q.topic_id == topic)
            .take(to_limit(limit))
            .cloned()
            .collect())
    }

    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        let guard = self.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| guard.questions.get(id).cloned())
            .collect())
    }

    async fn recent_questions(
        &self,
        topic: Option<TopicId>,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self.lock()?;
        let mut found: Vec<Question> = guard
            .questions
            .values()
            .filter(|q| topic.is_none_or(|t| q.topic_id == t))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        found.truncate(to_limit(limit));
        Ok(found)
    }

    async fn delete_question(&self, id: QuestionId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.questions.remove(&id).ok_or(StorageError::NotFound)?;
        for list in guard.exam_questions.values_mut() {
            list.retain(|q| *q != id);
        }
        Ok(())
    }
}

#[async_trait]
impl MockExamRepository for InMemoryRepository {
    async fn insert_mock_exam(&self, exam: NewMockExamRecord) -> Result<MockExamId, StorageError> {
        let mut guard = self.lock()?;
        let id = MockExamId::new(guard.allocate_id());
        let stored = MockExam::new(
            id,
            exam.name,
            exam.exam_type_id,
            exam.duration_minutes,
            exam.total_questions,
            exam.created_at,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.mock_exams.insert(id, stored);
        Ok(id)
    }

    async fn get_mock_exam(&self, id: MockExamId) -> Result<Option<MockExam>, StorageError> {
        Ok(self.lock()?.mock_exams.get(&id).cloned())
    }

    async fn list_mock_exams(&self) -> Result<Vec<MockExam>, StorageError> {
        let mut exams: Vec<MockExam> = self.lock()?.mock_exams.values().cloned().collect();
        exams.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(exams)
    }

    async fn set_exam_questions(
        &self,
        exam: MockExamId,
        questions: &[QuestionId],
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.mock_exams.contains_key(&exam) {
            return Err(StorageError::NotFound);
        }
        if questions.iter().any(|q| !guard.questions.contains_key(q)) {
            return Err(StorageError::NotFound);
        }
        let mut ordered: Vec<QuestionId> = Vec::with_capacity(questions.len());
        for q in questions {
            if ordered.contains(q) {
                return Err(StorageError::Conflict);
            }
            ordered.push(*q);
        }
        guard.exam_questions.insert(exam, ordered);
        Ok(())
    }

    async fn exam_question_ids(&self, exam: MockExamId) -> Result<Vec<QuestionId>, StorageError> {
        Ok(self
            .lock()?
            .exam_questions
            .get(&exam)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn append_attempt(&self, attempt: &AttemptResult) -> Result<AttemptId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.mock_exams.contains_key(&attempt.mock_exam_id()) {
            return Err(StorageError::NotFound);
        }
        let id = AttemptId::new(guard.allocate_id());
        guard.attempts.insert(id, attempt.clone());
        Ok(id)
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<Option<StoredAttempt>, StorageError> {
        Ok(self.lock()?.attempts.get(&id).map(|attempt| StoredAttempt {
            id,
            attempt: attempt.clone(),
        }))
    }

    async fn attempts_for_user(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<StoredAttempt>, StorageError> {
        let guard = self.lock()?;
        let mut found: Vec<StoredAttempt> = guard
            .attempts
            .iter()
            .filter(|(_, a)| a.user_id() == user)
            .map(|(id, a)| StoredAttempt {
                id: *id,
                attempt: a.clone(),
            })
            .collect();
        found.sort_by(|a, b| {
            b.attempt
                .completed_at()
                .cmp(&a.attempt.completed_at())
                .then(b.id.cmp(&a.id))
        });
        found.truncate(to_limit(limit));
        Ok(found)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        user: UserId,
        topic: TopicId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        Ok(self.lock()?.progress.get(&(user, topic)).cloned())
    }

    async fn upsert_progress(
        &self,
        user: UserId,
        record: &ProgressRecord,
    ) -> Result<(), StorageError> {
        self.lock()?
            .progress
            .insert((user, record.topic_id()), record.clone());
        Ok(())
    }

    async fn progress_for_user(&self, user: UserId) -> Result<Vec<ProgressRecord>, StorageError> {
        Ok(self
            .lock()?
            .progress
            .iter()
            .filter(|((owner, _), _)| *owner == user)
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[async_trait]
impl StreakRepository for InMemoryRepository {
    async fn get_streak(&self, user: UserId) -> Result<Option<StreakRecord>, StorageError> {
        Ok(self.lock()?.streaks.get(&user).copied())
    }

    async fn put_streak(&self, user: UserId, record: &StreakRecord) -> Result<(), StorageError> {
        self.lock()?.streaks.insert(user, *record);
        Ok(())
    }
}

#[async_trait]
impl AchievementRepository for InMemoryRepository {
    async fn insert_achievement(
        &self,
        achievement: NewAchievementRecord,
    ) -> Result<AchievementId, StorageError> {
        let mut guard = self.lock()?;
        let id = AchievementId::new(guard.allocate_id());
        let stored = Achievement::new(
            id,
            achievement.name,
            achievement.description,
            achievement.condition,
            achievement.threshold,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.achievements.insert(id, stored);
        Ok(id)
    }

    async fn list_achievements(&self) -> Result<Vec<Achievement>, StorageError> {
        let mut catalog: Vec<Achievement> =
            self.lock()?.achievements.values().cloned().collect();
        catalog.sort_by_key(|a| (a.threshold, a.id));
        Ok(catalog)
    }

    async fn unlocked_ids(&self, user: UserId) -> Result<HashSet<AchievementId>, StorageError> {
        Ok(self
            .lock()?
            .unlocks
            .keys()
            .filter(|(owner, _)| *owner == user)
            .map(|(_, id)| *id)
            .collect())
    }

    async fn record_unlock(&self, unlock: &UnlockedAchievement) -> Result<bool, StorageError> {
        let mut guard = self.lock()?;
        if !guard.achievements.contains_key(&unlock.achievement_id) {
            return Err(StorageError::NotFound);
        }
        let key = (unlock.user_id, unlock.achievement_id);
        if guard.unlocks.contains_key(&key) {
            return Ok(false);
        }
        guard.unlocks.insert(key, unlock.clone());
        Ok(true)
    }

    async fn unlocks_for_user(
        &self,
        user: UserId,
    ) -> Result<Vec<UnlockedAchievement>, StorageError> {
        let mut found: Vec<UnlockedAchievement> = self
            .lock()?
            .unlocks
            .values()
            .filter(|u| u.user_id == user)
            .cloned()
            .collect();
        found.sort_by_key(|u| (u.unlocked_at, u.achievement_id));
        Ok(found)
    }
}

#[async_trait]
impl ChatHistoryRepository for InMemoryRepository {
    async fn append_message(&self, message: &ChatMessage) -> Result<(), StorageError> {
        self.lock()?.chat.push(message.clone());
        Ok(())
    }

    async fn recent_messages(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, StorageError> {
        let guard = self.lock()?;
        // insertion order breaks ties between equal timestamps
        let mut mine: Vec<&ChatMessage> = guard.chat.iter().filter(|m| m.user_id == user).collect();
        mine.sort_by_key(|m| m.created_at);
        let skip = mine.len().saturating_sub(to_limit(limit));
        Ok(mine.into_iter().skip(skip).cloned().collect())
    }

    async fn clear_messages(&self, user: UserId) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        let before = guard.chat.len();
        guard.chat.retain(|m| m.user_id != user);
        Ok(u64::try_from(before - guard.chat.len()).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), StorageError> {
        self.lock()?.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn get_profile(&self, user: UserId) -> Result<Option<UserProfile>, StorageError> {
        Ok(self.lock()?.profiles.get(&user).cloned())
    }

    async fn set_track_selection(&self, selection: &TrackSelection) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.tracks.contains_key(&selection.track_id)
            || !guard.exam_types.contains_key(&selection.exam_type_id)
        {
            return Err(StorageError::NotFound);
        }
        guard.selections.insert(selection.user_id, *selection);
        Ok(())
    }

    async fn get_track_selection(
        &self,
        user: UserId,
    ) -> Result<Option<TrackSelection>, StorageError> {
        Ok(self.lock()?.selections.get(&user).copied())
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let guard = self.lock()?;
        let mut totals: BTreeMap<UserId, (u32, u32)> = BTreeMap::new();
        for ((user, _), record) in &guard.progress {
            let entry = totals.entry(*user).or_default();
            entry.0 = entry.0.saturating_add(record.questions_correct());
            entry.1 = entry.1.saturating_add(record.questions_attempted());
        }

        let mut rows: Vec<(UserId, u32, u32)> = totals
            .into_iter()
            .map(|(user, (correct, attempted))| (user, correct, attempted))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)).then(a.0.cmp(&b.0)));

        Ok(rows
            .into_iter()
            .take(to_limit(limit))
            .zip(1_u32..)
            .map(|((user_id, total_correct, total_attempted), rank)| LeaderboardEntry {
                rank,
                user_id,
                username: guard
                    .profiles
                    .get(&user_id)
                    .and_then(|p| p.username.clone())
                    .unwrap_or_else(|| ANONYMOUS_USERNAME.to_string()),
                total_correct,
                total_attempted,
            })
            .collect())
    }
}
