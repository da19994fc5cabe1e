use chrono::{Duration, NaiveDate};
use prep_core::model::{
    AnswerMap, AttemptResult, ChatMessage, ChatRole, ConditionType, ExamType, ExamTypeId,
    MockExam, MockExamId, OptionLabel, ProgressRecord, QuestionDraft, QuestionOptions,
    StreakRecord, Subject, SubjectId, Topic, TopicId, Track, TrackColor, TrackId,
    TrackSelection, UnlockedAchievement, UserId, UserProfile,
};
use prep_core::time::fixed_now;
use storage::repository::{
    AchievementRepository, AttemptRepository, CatalogRepository, ChatHistoryRepository,
    MockExamRepository, NewAchievementRecord, NewMockExamRecord, ProfileRepository,
    ProgressRepository, QuestionRepository, StorageError, StreakRepository,
};
use storage::sqlite::SqliteRepository;
use uuid::Uuid;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn user(n: u128) -> UserId {
    UserId::new(Uuid::from_u128(n))
}

async fn seed_catalog(repo: &SqliteRepository) {
    repo.upsert_exam_type(&ExamType::new(ExamTypeId::new(1), "WAEC", "").unwrap())
        .await
        .unwrap();
    repo.upsert_track(&Track::new(TrackId::new(1), "Science", TrackColor::Green).unwrap())
        .await
        .unwrap();
    repo.upsert_track(&Track::new(TrackId::new(2), "Art", TrackColor::Purple).unwrap())
        .await
        .unwrap();
    for subject in [
        Subject::new(SubjectId::new(1), "English", None, true).unwrap(),
        Subject::new(SubjectId::new(2), "Physics", Some(TrackId::new(1)), false).unwrap(),
        Subject::new(SubjectId::new(3), "Literature", Some(TrackId::new(2)), false).unwrap(),
    ] {
        repo.upsert_subject(&subject).await.unwrap();
    }
    repo.upsert_topic(&Topic::new(TopicId::new(1), SubjectId::new(1), "Grammar", None).unwrap())
        .await
        .unwrap();
    repo.upsert_topic(&Topic::new(TopicId::new(2), SubjectId::new(2), "Mechanics", None).unwrap())
        .await
        .unwrap();
}

fn question(topic: u64, prompt: &str, correct: OptionLabel) -> QuestionDraft {
    QuestionDraft {
        topic_id: TopicId::new(topic),
        exam_type_id: Some(ExamTypeId::new(1)),
        prompt: prompt.to_string(),
        options: QuestionOptions::new("a", "b", "c", "d"),
        correct,
        explanation: Some("because".into()),
        difficulty: None,
    }
}

#[tokio::test]
async fn catalog_filters_subjects_by_track() {
    let repo = connect("memdb_catalog").await;
    seed_catalog(&repo).await;

    let science: Vec<_> = repo
        .subjects_for_track(TrackId::new(1))
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(science, vec!["English", "Physics"]);

    let topics = repo
        .topics_for_subjects(&[SubjectId::new(1), SubjectId::new(2)])
        .await
        .unwrap();
    assert_eq!(topics.len(), 2);

    let track = repo.get_track(TrackId::new(1)).await.unwrap().unwrap();
    assert_eq!(track.color, TrackColor::Green);
}

#[tokio::test]
async fn questions_round_trip_and_mock_order_is_kept() {
    let repo = connect("memdb_questions").await;
    seed_catalog(&repo).await;

    let validated: Vec<_> = [
        question(1, "first", OptionLabel::A),
        question(1, "second", OptionLabel::B),
        question(2, "third", OptionLabel::D),
    ]
    .into_iter()
    .map(|d| d.validate(fixed_now()).unwrap())
    .collect();
    let ids = repo.insert_questions(&validated).await.unwrap();
    assert_eq!(ids.len(), 3);

    let topic_one = repo.questions_for_topic(TopicId::new(1), 20).await.unwrap();
    assert_eq!(topic_one.len(), 2);
    assert_eq!(topic_one[1].correct, OptionLabel::B);
    assert_eq!(topic_one[0].explanation.as_deref(), Some("because"));

    let exam = MockExam::new(MockExamId::new(1), "Paper 1", None, 1, 3, fixed_now()).unwrap();
    let exam_id = repo
        .insert_mock_exam(NewMockExamRecord::from_exam(&exam))
        .await
        .unwrap();
    let order = vec![ids[2], ids[0], ids[1]];
    repo.set_exam_questions(exam_id, &order).await.unwrap();
    assert_eq!(repo.exam_question_ids(exam_id).await.unwrap(), order);

    let fetched = repo.get_questions(&order).await.unwrap();
    let prompts: Vec<_> = fetched.iter().map(|q| q.prompt.as_str()).collect();
    assert_eq!(prompts, vec!["third", "first", "second"]);

    repo.delete_question(ids[0]).await.unwrap();
    assert_eq!(
        repo.exam_question_ids(exam_id).await.unwrap(),
        vec![ids[2], ids[1]]
    );
    assert!(matches!(
        repo.delete_question(ids[0]).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn attempt_answers_survive_storage() {
    let repo = connect("memdb_attempts").await;
    let exam = MockExam::new(MockExamId::new(1), "Paper 1", None, 30, 2, fixed_now()).unwrap();
    let exam_id = repo
        .insert_mock_exam(NewMockExamRecord::from_exam(&exam))
        .await
        .unwrap();

    let answers = AnswerMap::from_raw([("1", "A"), ("2", "C")]);
    let attempt =
        AttemptResult::new(user(7), exam_id, 1, 2, 95, answers.clone(), fixed_now()).unwrap();
    let id = repo.append_attempt(&attempt).await.unwrap();

    let stored = repo.get_attempt(id).await.unwrap().unwrap();
    assert_eq!(stored.attempt, attempt);
    assert_eq!(stored.attempt.answers(), &answers);

    let listed = repo.attempts_for_user(user(7), 10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(repo.attempts_for_user(user(8), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn progress_and_streak_upserts_replace_rows() {
    let repo = connect("memdb_progress").await;
    seed_catalog(&repo).await;

    let first = ProgressRecord::first_answer(TopicId::new(1), true, fixed_now());
    repo.upsert_progress(user(1), &first).await.unwrap();
    let second = first.record_answer(false, fixed_now() + Duration::minutes(1));
    repo.upsert_progress(user(1), &second).await.unwrap();

    let stored = repo
        .get_progress(user(1), TopicId::new(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.questions_attempted(), 2);
    assert_eq!(stored.questions_correct(), 1);
    assert_eq!(repo.progress_for_user(user(1)).await.unwrap().len(), 1);

    let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    assert!(repo.get_streak(user(1)).await.unwrap().is_none());
    let streak = StreakRecord::from_persisted(5, 7, day, 20).unwrap();
    repo.put_streak(user(1), &streak).await.unwrap();
    assert_eq!(repo.get_streak(user(1)).await.unwrap(), Some(streak));
}

#[tokio::test]
async fn unlocks_are_unique_per_user_and_achievement() {
    let repo = connect("memdb_achievements").await;
    let id = repo
        .insert_achievement(NewAchievementRecord {
            name: "Sharp Shooter".into(),
            description: "80% accuracy".into(),
            condition: ConditionType::Accuracy,
            threshold: 80,
        })
        .await
        .unwrap();

    let unlock = UnlockedAchievement {
        user_id: user(1),
        achievement_id: id,
        unlocked_at: fixed_now(),
    };
    assert!(repo.record_unlock(&unlock).await.unwrap());
    assert!(!repo.record_unlock(&unlock).await.unwrap());

    let ids = repo.unlocked_ids(user(1)).await.unwrap();
    assert!(ids.contains(&id));
    assert_eq!(repo.unlocks_for_user(user(1)).await.unwrap().len(), 1);
    assert_eq!(repo.list_achievements().await.unwrap()[0].condition, ConditionType::Accuracy);
}

#[tokio::test]
async fn chat_history_window_and_clear() {
    let repo = connect("memdb_chat").await;
    for i in 0..60 {
        let role = if i % 2 == 0 { ChatRole::User } else { ChatRole::Assistant };
        repo.append_message(&ChatMessage {
            user_id: user(1),
            role,
            message: format!("m{i}"),
            created_at: fixed_now() + Duration::seconds(i),
        })
        .await
        .unwrap();
    }
    let recent = repo.recent_messages(user(1), 50).await.unwrap();
    assert_eq!(recent.len(), 50);
    assert_eq!(recent[0].message, "m10");
    assert_eq!(recent[49].message, "m59");
    assert_eq!(recent[49].role, ChatRole::Assistant);

    assert_eq!(repo.clear_messages(user(1)).await.unwrap(), 60);
    assert!(repo.recent_messages(user(1), 50).await.unwrap().is_empty());
}

#[tokio::test]
async fn leaderboard_and_selection() {
    let repo = connect("memdb_leaderboard").await;
    seed_catalog(&repo).await;

    for (u, attempted, correct) in [(1_u128, 40, 30), (2, 10, 9), (3, 35, 30)] {
        let record =
            ProgressRecord::from_persisted(TopicId::new(1), attempted, correct, fixed_now())
                .unwrap();
        repo.upsert_progress(user(u), &record).await.unwrap();
    }
    repo.upsert_profile(&UserProfile {
        id: user(3),
        username: Some("tolu".into()),
        is_admin: false,
    })
    .await
    .unwrap();

    let board = repo.leaderboard(50).await.unwrap();
    let ranked: Vec<_> = board.iter().map(|e| (e.rank, e.user_id)).collect();
    assert_eq!(ranked, vec![(1, user(3)), (2, user(1)), (3, user(2))]);
    assert_eq!(board[0].username, "tolu");
    assert_eq!(board[0].total_attempted, 35);

    let selection = TrackSelection {
        user_id: user(1),
        track_id: TrackId::new(2),
        exam_type_id: ExamTypeId::new(1),
    };
    repo.set_track_selection(&selection).await.unwrap();
    assert_eq!(
        repo.get_track_selection(user(1)).await.unwrap(),
        Some(selection)
    );
    let profile = repo.get_profile(user(3)).await.unwrap().unwrap();
    assert_eq!(profile.username.as_deref(), Some("tolu"));
}
