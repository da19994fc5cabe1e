use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use prep_core::countdown::{StopReason, TimerState};
use prep_core::model::{
    AuthIdentity, MockExam, MockExamId, OptionLabel, QuestionDraft, QuestionOptions, Subject,
    SubjectId, Topic, TopicId, UserId,
};
use prep_core::time::{fixed_clock, fixed_now};
use services::{
    AppServices, ChatGateway, ExamError, RetryPolicy, SessionTimer, SubmitKind, TutorError,
};
use storage::repository::{NewMockExamRecord, Storage};
use tokio::time::{self, Instant};

struct Silent;

#[async_trait]
impl ChatGateway for Silent {
    async fn ask(&self, _message: &str) -> Result<String, TutorError> {
        Err(TutorError::NotConfigured)
    }
}

/// Storage with one 1-minute mock exam of three questions (answers A, B, C).
async fn fixture() -> (Storage, AppServices, MockExamId) {
    let storage = Storage::in_memory();
    storage
        .catalog
        .upsert_subject(&Subject::new(SubjectId::new(1), "Physics", None, true).unwrap())
        .await
        .unwrap();
    storage
        .catalog
        .upsert_topic(&Topic::new(TopicId::new(1), SubjectId::new(1), "Mechanics", None).unwrap())
        .await
        .unwrap();

    let drafts: Vec<_> = [OptionLabel::A, OptionLabel::B, OptionLabel::C]
        .into_iter()
        .enumerate()
        .map(|(i, correct)| {
            QuestionDraft {
                topic_id: TopicId::new(1),
                exam_type_id: None,
                prompt: format!("question {i}"),
                options: QuestionOptions::new("w", "x", "y", "z"),
                correct,
                explanation: None,
                difficulty: None,
            }
            .validate(fixed_now())
            .unwrap()
        })
        .collect();
    let ids = storage.questions.insert_questions(&drafts).await.unwrap();

    let exam = MockExam::new(MockExamId::new(1), "Physics Paper", None, 1, 3, fixed_now()).unwrap();
    let exam_id = storage
        .mock_exams
        .insert_mock_exam(NewMockExamRecord::from_exam(&exam))
        .await
        .unwrap();
    storage.mock_exams.set_exam_questions(exam_id, &ids).await.unwrap();

    let services = AppServices::from_storage(
        &storage,
        fixed_clock(),
        RetryPolicy::once(),
        Arc::new(Silent),
    );
    services
        .context()
        .login(AuthIdentity {
            id: UserId::random(),
            email: "candidate@example.com".into(),
            display_name: None,
            avatar_url: None,
        })
        .await
        .unwrap();
    (storage, services, exam_id)
}

async fn attempt_count(storage: &Storage, services: &AppServices) -> usize {
    let user = services.context().require_user().unwrap();
    storage
        .attempts
        .attempts_for_user(user.id, 100)
        .await
        .unwrap()
        .len()
}

#[tokio::test(start_paused = true)]
async fn one_second_timer_fires_once_then_goes_quiet() {
    let start = Instant::now();
    let mut timer = SessionTimer::start(1).unwrap();
    let mut remaining = timer.subscribe();

    assert!(timer.wait_expired().await);
    assert_eq!(start.elapsed(), Duration::from_secs(1));
    assert_eq!(timer.state(), TimerState::Stopped(StopReason::Expired));
    assert_eq!(*remaining.borrow_and_update(), 0);

    time::sleep(Duration::from_secs(5)).await;
    assert!(!remaining.has_changed().unwrap_or(false));
    assert_eq!(timer.elapsed_secs(), 1);
}

#[tokio::test(start_paused = true)]
async fn expiry_submits_automatically_exactly_once() {
    let (storage, services, exam_id) = fixture().await;
    let exams = services.exams();
    let mut running = exams.start(exam_id).await.unwrap();
    assert_eq!(running.remaining_secs(), 60);

    let first = running.current().unwrap().id;
    running.select(first, OptionLabel::A).unwrap();

    let submission = exams
        .wait_for_expiry(&mut running)
        .await
        .unwrap()
        .expect("timer should expire");
    assert_eq!(submission.kind, SubmitKind::Automatic);
    assert_eq!(submission.report.elapsed_secs, 60);
    assert_eq!((submission.report.score, submission.report.total), (1, 3));
    assert_eq!(submission.report.percent, 33);

    assert!(exams.wait_for_expiry(&mut running).await.unwrap().is_none());
    assert!(matches!(
        exams.submit(&mut running, SubmitKind::Manual).await,
        Err(ExamError::AlreadySubmitted)
    ));
    time::sleep(Duration::from_secs(120)).await;
    assert_eq!(attempt_count(&storage, &services).await, 1);
}

#[tokio::test(start_paused = true)]
async fn expiry_wait_survives_losing_a_race_with_input() {
    let (storage, services, exam_id) = fixture().await;
    let exams = services.exams();
    let mut running = exams.start(exam_id).await.unwrap();

    tokio::select! {
        _ = exams.wait_for_expiry(&mut running) => panic!("exam expired too early"),
        () = time::sleep(Duration::from_millis(100)) => {}
    }
    assert_eq!(running.timer_state(), TimerState::Running);
    assert!(!running.is_submitted());

    let first = running.current().unwrap().id;
    running.select(first, OptionLabel::A).unwrap();

    let submission = exams
        .wait_for_expiry(&mut running)
        .await
        .unwrap()
        .expect("the later wait should still see expiry");
    assert_eq!(submission.kind, SubmitKind::Automatic);
    assert_eq!(submission.report.elapsed_secs, 60);
    assert_eq!(submission.report.score, 1);
    assert_eq!(running.timer_state(), TimerState::Stopped(StopReason::Expired));

    time::sleep(Duration::from_secs(120)).await;
    assert_eq!(attempt_count(&storage, &services).await, 1);
}

#[tokio::test(start_paused = true)]
async fn manual_submit_cancels_the_countdown() {
    let (storage, services, exam_id) = fixture().await;
    let exams = services.exams();
    let mut running = exams.start(exam_id).await.unwrap();

    let ids: Vec<_> = running.questions().iter().map(|q| q.id).collect();
    running.select(ids[0], OptionLabel::A).unwrap();
    running.select(ids[1], OptionLabel::D).unwrap();
    assert_eq!(running.select(ids[1], OptionLabel::B).unwrap(), Some(OptionLabel::D));
    running.go_to(2).unwrap();
    running.select(ids[2], OptionLabel::C).unwrap();
    assert_eq!(running.progress().answered, 3);

    time::sleep(Duration::from_millis(10_500)).await;
    let submission = exams.submit(&mut running, SubmitKind::Manual).await.unwrap();
    assert_eq!(submission.kind, SubmitKind::Manual);
    assert_eq!(submission.report.elapsed_secs, 10);
    assert_eq!(submission.report.score, 3);
    assert_eq!(running.timer_state(), TimerState::Stopped(StopReason::Submitted));

    assert!(exams.wait_for_expiry(&mut running).await.unwrap().is_none());
    time::sleep(Duration::from_secs(120)).await;
    assert_eq!(running.remaining_secs(), 50);
    assert_eq!(attempt_count(&storage, &services).await, 1);
    assert!(matches!(
        running.select(ids[0], OptionLabel::B),
        Err(ExamError::AlreadySubmitted)
    ));

    let report = exams
        .attempt_report(submission.report.attempt_id)
        .await
        .unwrap();
    assert_eq!(report, submission.report);
}

#[tokio::test(start_paused = true)]
async fn dropping_a_running_exam_stops_its_ticks() {
    let (storage, services, exam_id) = fixture().await;
    let running = services.exams().start(exam_id).await.unwrap();
    let mut remaining = running.watch_remaining();

    drop(running);
    time::sleep(Duration::from_secs(90)).await;

    assert!(remaining.changed().await.is_err());
    assert_eq!(*remaining.borrow(), 60);
    assert_eq!(attempt_count(&storage, &services).await, 0);
}

#[tokio::test(start_paused = true)]
async fn navigation_and_unknown_questions() {
    let (_storage, services, exam_id) = fixture().await;
    let mut running = services.exams().start(exam_id).await.unwrap();

    assert_eq!(running.current_index(), 0);
    running.next();
    running.next();
    running.next();
    assert_eq!(running.current_index(), 2);
    running.previous();
    assert_eq!(running.current_index(), 1);
    assert!(matches!(
        running.go_to(3),
        Err(ExamError::OutOfRange { index: 3, len: 3 })
    ));
    assert!(matches!(
        running.select(prep_core::model::QuestionId::new(999), OptionLabel::A),
        Err(ExamError::UnknownQuestion(999))
    ));
    assert!(matches!(
        services.exams().start(MockExamId::new(4242)).await,
        Err(ExamError::NotFound)
    ));
}

#[tokio::test]
async fn starting_requires_login() {
    let (_storage, services, exam_id) = fixture().await;
    services.context().logout();
    assert!(matches!(
        services.exams().start(exam_id).await,
        Err(ExamError::Auth(_))
    ));
}
