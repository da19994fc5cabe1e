use std::sync::Arc;

use prep_core::Clock;
use prep_core::import::{self, SkippedRow};
use prep_core::model::{
    Achievement, AchievementId, ConditionType, ExamTypeId, MockExam, MockExamId, Question,
    QuestionDraft, QuestionId, TopicId,
};
use storage::repository::{
    AchievementRepository, CatalogRepository, MockExamRepository, NewAchievementRecord,
    NewMockExamRecord, QuestionRepository, StorageError,
};
use tracing::{info, warn};

use crate::context::SessionContext;
use crate::error::{AdminError, ImportError};

/// Outcome of a CSV import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: Vec<QuestionId>,
    pub skipped: Vec<SkippedRow>,
}

fn not_found(err: StorageError) -> AdminError {
    match err {
        StorageError::NotFound => AdminError::NotFound,
        other => AdminError::Storage(other),
    }
}

/// Content authoring; every call requires an admin in the session.
#[derive(Clone)]
pub struct AdminService {
    clock: Clock,
    context: SessionContext,
    catalog: Arc<dyn CatalogRepository>,
    questions: Arc<dyn QuestionRepository>,
    mock_exams: Arc<dyn MockExamRepository>,
    achievements: Arc<dyn AchievementRepository>,
}

impl AdminService {
    #[must_use]
    pub fn new(
        clock: Clock,
        context: SessionContext,
        catalog: Arc<dyn CatalogRepository>,
        questions: Arc<dyn QuestionRepository>,
        mock_exams: Arc<dyn MockExamRepository>,
        achievements: Arc<dyn AchievementRepository>,
    ) -> Self {
        Self {
            clock,
            context,
            catalog,
            questions,
            mock_exams,
            achievements,
        }
    }

    /// # Errors
    ///
    /// Returns `AdminError::Question` for blank text, `NotFound` for an
    /// unknown topic, `Auth`, or `Storage`.
    pub async fn add_question(&self, draft: QuestionDraft) -> Result<Question, AdminError> {
        self.context.require_admin()?;
        let validated = draft.validate(self.clock.now())?;
        let ids = self
            .questions
            .insert_questions(std::slice::from_ref(&validated))
            .await
            .map_err(not_found)?;
        let id = ids.first().copied().ok_or(AdminError::NotFound)?;
        info!(question_id = id.value(), topic_id = validated.topic_id.value(), "question added");
        Ok(validated.assign_id(id))
    }

    /// # Errors
    ///
    /// Returns `AdminError::NotFound` when the question does not exist.
    pub async fn delete_question(&self, id: QuestionId) -> Result<(), AdminError> {
        self.context.require_admin()?;
        self.questions.delete_question(id).await.map_err(not_found)?;
        info!(question_id = id.value(), "question deleted");
        Ok(())
    }

    /// Newest questions first, optionally for one topic.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Auth` or `Storage`.
    pub async fn recent_questions(
        &self,
        topic: Option<TopicId>,
        limit: u32,
    ) -> Result<Vec<Question>, AdminError> {
        self.context.require_admin()?;
        Ok(self.questions.recent_questions(topic, limit).await?)
    }

    /// Import CSV rows as questions of `topic_id`.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::NotFound` for an unknown topic and
    /// `ImportError::NoValidRows` when no row survives parsing.
    pub async fn import_csv(&self, topic_id: TopicId, text: &str) -> Result<ImportReport, AdminError> {
        self.context.require_admin()?;
        self.catalog
            .get_topic(topic_id)
            .await?
            .ok_or(AdminError::NotFound)?;

        let batch = import::parse_questions_csv(text, topic_id);
        for row in &batch.skipped {
            warn!(line = row.line, reason = ?row.reason, "csv row skipped");
        }
        if batch.drafts.is_empty() {
            return Err(ImportError::NoValidRows {
                skipped: batch.skipped.len(),
            }
            .into());
        }

        let now = self.clock.now();
        let validated = batch
            .drafts
            .into_iter()
            .map(|draft| draft.validate(now))
            .collect::<Result<Vec<_>, _>>()?;
        let inserted = self
            .questions
            .insert_questions(&validated)
            .await
            .map_err(not_found)?;
        info!(
            topic_id = topic_id.value(),
            inserted = inserted.len(),
            skipped = batch.skipped.len(),
            "csv import finished"
        );
        Ok(ImportReport {
            inserted,
            skipped: batch.skipped,
        })
    }

    /// # Errors
    ///
    /// Returns `AdminError::Catalog` for a blank name or zero duration/size.
    pub async fn create_mock_exam(
        &self,
        name: &str,
        exam_type_id: Option<ExamTypeId>,
        duration_minutes: u32,
        total_questions: u32,
    ) -> Result<MockExam, AdminError> {
        self.context.require_admin()?;
        let draft = MockExam::new(
            MockExamId::new(0),
            name,
            exam_type_id,
            duration_minutes,
            total_questions,
            self.clock.now(),
        )?;
        let id = self
            .mock_exams
            .insert_mock_exam(NewMockExamRecord::from_exam(&draft))
            .await?;
        info!(mock_exam_id = id.value(), name = %draft.name, "mock exam created");
        Ok(MockExam { id, ..draft })
    }

    /// Replace the exam's question list, keeping the given order.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::NotFound` for an unknown exam or question and
    /// `Storage(Conflict)` for duplicates.
    pub async fn assign_questions(
        &self,
        mock_exam_id: MockExamId,
        questions: &[QuestionId],
    ) -> Result<(), AdminError> {
        self.context.require_admin()?;
        self.mock_exams
            .set_exam_questions(mock_exam_id, questions)
            .await
            .map_err(not_found)?;
        info!(
            mock_exam_id = mock_exam_id.value(),
            questions = questions.len(),
            "mock exam questions assigned"
        );
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `AdminError::Achievement` for a blank name or invalid threshold.
    pub async fn create_achievement(
        &self,
        name: &str,
        description: &str,
        condition: ConditionType,
        threshold: u32,
    ) -> Result<Achievement, AdminError> {
        self.context.require_admin()?;
        let draft = Achievement::new(AchievementId::new(0), name, description, condition, threshold)?;
        let id = self
            .achievements
            .insert_achievement(NewAchievementRecord::from_achievement(&draft))
            .await?;
        info!(achievement_id = id.value(), name = %draft.name, %condition, threshold, "achievement created");
        Ok(Achievement { id, ..draft })
    }
}

#[cfg(test)]
mod tests {
    use prep_core::import::RowRejection;
    use prep_core::model::{
        AuthIdentity, OptionLabel, QuestionOptions, Subject, SubjectId, Topic, UserId, UserProfile,
    };
    use prep_core::time::fixed_clock;
    use storage::InMemoryRepository;
    use storage::repository::ProfileRepository;

    use super::*;
    use crate::error::AuthError;

    async fn service(admin: bool) -> AdminService {
        let repo = Arc::new(InMemoryRepository::new());
        repo.upsert_subject(&Subject::new(SubjectId::new(1), "Maths", None, true).unwrap())
            .await
            .unwrap();
        repo.upsert_topic(&Topic::new(TopicId::new(1), SubjectId::new(1), "Algebra", None).unwrap())
            .await
            .unwrap();

        let id = UserId::random();
        repo.upsert_profile(&UserProfile {
            id,
            username: Some("boss".into()),
            is_admin: admin,
        })
        .await
        .unwrap();
        let context = SessionContext::new(repo.clone());
        context
            .login(AuthIdentity {
                id,
                email: "boss@example.com".into(),
                display_name: None,
                avatar_url: None,
            })
            .await
            .unwrap();
        AdminService::new(
            fixed_clock(),
            context,
            repo.clone(),
            repo.clone(),
            repo.clone(),
            repo,
        )
    }

    fn draft(prompt: &str) -> QuestionDraft {
        QuestionDraft {
            topic_id: TopicId::new(1),
            exam_type_id: None,
            prompt: prompt.into(),
            options: QuestionOptions::new("1", "2", "3", "4"),
            correct: OptionLabel::B,
            explanation: None,
            difficulty: None,
        }
    }

    #[tokio::test]
    async fn non_admin_is_turned_away() {
        let admin = service(false).await;
        assert!(matches!(
            admin.add_question(draft("1 + 1?")).await,
            Err(AdminError::Auth(AuthError::Forbidden))
        ));
    }

    #[tokio::test]
    async fn add_list_and_delete_question() {
        let admin = service(true).await;
        let question = admin.add_question(draft("1 + 1?")).await.unwrap();
        assert_eq!(admin.recent_questions(None, 10).await.unwrap(), vec![question.clone()]);

        admin.delete_question(question.id).await.unwrap();
        assert!(matches!(
            admin.delete_question(question.id).await,
            Err(AdminError::NotFound)
        ));
        assert!(matches!(
            admin.add_question(draft("   ")).await,
            Err(AdminError::Question(_))
        ));
    }

    #[tokio::test]
    async fn csv_import_skips_bad_rows() {
        let admin = service(true).await;
        let csv = "\
question_text,option_a,option_b,option_c,option_d,correct_answer,explanation,difficulty,exam_type_id
What is 2+2?,3,4,5,6,b,Basic sum,easy,
Broken row,only,three
Capital of Nigeria?,Lagos,Abuja,Kano,Ibadan,E,,,
Largest planet?,Mars,Earth,Jupiter,Venus,C,,,
";
        let report = admin.import_csv(TopicId::new(1), csv).await.unwrap();
        assert_eq!(report.inserted.len(), 2);
        assert_eq!(report.skipped.len(), 2);
        assert!(matches!(report.skipped[1].reason, RowRejection::InvalidAnswer(_)));

        let header_only = "question_text,option_a,option_b,option_c,option_d,correct_answer\n";
        assert!(matches!(
            admin.import_csv(TopicId::new(1), header_only).await,
            Err(AdminError::Import(ImportError::NoValidRows { skipped: 0 }))
        ));
        assert!(matches!(
            admin.import_csv(TopicId::new(42), csv).await,
            Err(AdminError::NotFound)
        ));
    }

    #[tokio::test]
    async fn mock_exam_and_achievement_authoring() {
        let admin = service(true).await;
        let a = admin.add_question(draft("a")).await.unwrap();
        let b = admin.add_question(draft("b")).await.unwrap();

        let exam = admin.create_mock_exam("Paper 1", None, 30, 2).await.unwrap();
        assert_eq!(exam.duration_secs(), 1_800);
        admin.assign_questions(exam.id, &[b.id, a.id]).await.unwrap();
        assert!(matches!(
            admin.assign_questions(MockExamId::new(999), &[a.id]).await,
            Err(AdminError::NotFound)
        ));
        assert!(matches!(
            admin.create_mock_exam("Paper 2", None, 0, 2).await,
            Err(AdminError::Catalog(_))
        ));

        let badge = admin
            .create_achievement("Sharp", "80% accuracy", ConditionType::Accuracy, 80)
            .await
            .unwrap();
        assert_eq!(badge.condition, ConditionType::Accuracy);
        assert_ne!(badge.id, AchievementId::new(0));
    }
}
