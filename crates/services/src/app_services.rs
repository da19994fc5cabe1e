use std::sync::Arc;

use storage::repository::Storage;

use crate::achievement_service::AchievementService;
use crate::admin::AdminService;
use crate::context::SessionContext;
use crate::dashboard::DashboardService;
use crate::error::AppServicesError;
use crate::retry::RetryPolicy;
use crate::sessions::{MockExamService, PracticeLoopService};
use crate::streak_service::StreakService;
use crate::tutor::{ChatGateway, TutorService};
use crate::Clock;

/// Assembles app-facing services over one storage backend and session context.
#[derive(Clone)]
pub struct AppServices {
    context: SessionContext,
    streaks: Arc<StreakService>,
    achievements: Arc<AchievementService>,
    practice: Arc<PracticeLoopService>,
    exams: Arc<MockExamService>,
    tutor: Arc<TutorService>,
    dashboard: Arc<DashboardService>,
    admin: Arc<AdminService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        retry: RetryPolicy,
        gateway: Arc<dyn ChatGateway>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, retry, gateway))
    }

    /// Build services over any storage backend.
    #[must_use]
    pub fn from_storage(
        storage: &Storage,
        clock: Clock,
        retry: RetryPolicy,
        gateway: Arc<dyn ChatGateway>,
    ) -> Self {
        let context = SessionContext::new(Arc::clone(&storage.profiles));

        let streaks = StreakService::new(clock, Arc::clone(&storage.streaks)).with_retry(retry);
        let achievements = AchievementService::new(
            clock,
            Arc::clone(&storage.progress),
            Arc::clone(&storage.streaks),
            Arc::clone(&storage.achievements),
        )
        .with_retry(retry);
        let practice = PracticeLoopService::new(
            clock,
            context.clone(),
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.progress),
            streaks.clone(),
            achievements.clone(),
        )
        .with_retry(retry);
        let exams = MockExamService::new(
            clock,
            context.clone(),
            Arc::clone(&storage.mock_exams),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.attempts),
        )
        .with_retry(retry);
        let tutor = TutorService::new(clock, context.clone(), Arc::clone(&storage.chat), gateway);
        let dashboard = DashboardService::new(
            context.clone(),
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.streaks),
            achievements.clone(),
        );
        let admin = AdminService::new(
            clock,
            context.clone(),
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.mock_exams),
            Arc::clone(&storage.achievements),
        );

        Self {
            context,
            streaks: Arc::new(streaks),
            achievements: Arc::new(achievements),
            practice: Arc::new(practice),
            exams: Arc::new(exams),
            tutor: Arc::new(tutor),
            dashboard: Arc::new(dashboard),
            admin: Arc::new(admin),
        }
    }

    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    #[must_use]
    pub fn streaks(&self) -> Arc<StreakService> {
        Arc::clone(&self.streaks)
    }

    #[must_use]
    pub fn achievements(&self) -> Arc<AchievementService> {
        Arc::clone(&self.achievements)
    }

    #[must_use]
    pub fn practice(&self) -> Arc<PracticeLoopService> {
        Arc::clone(&self.practice)
    }

    #[must_use]
    pub fn exams(&self) -> Arc<MockExamService> {
        Arc::clone(&self.exams)
    }

    #[must_use]
    pub fn tutor(&self) -> Arc<TutorService> {
        Arc::clone(&self.tutor)
    }

    #[must_use]
    pub fn dashboard(&self) -> Arc<DashboardService> {
        Arc::clone(&self.dashboard)
    }

    #[must_use]
    pub fn admin(&self) -> Arc<AdminService> {
        Arc::clone(&self.admin)
    }
}
