use std::collections::HashMap;
use std::sync::Arc;

use prep_core::achievements::AchievementProgress;
use prep_core::model::{
    AggregateStats, AuthUser, ExamType, ExamTypeId, LeaderboardEntry, ProgressRecord, Subject,
    Topic, TopicId, Track, TrackId, TrackSelection,
};
use storage::repository::{
    CatalogRepository, ProfileRepository, ProgressRepository, StorageError, StreakRepository,
};
use tracing::info;

use crate::achievement_service::AchievementService;
use crate::context::SessionContext;
use crate::error::DashboardError;

/// Rows shown on the leaderboard.
pub const LEADERBOARD_SIZE: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicOverview {
    pub topic: Topic,
    /// `None` until the topic has been practiced.
    pub progress: Option<ProgressRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectOverview {
    pub subject: Subject,
    pub topics: Vec<TopicOverview>,
}

/// Everything the home screen needs for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub user: AuthUser,
    pub track: Track,
    pub exam_type_id: ExamTypeId,
    pub subjects: Vec<SubjectOverview>,
    pub totals: AggregateStats,
    pub topics_practiced: usize,
    pub longest_streak: u32,
    pub achievements_earned: usize,
}

/// Track selection, dashboard, leaderboard and achievements overview.
#[derive(Clone)]
pub struct DashboardService {
    context: SessionContext,
    catalog: Arc<dyn CatalogRepository>,
    profiles: Arc<dyn ProfileRepository>,
    progress: Arc<dyn ProgressRepository>,
    streaks: Arc<dyn StreakRepository>,
    achievements: AchievementService,
}

impl DashboardService {
    #[must_use]
    pub fn new(
        context: SessionContext,
        catalog: Arc<dyn CatalogRepository>,
        profiles: Arc<dyn ProfileRepository>,
        progress: Arc<dyn ProgressRepository>,
        streaks: Arc<dyn StreakRepository>,
        achievements: AchievementService,
    ) -> Self {
        Self {
            context,
            catalog,
            profiles,
            progress,
            streaks,
            achievements,
        }
    }

    /// # Errors
    ///
    /// Returns `DashboardError::Storage` on read failure.
    pub async fn tracks(&self) -> Result<Vec<Track>, DashboardError> {
        Ok(self.catalog.list_tracks().await?)
    }

    /// # Errors
    ///
    /// Returns `DashboardError::Storage` on read failure.
    pub async fn exam_types(&self) -> Result<Vec<ExamType>, DashboardError> {
        Ok(self.catalog.list_exam_types().await?)
    }

    /// Save the user's track and exam type.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::NotFound` for an unknown track or exam type,
    /// `Auth` without a user, or `Storage`.
    pub async fn select_track(
        &self,
        track_id: TrackId,
        exam_type_id: ExamTypeId,
    ) -> Result<TrackSelection, DashboardError> {
        let user = self.context.require_user()?;
        let selection = TrackSelection {
            user_id: user.id,
            track_id,
            exam_type_id,
        };
        self.profiles
            .set_track_selection(&selection)
            .await
            .map_err(|err| match err {
                StorageError::NotFound => DashboardError::NotFound,
                other => DashboardError::Storage(other),
            })?;
        info!(
            user_id = %user.id,
            track_id = track_id.value(),
            exam_type_id = exam_type_id.value(),
            "track selected"
        );
        Ok(selection)
    }

    /// # Errors
    ///
    /// Returns `DashboardError::Auth` without a user or `Storage`.
    pub async fn selection(&self) -> Result<Option<TrackSelection>, DashboardError> {
        let user = self.context.require_user()?;
        Ok(self.profiles.get_track_selection(user.id).await?)
    }

    /// Build the dashboard for the logged-in user.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::NoTrackSelection` when the user has not picked
    /// a track yet, `NotFound` if the selected track vanished, `Auth`, or `Storage`.
    pub async fn dashboard(&self) -> Result<Dashboard, DashboardError> {
        let user = self.context.require_user()?;
        let selection = self
            .profiles
            .get_track_selection(user.id)
            .await?
            .ok_or(DashboardError::NoTrackSelection)?;
        let track = self
            .catalog
            .get_track(selection.track_id)
            .await?
            .ok_or(DashboardError::NotFound)?;

        let subjects = self.catalog.subjects_for_track(track.id).await?;
        let subject_ids: Vec<_> = subjects.iter().map(|s| s.id).collect();
        let topics = self.catalog.topics_for_subjects(&subject_ids).await?;

        let records = self.progress.progress_for_user(user.id).await?;
        let by_topic: HashMap<TopicId, ProgressRecord> =
            records.iter().map(|r| (r.topic_id(), r.clone())).collect();

        let subjects = subjects
            .into_iter()
            .map(|subject| {
                let topics = topics
                    .iter()
                    .filter(|t| t.subject_id == subject.id)
                    .map(|topic| TopicOverview {
                        topic: topic.clone(),
                        progress: by_topic.get(&topic.id).cloned(),
                    })
                    .collect();
                SubjectOverview { subject, topics }
            })
            .collect();

        let streak = self.streaks.get_streak(user.id).await?;
        let totals = AggregateStats::from_progress(
            &records,
            streak.map_or(0, |s| s.current_streak()),
        );
        let achievements_earned = self.achievements.earned_count(user.id).await?;

        Ok(Dashboard {
            user,
            track,
            exam_type_id: selection.exam_type_id,
            subjects,
            totals,
            topics_practiced: records.len(),
            longest_streak: streak.map_or(0, |s| s.longest_streak()),
            achievements_earned,
        })
    }

    /// Top users by total correct answers.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::Storage` on read failure.
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, DashboardError> {
        Ok(self.profiles.leaderboard(LEADERBOARD_SIZE).await?)
    }

    /// Progress towards each achievement for the logged-in user.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::Auth` without a user or `Storage`.
    pub async fn achievements(&self) -> Result<Vec<AchievementProgress>, DashboardError> {
        let user = self.context.require_user()?;
        Ok(self.achievements.overview(user.id).await?)
    }
}

#[cfg(test)]
mod tests {
    use prep_core::model::{AuthIdentity, SubjectId, TrackColor, UserId};
    use prep_core::time::{fixed_clock, fixed_now};
    use storage::InMemoryRepository;

    use super::*;

    async fn seeded() -> (Arc<InMemoryRepository>, DashboardService, UserId) {
        let repo = Arc::new(InMemoryRepository::new());
        repo.upsert_exam_type(&ExamType::new(ExamTypeId::new(1), "WAEC", "").unwrap())
            .await
            .unwrap();
        repo.upsert_track(&Track::new(TrackId::new(1), "Science", TrackColor::Blue).unwrap())
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
        for (id, subject, name) in [(1, 1, "Grammar"), (2, 2, "Mechanics"), (3, 3, "Poetry")] {
            repo.upsert_topic(&Topic::new(TopicId::new(id), SubjectId::new(subject), name, None).unwrap())
                .await
                .unwrap();
        }

        let context = SessionContext::new(repo.clone());
        let user = context
            .login(AuthIdentity {
                id: UserId::random(),
                email: "ada@example.com".into(),
                display_name: Some("Ada".into()),
                avatar_url: None,
            })
            .await
            .unwrap();
        let achievements =
            AchievementService::new(fixed_clock(), repo.clone(), repo.clone(), repo.clone());
        let service = DashboardService::new(
            context,
            repo.clone(),
            repo.clone(),
            repo.clone(),
            repo.clone(),
            achievements,
        );
        (repo, service, user.id)
    }

    #[tokio::test]
    async fn dashboard_requires_a_selection() {
        let (_repo, service, _user) = seeded().await;
        assert!(matches!(
            service.dashboard().await,
            Err(DashboardError::NoTrackSelection)
        ));
    }

    #[tokio::test]
    async fn dashboard_shows_track_subjects_and_totals() {
        let (repo, service, user) = seeded().await;
        service
            .select_track(TrackId::new(1), ExamTypeId::new(1))
            .await
            .unwrap();
        let record = ProgressRecord::from_persisted(TopicId::new(2), 10, 7, fixed_now()).unwrap();
        repo.upsert_progress(user, &record).await.unwrap();

        let dashboard = service.dashboard().await.unwrap();
        assert_eq!(dashboard.track.name, "Science");
        let names: Vec<_> = dashboard.subjects.iter().map(|s| s.subject.name.as_str()).collect();
        assert_eq!(names, vec!["English", "Physics"]);
        let physics = &dashboard.subjects[1];
        assert_eq!(physics.topics.len(), 1);
        assert_eq!(
            physics.topics[0].progress.as_ref().map(ProgressRecord::questions_correct),
            Some(7)
        );
        assert_eq!(dashboard.totals.total_attempted, 10);
        assert_eq!(dashboard.topics_practiced, 1);
        assert_eq!(dashboard.achievements_earned, 0);
    }

    #[tokio::test]
    async fn unknown_track_is_not_found() {
        let (_repo, service, _user) = seeded().await;
        assert!(matches!(
            service.select_track(TrackId::new(9), ExamTypeId::new(1)).await,
            Err(DashboardError::NotFound)
        ));
    }

    #[tokio::test]
    async fn leaderboard_uses_profile_names() {
        let (repo, service, user) = seeded().await;
        let record = ProgressRecord::from_persisted(TopicId::new(1), 5, 5, fixed_now()).unwrap();
        repo.upsert_progress(user, &record).await.unwrap();

        let board = service.leaderboard().await.unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[0].username, "Ada");
    }
}
