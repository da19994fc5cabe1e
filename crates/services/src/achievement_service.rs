use std::sync::Arc;

use prep_core::Clock;
use prep_core::achievements::{self, AchievementProgress};
use prep_core::model::{Achievement, AggregateStats, UnlockedAchievement, UserId};
use storage::repository::{AchievementRepository, ProgressRepository, StorageError, StreakRepository};
use tracing::{debug, info, warn};

use crate::retry::RetryPolicy;

/// An earned achievement whose unlock could not be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUnlock {
    pub achievement: Achievement,
    pub reason: String,
}

/// Achievements unlocked by one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockReport {
    pub stats: AggregateStats,
    /// Newly stored unlocks, in catalog order.
    pub unlocked: Vec<Achievement>,
    /// Earned but not stored; the next check tries them again.
    pub failed: Vec<FailedUnlock>,
}

impl UnlockReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Evaluates the achievement catalog against a user's totals.
#[derive(Clone)]
pub struct AchievementService {
    clock: Clock,
    progress: Arc<dyn ProgressRepository>,
    streaks: Arc<dyn StreakRepository>,
    achievements: Arc<dyn AchievementRepository>,
    retry: RetryPolicy,
}

impl AchievementService {
    #[must_use]
    pub fn new(
        clock: Clock,
        progress: Arc<dyn ProgressRepository>,
        streaks: Arc<dyn StreakRepository>,
        achievements: Arc<dyn AchievementRepository>,
    ) -> Self {
        Self {
            clock,
            progress,
            streaks,
            achievements,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Totals across every topic plus the current streak.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if progress or streak cannot be read.
    pub async fn stats(&self, user: UserId) -> Result<AggregateStats, StorageError> {
        let records = self.progress.progress_for_user(user).await?;
        let streak = self
            .streaks
            .get_streak(user)
            .await?
            .map_or(0, |s| s.current_streak());
        Ok(AggregateStats::from_progress(&records, streak))
    }

    /// Unlock every achievement the user now qualifies for.
    ///
    /// The whole catalog is evaluated on each call. Each unlock write goes
    /// through the retry policy; unlocks that storage accepted as new are
    /// reported. A write that runs out of retries lands in `failed` and the
    /// remaining achievements are still tried.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if stats, catalog or earned set cannot be read.
    pub async fn check(&self, user: UserId) -> Result<UnlockReport, StorageError> {
        let stats = self.stats(user).await?;
        let catalog = self.achievements.list_achievements().await?;
        let earned = self.achievements.unlocked_ids(user).await?;
        debug!(
            user_id = %user,
            catalog = catalog.len(),
            earned = earned.len(),
            "evaluating achievements"
        );

        let mut unlocked = Vec::new();
        let mut failed = Vec::new();
        for achievement in achievements::newly_unlocked(&catalog, &stats, &earned) {
            let unlock = UnlockedAchievement {
                user_id: user,
                achievement_id: achievement.id,
                unlocked_at: self.clock.now(),
            };
            let stored = self
                .retry
                .run("record_unlock", || self.achievements.record_unlock(&unlock))
                .await;
            match stored {
                Ok(true) => {
                    info!(
                        user_id = %user,
                        achievement = %achievement.name,
                        condition = %achievement.condition,
                        threshold = achievement.threshold,
                        "achievement unlocked"
                    );
                    unlocked.push(achievement.clone());
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(
                        user_id = %user,
                        achievement = %achievement.name,
                        error = %err,
                        "achievement unlock not saved"
                    );
                    failed.push(FailedUnlock {
                        achievement: achievement.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(UnlockReport {
            stats,
            unlocked,
            failed,
        })
    }

    /// Progress towards each achievement, for the achievements page.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    pub async fn overview(&self, user: UserId) -> Result<Vec<AchievementProgress>, StorageError> {
        let stats = self.stats(user).await?;
        let catalog = self.achievements.list_achievements().await?;
        let earned = self.achievements.unlocked_ids(user).await?;
        Ok(achievements::progress(&catalog, &stats, &earned))
    }

    /// How many achievements the user holds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    pub async fn earned_count(&self, user: UserId) -> Result<usize, StorageError> {
        Ok(self.achievements.unlocked_ids(user).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;
    use prep_core::model::{AchievementId, ConditionType, ProgressRecord, StreakRecord, TopicId};
    use prep_core::time::{fixed_clock, fixed_now};
    use storage::InMemoryRepository;
    use storage::repository::{CatalogRepository, NewAchievementRecord};

    use super::*;

    async fn setup() -> (Arc<InMemoryRepository>, AchievementService) {
        let repo = Arc::new(InMemoryRepository::new());
        for (name, condition, threshold) in [
            ("Sharp Shooter", ConditionType::Accuracy, 80),
            ("First Steps", ConditionType::Questions, 1),
            ("On a Roll", ConditionType::Streak, 3),
        ] {
            repo.insert_achievement(NewAchievementRecord {
                name: name.into(),
                description: String::new(),
                condition,
                threshold,
            })
            .await
            .unwrap();
        }
        let service = AchievementService::new(fixed_clock(), repo.clone(), repo.clone(), repo.clone())
            .with_retry(RetryPolicy::once());
        (repo, service)
    }

    async fn topic(repo: &InMemoryRepository) -> TopicId {
        use prep_core::model::{Subject, SubjectId, Topic};
        repo.upsert_subject(&Subject::new(SubjectId::new(1), "Maths", None, true).unwrap())
            .await
            .unwrap();
        let topic = Topic::new(TopicId::new(1), SubjectId::new(1), "Algebra", None).unwrap();
        repo.upsert_topic(&topic).await.unwrap();
        topic.id
    }

    #[tokio::test]
    async fn accuracy_waits_for_twenty_attempts() {
        let (repo, service) = setup().await;
        let user = UserId::random();
        let topic = topic(&repo).await;

        let few = ProgressRecord::from_persisted(topic, 19, 19, fixed_now()).unwrap();
        repo.upsert_progress(user, &few).await.unwrap();
        let names: Vec<_> = service
            .check(user)
            .await
            .unwrap()
            .unlocked
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["First Steps"]);

        let enough = ProgressRecord::from_persisted(topic, 25, 20, fixed_now()).unwrap();
        repo.upsert_progress(user, &enough).await.unwrap();
        let names: Vec<_> = service
            .check(user)
            .await
            .unwrap()
            .unlocked
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["Sharp Shooter"]);
    }

    #[tokio::test]
    async fn never_reports_the_same_unlock_twice() {
        let (repo, service) = setup().await;
        let user = UserId::random();
        repo.put_streak(
            user,
            &StreakRecord::from_persisted(4, 4, fixed_now().date_naive(), 4).unwrap(),
        )
        .await
        .unwrap();

        let first = service.check(user).await.unwrap();
        assert_eq!(first.unlocked.len(), 1);
        assert_eq!(first.stats.current_streak, 4);
        assert!(service.check(user).await.unwrap().unlocked.is_empty());
        assert_eq!(service.earned_count(user).await.unwrap(), 1);
    }

    /// Refuses to record one achievement, delegating everything else.
    struct RejectsUnlock {
        inner: Arc<InMemoryRepository>,
        rejected: AchievementId,
    }

    #[async_trait]
    impl AchievementRepository for RejectsUnlock {
        async fn insert_achievement(
            &self,
            achievement: NewAchievementRecord,
        ) -> Result<AchievementId, StorageError> {
            self.inner.insert_achievement(achievement).await
        }

        async fn list_achievements(&self) -> Result<Vec<Achievement>, StorageError> {
            self.inner.list_achievements().await
        }

        async fn unlocked_ids(&self, user: UserId) -> Result<HashSet<AchievementId>, StorageError> {
            self.inner.unlocked_ids(user).await
        }

        async fn record_unlock(&self, unlock: &UnlockedAchievement) -> Result<bool, StorageError> {
            if unlock.achievement_id == self.rejected {
                return Err(StorageError::Connection("down".into()));
            }
            self.inner.record_unlock(unlock).await
        }

        async fn unlocks_for_user(
            &self,
            user: UserId,
        ) -> Result<Vec<UnlockedAchievement>, StorageError> {
            self.inner.unlocks_for_user(user).await
        }
    }

    #[tokio::test]
    async fn stored_unlocks_are_reported_when_a_later_one_fails() {
        let repo = Arc::new(InMemoryRepository::new());
        let first = repo
            .insert_achievement(NewAchievementRecord {
                name: "First".into(),
                description: String::new(),
                condition: ConditionType::Questions,
                threshold: 1,
            })
            .await
            .unwrap();
        let second = repo
            .insert_achievement(NewAchievementRecord {
                name: "Second".into(),
                description: String::new(),
                condition: ConditionType::Questions,
                threshold: 2,
            })
            .await
            .unwrap();
        let user = UserId::random();
        let topic = topic(&repo).await;
        let record = ProgressRecord::from_persisted(topic, 2, 2, fixed_now()).unwrap();
        repo.upsert_progress(user, &record).await.unwrap();

        let flaky = Arc::new(RejectsUnlock {
            inner: repo.clone(),
            rejected: second,
        });
        let service = AchievementService::new(fixed_clock(), repo.clone(), repo.clone(), flaky)
            .with_retry(RetryPolicy::once());
        let report = service.check(user).await.unwrap();
        let names: Vec<_> = report.unlocked.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["First"]);
        assert!(!report.is_complete());
        assert_eq!(report.failed[0].achievement.id, second);
        assert_eq!(repo.unlocked_ids(user).await.unwrap(), HashSet::from([first]));

        let healthy = AchievementService::new(fixed_clock(), repo.clone(), repo.clone(), repo.clone())
            .with_retry(RetryPolicy::once());
        let retry = healthy.check(user).await.unwrap();
        let names: Vec<_> = retry.unlocked.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Second"]);
        assert!(retry.is_complete());
    }

    #[tokio::test]
    async fn overview_follows_catalog_order() {
        let (_repo, service) = setup().await;
        let overview = service.overview(UserId::random()).await.unwrap();
        let thresholds: Vec<_> = overview.iter().map(|p| p.achievement.threshold).collect();
        assert_eq!(thresholds, vec![1, 3, 80]);
        assert!(overview.iter().all(|p| !p.earned && p.percent == 0));
    }
}
