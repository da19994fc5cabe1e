//! Achievement rule evaluation.

use std::collections::HashSet;

use crate::model::{Achievement, AchievementId, AggregateStats, ConditionType};

/// Accuracy badges stay locked until this many questions were attempted.
pub const ACCURACY_MIN_ATTEMPTS: u32 = 20;

/// Whether `stats` meet a single rule, ignoring unlock history.
#[must_use]
pub fn is_satisfied(achievement: &Achievement, stats: &AggregateStats) -> bool {
    match achievement.condition {
        ConditionType::Questions => stats.total_correct >= achievement.threshold,
        ConditionType::Streak => stats.current_streak >= achievement.threshold,
        ConditionType::Accuracy => {
            stats.total_attempted >= ACCURACY_MIN_ATTEMPTS
                && stats.accuracy_at_least(achievement.threshold)
        }
    }
}

/// Achievements in `catalog` that are satisfied now and not yet unlocked.
///
/// Output follows catalog order. Each id is reported at most once even if
/// the catalog repeats it.
#[must_use]
pub fn newly_unlocked<'a>(
    catalog: &'a [Achievement],
    stats: &AggregateStats,
    unlocked: &HashSet<AchievementId>,
) -> Vec<&'a Achievement> {
    let mut seen = HashSet::new();
    catalog
        .iter()
        .filter(|a| !unlocked.contains(&a.id))
        .filter(|a| seen.insert(a.id))
        .filter(|a| is_satisfied(a, stats))
        .collect()
}

/// How far a user is towards one achievement.
#[derive(Debug, Clone, PartialEq)]
pub struct AchievementProgress {
    pub achievement: Achievement,
    pub earned: bool,
    /// Current value of the stat the rule looks at.
    pub current: f64,
    /// `0..=100`; always 100 once earned.
    pub percent: u32,
}

/// Progress towards every achievement in `catalog`, in catalog order.
#[must_use]
pub fn progress(
    catalog: &[Achievement],
    stats: &AggregateStats,
    unlocked: &HashSet<AchievementId>,
) -> Vec<AchievementProgress> {
    catalog
        .iter()
        .map(|a| {
            let earned = unlocked.contains(&a.id);
            let current = match a.condition {
                ConditionType::Questions => f64::from(stats.total_correct),
                ConditionType::Streak => f64::from(stats.current_streak),
                ConditionType::Accuracy => stats.accuracy_percent(),
            };
            let percent = if earned || a.threshold == 0 {
                100
            } else {
                let ratio = (current / f64::from(a.threshold) * 100.0).clamp(0.0, 100.0);
                // clamp keeps the cast in range
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let pct = ratio.floor() as u32;
                pct
            };
            AchievementProgress {
                achievement: a.clone(),
                earned,
                current,
                percent,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: u64, condition: ConditionType, threshold: u32) -> Achievement {
        Achievement::new(AchievementId::new(id), format!("rule {id}"), "", condition, threshold)
            .unwrap()
    }

    fn stats(correct: u32, attempted: u32, streak: u32) -> AggregateStats {
        AggregateStats {
            total_correct: correct,
            total_attempted: attempted,
            current_streak: streak,
        }
    }

    #[test]
    fn accuracy_unlocks_at_exact_threshold_with_enough_attempts() {
        let catalog = vec![rule(1, ConditionType::Accuracy, 80)];
        let unlocked = newly_unlocked(&catalog, &stats(20, 25, 0), &HashSet::new());
        assert_eq!(unlocked.len(), 1);
        assert_eq!(unlocked[0].id, AchievementId::new(1));
    }

    #[test]
    fn accuracy_never_unlocks_below_minimum_sample() {
        let catalog = vec![rule(1, ConditionType::Accuracy, 50)];
        for attempted in 0..ACCURACY_MIN_ATTEMPTS {
            let s = stats(attempted, attempted, 0);
            assert!(newly_unlocked(&catalog, &s, &HashSet::new()).is_empty());
        }
    }

    #[test]
    fn questions_and_streak_use_their_own_stats() {
        let catalog = vec![
            rule(1, ConditionType::Questions, 10),
            rule(2, ConditionType::Questions, 50),
            rule(3, ConditionType::Streak, 3),
            rule(4, ConditionType::Streak, 7),
        ];
        let ids: Vec<_> = newly_unlocked(&catalog, &stats(12, 40, 3), &HashSet::new())
            .into_iter()
            .map(|a| a.id.value())
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn already_unlocked_are_skipped() {
        let catalog = vec![
            rule(1, ConditionType::Questions, 1),
            rule(2, ConditionType::Questions, 2),
        ];
        let s = stats(5, 5, 1);
        let mut unlocked: HashSet<_> = newly_unlocked(&catalog, &s, &HashSet::new())
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(unlocked.len(), 2);

        assert!(newly_unlocked(&catalog, &s, &unlocked).is_empty());

        unlocked.remove(&AchievementId::new(2));
        let again = newly_unlocked(&catalog, &s, &unlocked);
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].id, AchievementId::new(2));
    }

    #[test]
    fn duplicate_catalog_entries_report_once() {
        let catalog = vec![
            rule(1, ConditionType::Questions, 1),
            rule(1, ConditionType::Questions, 1),
        ];
        assert_eq!(
            newly_unlocked(&catalog, &stats(1, 1, 0), &HashSet::new()).len(),
            1
        );
    }

    #[test]
    fn result_set_does_not_depend_on_order() {
        let mut catalog = vec![
            rule(1, ConditionType::Questions, 10),
            rule(2, ConditionType::Streak, 2),
            rule(3, ConditionType::Accuracy, 70),
        ];
        let s = stats(30, 40, 2);
        let mut forward: Vec<_> = newly_unlocked(&catalog, &s, &HashSet::new())
            .into_iter()
            .map(|a| a.id)
            .collect();
        catalog.reverse();
        let mut backward: Vec<_> = newly_unlocked(&catalog, &s, &HashSet::new())
            .into_iter()
            .map(|a| a.id)
            .collect();
        forward.sort();
        backward.sort();
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 3);
    }

    #[test]
    fn progress_reports_partial_and_earned() {
        let catalog = vec![
            rule(1, ConditionType::Questions, 100),
            rule(2, ConditionType::Streak, 2),
        ];
        let unlocked: HashSet<_> = [AchievementId::new(2)].into_iter().collect();
        let rows = progress(&catalog, &stats(25, 30, 1), &unlocked);

        assert_eq!(rows[0].percent, 25);
        assert!(!rows[0].earned);
        assert_eq!(rows[1].percent, 100);
        assert!(rows[1].earned);
    }
}
