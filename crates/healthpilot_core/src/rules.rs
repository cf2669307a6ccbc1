//! crates/healthpilot_core/src/rules.rs
//!
//! The goal-progress and gamification rules: daily completion evaluation,
//! level/streak bookkeeping, achievement thresholds, challenge progress and
//! the partner-discount tiers. All pure functions over domain values; the
//! adapters supply the rows and persist the results.

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{
    AchievementKind, ChallengeEnrollment, ChallengeKind, ChallengeStatus, GamificationState,
    NutritionFacts,
};

/// Points granted for every food-log action, regardless of goal completion.
pub const FOOD_LOG_POINTS: i32 = 10;
/// The reward score never grows past this cap.
pub const HEALTH_SCORE_CAP: i32 = 100;
/// Experience granted when a day's full target is met.
pub const DAILY_COMPLETION_XP: i32 = 100;
/// Experience granted alongside every unlocked achievement.
pub const ACHIEVEMENT_XP: i32 = 100;

/// Experience required per level.
const XP_PER_LEVEL: i32 = 1000;
/// Streak length that unlocks the weekly-streak achievement.
const WEEKLY_STREAK_DAYS: i32 = 7;
/// Level that unlocks the level-5 achievement.
const ACHIEVEMENT_LEVEL: i32 = 5;

/// A day counts as completed iff both records exist for the date and every
/// tracked quantity reached its goal. A missing ledger entry or target is a
/// normal "not completed", not an error.
pub fn day_completed(ledger: Option<&NutritionFacts>, target: Option<&NutritionFacts>) -> bool {
    match (ledger, target) {
        (Some(consumed), Some(goal)) => consumed.meets(goal),
        _ => false,
    }
}

/// Whether this submission should fire the day's one-time completion awards
/// (experience, challenge progress). `already_marked` is the ledger row's
/// persistent completion marker as it stood before the submission; judging
/// by the marker instead of reconstructing earlier totals keeps the awards
/// from re-firing on an already-completed day.
pub fn completion_award_due(completed_now: bool, already_marked: bool) -> bool {
    completed_now && !already_marked
}

/// Level implied by an experience total. Level 1 starts at 0 XP and every
/// 1000 XP adds a level.
pub fn level_for(experience: i32) -> i32 {
    experience / XP_PER_LEVEL + 1
}

impl GamificationState {
    /// Adds experience and recomputes the level. The level is monotone: it
    /// never drops below its current value.
    pub fn add_experience(&mut self, amount: i32) {
        self.experience += amount;
        let implied = level_for(self.experience);
        if implied > self.level {
            self.level = implied;
        }
    }

    /// Experience still needed to reach the next level boundary.
    pub fn experience_to_next(&self) -> i32 {
        self.level * XP_PER_LEVEL - self.experience
    }

    /// Records that the user was active on `today`.
    ///
    /// A repeat call on the same calendar day only refreshes the last-seen
    /// timestamp. On a new day the streak grows when the previous recorded
    /// day is exactly one calendar day earlier and resets to 1 otherwise;
    /// the comparison is a full date difference, so streaks survive month
    /// boundaries. Returns true when a new day was recorded.
    pub fn record_activity(&mut self, today: NaiveDate, now: DateTime<Utc>) -> bool {
        self.last_seen_at = now;
        if self.last_active_on == Some(today) {
            return false;
        }
        self.streak = match self.last_active_on {
            Some(prev) if (today - prev).num_days() == 1 => self.streak + 1,
            _ => 1,
        };
        self.last_active_on = Some(today);
        self.total_days += 1;
        true
    }

    /// Achievement kinds whose threshold the current state sits exactly on.
    /// The caller must still run the per-user existence check before
    /// inserting, so re-reaching a threshold never duplicates an award.
    pub fn pending_achievements(&self) -> Vec<AchievementKind> {
        let mut kinds = Vec::new();
        if self.streak == WEEKLY_STREAK_DAYS {
            kinds.push(AchievementKind::WeeklyStreak);
        }
        if self.level == ACHIEVEMENT_LEVEL {
            kinds.push(AchievementKind::LevelFive);
        }
        kinds
    }
}

impl ChallengeKind {
    /// Days of qualifying progress needed to complete a challenge of this
    /// kind.
    pub fn required_days(&self) -> i32 {
        match self {
            ChallengeKind::WeeklyTarget | ChallengeKind::Steps5000 | ChallengeKind::Steps10000 => 7,
            ChallengeKind::MonthlyTarget => 30,
        }
    }
}

impl ChallengeEnrollment {
    /// Advances the enrollment by one qualifying day. When the progress
    /// crosses the kind's threshold the enrollment completes and the
    /// challenge's reward points are recorded on it. Returns true when this
    /// call completed the challenge.
    pub fn advance(&mut self, kind: ChallengeKind, reward_points: i32) -> bool {
        if self.status != ChallengeStatus::Active {
            return false;
        }
        self.progress += 1;
        if self.progress >= kind.required_days() {
            self.status = ChallengeStatus::Completed;
            self.awarded_points = reward_points;
            return true;
        }
        false
    }
}

/// The discount granted for a redemption, by how far the user's score
/// exceeds the offer's cost: twice the cost earns the maximum, one and a
/// half times the cost earns the midpoint, anything less the minimum.
/// The caller has already verified `score >= cost`.
pub fn discount_for(score: i32, points_cost: i32, discount_min: f64, discount_max: f64) -> f64 {
    if score >= points_cost * 2 {
        discount_max
    } else if f64::from(score) >= f64::from(points_cost) * 1.5 {
        (discount_min + discount_max) / 2.0
    } else {
        discount_min
    }
}

/// Applies the bounded per-log reward credit.
pub fn credited_score(current: i32) -> i32 {
    (current + FOOD_LOG_POINTS).min(HEALTH_SCORE_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn facts(calories: f64, protein: f64, carbs: f64, fat: f64, water: f64) -> NutritionFacts {
        NutritionFacts {
            calories,
            protein,
            carbs,
            fat,
            water,
        }
    }

    fn state() -> GamificationState {
        GamificationState::new(Uuid::new_v4(), Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap())
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn ledger_accumulation_is_order_independent() {
        let a = facts(182.0, 14.0, 6.0, 11.2, 0.0);
        let b = facts(350.0, 9.5, 40.0, 12.0, 250.0);

        let mut ab = NutritionFacts::default();
        ab.accumulate(&a);
        ab.accumulate(&b);
        let mut ba = NutritionFacts::default();
        ba.accumulate(&b);
        ba.accumulate(&a);

        assert_eq!(ab, ba);
        assert_eq!(ab.calories, 532.0);
        assert_eq!(ab.water, 250.0);
    }

    #[test]
    fn completion_requires_every_quantity() {
        let target = facts(2900.0, 150.0, 363.0, 78.0, 3750.0);
        let mut consumed = facts(2900.0, 150.0, 363.0, 78.0, 3750.0);
        assert!(day_completed(Some(&consumed), Some(&target)));

        // One quantity strictly below the goal fails the whole day.
        consumed.water = 3749.9;
        assert!(!day_completed(Some(&consumed), Some(&target)));
    }

    #[test]
    fn missing_records_mean_not_completed() {
        let target = facts(2000.0, 100.0, 250.0, 60.0, 2500.0);
        assert!(!day_completed(None, Some(&target)));
        assert!(!day_completed(Some(&target), None));
        assert!(!day_completed(None, None));
    }

    #[test]
    fn completion_awards_fire_once_per_day() {
        // The first submission that completes the day fires the awards.
        assert!(completion_award_due(true, false));
        // Further submissions on a day already marked completed must not,
        // even though the totals still meet the target.
        assert!(!completion_award_due(true, true));
        assert!(!completion_award_due(false, false));
        assert!(!completion_award_due(false, true));
    }

    #[test]
    fn experience_drives_level_monotonically() {
        let mut g = state();
        g.add_experience(1000);
        assert_eq!(g.level, 2);
        assert_eq!(g.experience, 1000);

        g.add_experience(999);
        assert_eq!(g.level, 2);
        g.add_experience(1);
        assert_eq!(g.level, 3);

        // The formula can never pull an already-earned level back down.
        g.level = 7;
        g.add_experience(100);
        assert_eq!(g.level, 7);
    }

    #[test]
    fn streak_grows_on_consecutive_days() {
        let mut g = state();
        let now = g.last_seen_at;
        assert!(g.record_activity(day(2025, 7, 1), now));
        assert!(g.record_activity(day(2025, 7, 2), now));
        assert!(g.record_activity(day(2025, 7, 3), now));
        assert_eq!(g.streak, 3);
        assert_eq!(g.total_days, 3);
    }

    #[test]
    fn streak_resets_after_a_skipped_day() {
        let mut g = state();
        let now = g.last_seen_at;
        g.record_activity(day(2025, 7, 1), now);
        g.record_activity(day(2025, 7, 2), now);
        g.record_activity(day(2025, 7, 4), now);
        assert_eq!(g.streak, 1);
        assert_eq!(g.total_days, 3);
    }

    #[test]
    fn same_day_activity_only_refreshes_last_seen() {
        let mut g = state();
        let first = Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 7, 1, 20, 0, 0).unwrap();
        assert!(g.record_activity(day(2025, 7, 1), first));
        assert!(!g.record_activity(day(2025, 7, 1), later));
        assert_eq!(g.streak, 1);
        assert_eq!(g.total_days, 1);
        assert_eq!(g.last_seen_at, later);
    }

    #[test]
    fn streak_survives_month_boundaries() {
        // Jan 31 -> Feb 1 has matching day-of-month nowhere near each other;
        // the date difference is still one day.
        let mut g = state();
        let now = g.last_seen_at;
        g.record_activity(day(2025, 1, 31), now);
        g.record_activity(day(2025, 2, 1), now);
        assert_eq!(g.streak, 2);

        // Same day-of-month a month apart is a gap, not a streak.
        g.record_activity(day(2025, 3, 1), now);
        assert_eq!(g.streak, 1);
    }

    #[test]
    fn achievements_unlock_exactly_on_thresholds() {
        let mut g = state();
        g.streak = 7;
        assert_eq!(g.pending_achievements(), vec![AchievementKind::WeeklyStreak]);

        g.streak = 6;
        g.level = 5;
        assert_eq!(g.pending_achievements(), vec![AchievementKind::LevelFive]);

        g.level = 4;
        assert!(g.pending_achievements().is_empty());
    }

    fn enrollment(progress: i32) -> ChallengeEnrollment {
        ChallengeEnrollment {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            challenge_id: Uuid::new_v4(),
            progress,
            status: ChallengeStatus::Active,
            awarded_points: 0,
            joined_at: Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn weekly_challenge_completes_at_seven_days() {
        let mut e = enrollment(5);
        assert!(!e.advance(ChallengeKind::WeeklyTarget, 50));
        assert_eq!(e.progress, 6);
        assert_eq!(e.status, ChallengeStatus::Active);
        assert_eq!(e.awarded_points, 0);

        assert!(e.advance(ChallengeKind::WeeklyTarget, 50));
        assert_eq!(e.progress, 7);
        assert_eq!(e.status, ChallengeStatus::Completed);
        assert_eq!(e.awarded_points, 50);
    }

    #[test]
    fn monthly_challenge_needs_thirty_days() {
        let mut e = enrollment(28);
        assert!(!e.advance(ChallengeKind::MonthlyTarget, 200));
        assert!(e.advance(ChallengeKind::MonthlyTarget, 200));
        assert_eq!(e.progress, 30);
        assert_eq!(e.awarded_points, 200);
    }

    #[test]
    fn completed_enrollment_stops_advancing() {
        let mut e = enrollment(7);
        e.status = ChallengeStatus::Completed;
        e.awarded_points = 50;
        assert!(!e.advance(ChallengeKind::Steps5000, 50));
        assert_eq!(e.progress, 7);
    }

    #[test]
    fn discount_tiers_break_at_1_5x_and_2x_cost() {
        // Cost 40: minimum below 60, midpoint from 60, maximum from 80.
        assert_eq!(discount_for(40, 40, 5.0, 15.0), 5.0);
        assert_eq!(discount_for(59, 40, 5.0, 15.0), 5.0);
        assert_eq!(discount_for(60, 40, 5.0, 15.0), 10.0);
        assert_eq!(discount_for(79, 40, 5.0, 15.0), 10.0);
        assert_eq!(discount_for(80, 40, 5.0, 15.0), 15.0);
        assert_eq!(discount_for(100, 40, 5.0, 15.0), 15.0);
    }

    #[test]
    fn food_log_credit_is_capped() {
        assert_eq!(credited_score(0), 10);
        assert_eq!(credited_score(85), 95);
        assert_eq!(credited_score(95), 100);
        assert_eq!(credited_score(100), 100);
    }
}
