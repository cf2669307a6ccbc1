//! crates/healthpilot_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format,
//! with the exception of `NutritionFacts`, which doubles as the wire shape
//! the nutrition estimator replies with.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// The five nutrition quantities tracked everywhere in the system:
/// kilocalories, protein (g), carbohydrates (g), fat (g) and water (ml).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NutritionFacts {
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub fat: f64,
    #[serde(default)]
    pub water: f64,
}

impl NutritionFacts {
    /// Adds every field of `delta` to this record in place.
    pub fn accumulate(&mut self, delta: &NutritionFacts) {
        self.calories += delta.calories;
        self.protein += delta.protein;
        self.carbs += delta.carbs;
        self.fat += delta.fat;
        self.water += delta.water;
    }

    /// True iff every one of the five quantities individually reaches the
    /// corresponding target quantity. No partial credit.
    pub fn meets(&self, target: &NutritionFacts) -> bool {
        self.calories >= target.calories
            && self.protein >= target.protein
            && self.carbs >= target.carbs
            && self.fat >= target.fat
            && self.water >= target.water
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLevel {
    Sedentary,
    LightlyActive,
    ModeratelyActive,
    VeryActive,
    ExtremelyActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalKind {
    WeightLoss,
    WeightGain,
    WeightMaintenance,
    MuscleGain,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }
}

impl FromStr for Sex {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Sex::Male),
            "female" => Ok(Sex::Female),
            other => Err(format!("'{}' is not a valid sex", other)),
        }
    }
}

impl ActivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLevel::Sedentary => "sedentary",
            ActivityLevel::LightlyActive => "lightly_active",
            ActivityLevel::ModeratelyActive => "moderately_active",
            ActivityLevel::VeryActive => "very_active",
            ActivityLevel::ExtremelyActive => "extremely_active",
        }
    }
}

impl FromStr for ActivityLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sedentary" => Ok(ActivityLevel::Sedentary),
            "lightly_active" => Ok(ActivityLevel::LightlyActive),
            "moderately_active" => Ok(ActivityLevel::ModeratelyActive),
            "very_active" => Ok(ActivityLevel::VeryActive),
            "extremely_active" => Ok(ActivityLevel::ExtremelyActive),
            other => Err(format!("'{}' is not a valid activity level", other)),
        }
    }
}

impl GoalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalKind::WeightLoss => "weight_loss",
            GoalKind::WeightGain => "weight_gain",
            GoalKind::WeightMaintenance => "weight_maintenance",
            GoalKind::MuscleGain => "muscle_gain",
        }
    }
}

impl FromStr for GoalKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weight_loss" => Ok(GoalKind::WeightLoss),
            "weight_gain" => Ok(GoalKind::WeightGain),
            "weight_maintenance" => Ok(GoalKind::WeightMaintenance),
            "muscle_gain" => Ok(GoalKind::MuscleGain),
            other => Err(format!("'{}' is not a valid goal", other)),
        }
    }
}

/// Represents a registered user and their health profile.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub age: i32,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub sex: Option<Sex>,
    pub activity: Option<ActivityLevel>,
    pub goal: Option<GoalKind>,
    /// Reward points usable for partner discounts, 0..=100.
    pub health_score: i32,
    pub created_at: DateTime<Utc>,
}

/// The subset of profile attributes the daily-target estimator needs.
/// Only constructible from a profile with every attribute filled in.
#[derive(Debug, Clone)]
pub struct CompleteProfile {
    pub age: i32,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub sex: Sex,
    pub activity: ActivityLevel,
    pub goal: GoalKind,
}

impl UserProfile {
    /// Returns the estimator input when the profile is complete enough to
    /// compute a daily target, `None` otherwise.
    pub fn complete_profile(&self) -> Option<CompleteProfile> {
        if self.age <= 0 || self.weight_kg <= 0.0 || self.height_cm <= 0.0 {
            return None;
        }
        Some(CompleteProfile {
            age: self.age,
            weight_kg: self.weight_kg,
            height_cm: self.height_cm,
            sex: self.sex?,
            activity: self.activity?,
            goal: self.goal?,
        })
    }
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// The per-user-per-day nutrition goal. One row per (user, date); replaced
/// wholesale when the profile changes, never edited in place.
#[derive(Debug, Clone)]
pub struct DailyTarget {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub goal: NutritionFacts,
    pub created_at: DateTime<Utc>,
}

/// The per-user-per-day consumption record. Every food entry for the same
/// day accumulates into this single row.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub consumed: NutritionFacts,
    /// `; `-joined log of the free-text descriptions behind the totals.
    pub description: String,
    /// Set once, when the day's totals first met the target. The one-time
    /// completion awards key off this marker, never off recomputed totals.
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

/// Per-user gamification counters. A singleton row per user.
#[derive(Debug, Clone)]
pub struct GamificationState {
    pub user_id: Uuid,
    pub level: i32,
    pub experience: i32,
    pub streak: i32,
    pub total_days: i32,
    /// The last calendar day on which activity was recorded.
    pub last_active_on: Option<NaiveDate>,
    pub last_seen_at: DateTime<Utc>,
    /// Snapshot of the day's goals, shown alongside the stats.
    pub calories_goal: i32,
    pub protein_goal: i32,
    pub water_goal: i32,
}

impl GamificationState {
    pub fn new(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            level: 1,
            experience: 0,
            streak: 0,
            total_days: 0,
            last_active_on: None,
            last_seen_at: now,
            calories_goal: 0,
            protein_goal: 0,
            water_goal: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AchievementKind {
    /// Seven qualifying days in a row.
    WeeklyStreak,
    /// Reached level 5.
    LevelFive,
}

impl AchievementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementKind::WeeklyStreak => "weekly_streak",
            AchievementKind::LevelFive => "level_5",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AchievementKind::WeeklyStreak => "One Week Streak",
            AchievementKind::LevelFive => "Level 5 Reached",
        }
    }
}

impl FromStr for AchievementKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly_streak" => Ok(AchievementKind::WeeklyStreak),
            "level_5" => Ok(AchievementKind::LevelFive),
            other => Err(format!("'{}' is not a valid achievement kind", other)),
        }
    }
}

/// An append-only, per-user award. At most one per (user, kind).
#[derive(Debug, Clone)]
pub struct Achievement {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: AchievementKind,
    pub name: String,
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    WeeklyTarget,
    MonthlyTarget,
    Steps5000,
    Steps10000,
}

impl ChallengeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeKind::WeeklyTarget => "weekly_target",
            ChallengeKind::MonthlyTarget => "monthly_target",
            ChallengeKind::Steps5000 => "steps_5000",
            ChallengeKind::Steps10000 => "steps_10000",
        }
    }
}

impl FromStr for ChallengeKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly_target" => Ok(ChallengeKind::WeeklyTarget),
            "monthly_target" => Ok(ChallengeKind::MonthlyTarget),
            "steps_5000" => Ok(ChallengeKind::Steps5000),
            "steps_10000" => Ok(ChallengeKind::Steps10000),
            other => Err(format!("'{}' is not a valid challenge kind", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeStatus {
    Active,
    Completed,
    Failed,
}

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Active => "active",
            ChallengeStatus::Completed => "completed",
            ChallengeStatus::Failed => "failed",
        }
    }
}

impl FromStr for ChallengeStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ChallengeStatus::Active),
            "completed" => Ok(ChallengeStatus::Completed),
            "failed" => Ok(ChallengeStatus::Failed),
            other => Err(format!("'{}' is not a valid challenge status", other)),
        }
    }
}

/// A global, time-boxed challenge definition users can enroll in.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub id: Uuid,
    pub name: String,
    pub kind: ChallengeKind,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reward_points: i32,
}

/// One user's enrollment in one challenge.
#[derive(Debug, Clone)]
pub struct ChallengeEnrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub challenge_id: Uuid,
    pub progress: i32,
    pub status: ChallengeStatus,
    pub awarded_points: i32,
    pub joined_at: DateTime<Utc>,
}

/// A partner company offering point-for-discount redemptions.
#[derive(Debug, Clone)]
pub struct PartnerOffer {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub points_cost: i32,
    pub discount_min: f64,
    pub discount_max: f64,
    pub is_active: bool,
}

/// An immutable record of one point-for-discount redemption.
#[derive(Debug, Clone)]
pub struct Redemption {
    pub id: Uuid,
    pub user_id: Uuid,
    pub partner_id: Uuid,
    pub points_spent: i32,
    pub discount_amount: f64,
    pub redeemed_at: DateTime<Utc>,
}
