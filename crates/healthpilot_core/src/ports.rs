//! crates/healthpilot_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like the
//! database or the text-generation API.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    Achievement, AchievementKind, ActivityLevel, Challenge, ChallengeEnrollment, CompleteProfile,
    DailyTarget, GamificationState, GoalKind, LedgerEntry, NutritionFacts, PartnerOffer,
    Redemption, Sex, UserCredentials, UserProfile,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error type shared by all port operations. Besides the generic
/// storage/upstream failures it carries the domain rejections the handlers
/// translate into user-facing responses.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Already enrolled in this challenge")]
    AlreadyEnrolled,
    #[error("Insufficient points")]
    InsufficientPoints,
    #[error("Upstream service failure: {0}")]
    Upstream(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Port Argument and Row Types
//=========================================================================================

/// Everything needed to create an account. Profile attributes are optional;
/// an incomplete profile simply gets no daily target until it is filled in.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub hashed_password: String,
    pub age: i32,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub sex: Option<Sex>,
    pub activity: Option<ActivityLevel>,
    pub goal: Option<GoalKind>,
}

/// A partial profile update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub hashed_password: Option<String>,
    pub age: Option<i32>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub sex: Option<Sex>,
    pub activity: Option<ActivityLevel>,
    pub goal: Option<GoalKind>,
}

/// One row of the gamification leaderboard.
#[derive(Debug, Clone)]
pub struct LeaderboardRow {
    pub user_id: Uuid,
    pub name: String,
    pub level: i32,
    pub experience: i32,
    pub streak: i32,
    pub total_days: i32,
}

/// An enrollment joined with the participant's display name.
#[derive(Debug, Clone)]
pub struct ChallengeParticipant {
    pub enrollment: ChallengeEnrollment,
    pub user_name: String,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait NutritionStore: Send + Sync {
    // --- Accounts & Auth ---
    async fn create_user(&self, new_user: NewUser) -> PortResult<UserProfile>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<UserProfile>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate)
        -> PortResult<UserProfile>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Daily Targets ---
    async fn get_daily_target(&self, user_id: Uuid, date: NaiveDate) -> PortResult<DailyTarget>;

    /// Deletes any target for the date and writes a fresh one atomically.
    async fn replace_daily_target(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        goal: NutritionFacts,
    ) -> PortResult<DailyTarget>;

    // --- Food Ledger ---
    /// Creates the day's entry from `delta`, or adds `delta` into the
    /// existing entry and appends `description` to its log. Must be a single
    /// conditional-increment write so concurrent submissions for the same
    /// day cannot lose updates.
    async fn upsert_ledger_entry(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        delta: &NutritionFacts,
        description: &str,
    ) -> PortResult<LedgerEntry>;

    async fn get_ledger_entry(&self, user_id: Uuid, date: NaiveDate) -> PortResult<LedgerEntry>;

    /// Claims the day's one-time completion marker. Returns true only for
    /// the single caller that flips it; repeat and concurrent claims see
    /// false.
    async fn mark_day_completed(&self, user_id: Uuid, date: NaiveDate) -> PortResult<bool>;

    // --- Reward Score ---
    /// Adds `amount` to the user's health score, saturating at `cap`.
    /// Returns the new score.
    async fn credit_health_points(&self, user_id: Uuid, amount: i32, cap: i32) -> PortResult<i32>;

    /// Debits `cost` only when the balance covers it; fails with
    /// `InsufficientPoints` otherwise. Returns the remaining score.
    async fn debit_health_points(&self, user_id: Uuid, cost: i32) -> PortResult<i32>;

    // --- Gamification ---
    async fn get_or_create_gamification(&self, user_id: Uuid) -> PortResult<GamificationState>;

    async fn save_gamification(&self, state: &GamificationState) -> PortResult<()>;

    async fn has_achievement(&self, user_id: Uuid, kind: AchievementKind) -> PortResult<bool>;

    async fn insert_achievement(&self, achievement: Achievement) -> PortResult<()>;

    async fn list_achievements(&self, user_id: Uuid, limit: i64) -> PortResult<Vec<Achievement>>;

    async fn leaderboard(&self, limit: i64) -> PortResult<Vec<LeaderboardRow>>;

    // --- Challenges ---
    async fn create_challenge(&self, challenge: Challenge) -> PortResult<Challenge>;

    async fn list_challenges(&self) -> PortResult<Vec<Challenge>>;

    async fn get_challenge(&self, challenge_id: Uuid) -> PortResult<Challenge>;

    /// Enrolls the user with status `active` and zero progress. A second
    /// active enrollment for the same (user, challenge) pair must be
    /// rejected at write time with `AlreadyEnrolled`.
    async fn join_challenge(
        &self,
        user_id: Uuid,
        challenge_id: Uuid,
    ) -> PortResult<ChallengeEnrollment>;

    async fn active_enrollments(&self, user_id: Uuid) -> PortResult<Vec<ChallengeEnrollment>>;

    async fn save_enrollment(&self, enrollment: &ChallengeEnrollment) -> PortResult<()>;

    async fn challenge_participants(
        &self,
        challenge_id: Uuid,
    ) -> PortResult<Vec<ChallengeParticipant>>;

    // --- Partner Offers ---
    async fn list_partner_offers(&self) -> PortResult<Vec<PartnerOffer>>;

    async fn get_partner_offer(&self, partner_id: Uuid) -> PortResult<PartnerOffer>;

    async fn insert_redemption(&self, redemption: Redemption) -> PortResult<()>;

    async fn redemption_history(&self, user_id: Uuid) -> PortResult<Vec<Redemption>>;
}

#[async_trait]
pub trait NutritionEstimator: Send + Sync {
    /// Estimates the daily nutrition goal for a complete profile.
    async fn estimate_daily_target(&self, profile: &CompleteProfile)
        -> PortResult<NutritionFacts>;

    /// Parses a free-text food description into consumed quantities.
    async fn analyze_food_text(&self, description: &str) -> PortResult<NutritionFacts>;
}
