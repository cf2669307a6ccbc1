//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `NutritionStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use healthpilot_core::domain::{
    Achievement, AchievementKind, Challenge, ChallengeEnrollment, DailyTarget, GamificationState,
    LedgerEntry, NutritionFacts, PartnerOffer, Redemption, UserCredentials, UserProfile,
};
use healthpilot_core::ports::{
    ChallengeParticipant, LeaderboardRow, NewUser, NutritionStore, PortError, PortResult,
    ProfileUpdate,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `NutritionStore` port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found(what: &str, e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what.to_string()),
        other => PortError::Unexpected(other.to_string()),
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db) if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
    )
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    name: String,
    age: i32,
    weight_kg: f64,
    height_cm: f64,
    sex: Option<String>,
    activity: Option<String>,
    goal: Option<String>,
    health_score: i32,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email,
            name: self.name,
            age: self.age,
            weight_kg: self.weight_kg,
            height_cm: self.height_cm,
            // These columns are only ever written from validated enums; an
            // unknown value is treated the same as an unset attribute.
            sex: self.sex.and_then(|s| s.parse().ok()),
            activity: self.activity.and_then(|s| s.parse().ok()),
            goal: self.goal.and_then(|s| s.parse().ok()),
            health_score: self.health_score,
            created_at: self.created_at,
        }
    }
}

const USER_COLUMNS: &str =
    "id, email, name, age, weight_kg, height_cm, sex, activity, goal, health_score, created_at";

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct TargetRecord {
    id: Uuid,
    user_id: Uuid,
    date: NaiveDate,
    calories: f64,
    protein: f64,
    carbs: f64,
    fat: f64,
    water: f64,
    created_at: DateTime<Utc>,
}
impl TargetRecord {
    fn to_domain(self) -> DailyTarget {
        DailyTarget {
            id: self.id,
            user_id: self.user_id,
            date: self.date,
            goal: NutritionFacts {
                calories: self.calories,
                protein: self.protein,
                carbs: self.carbs,
                fat: self.fat,
                water: self.water,
            },
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct LedgerRecord {
    id: Uuid,
    user_id: Uuid,
    date: NaiveDate,
    calories: f64,
    protein: f64,
    carbs: f64,
    fat: f64,
    water: f64,
    description: String,
    completed: bool,
    updated_at: DateTime<Utc>,
}
impl LedgerRecord {
    fn to_domain(self) -> LedgerEntry {
        LedgerEntry {
            id: self.id,
            user_id: self.user_id,
            date: self.date,
            consumed: NutritionFacts {
                calories: self.calories,
                protein: self.protein,
                carbs: self.carbs,
                fat: self.fat,
                water: self.water,
            },
            description: self.description,
            completed: self.completed,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct GamificationRecord {
    user_id: Uuid,
    level: i32,
    experience: i32,
    streak: i32,
    total_days: i32,
    last_active_on: Option<NaiveDate>,
    last_seen_at: DateTime<Utc>,
    calories_goal: i32,
    protein_goal: i32,
    water_goal: i32,
}
impl GamificationRecord {
    fn to_domain(self) -> GamificationState {
        GamificationState {
            user_id: self.user_id,
            level: self.level,
            experience: self.experience,
            streak: self.streak,
            total_days: self.total_days,
            last_active_on: self.last_active_on,
            last_seen_at: self.last_seen_at,
            calories_goal: self.calories_goal,
            protein_goal: self.protein_goal,
            water_goal: self.water_goal,
        }
    }
}

#[derive(FromRow)]
struct AchievementRecord {
    id: Uuid,
    user_id: Uuid,
    kind: String,
    name: String,
    earned_at: DateTime<Utc>,
}
impl AchievementRecord {
    fn to_domain(self) -> PortResult<Achievement> {
        Ok(Achievement {
            id: self.id,
            user_id: self.user_id,
            kind: self.kind.parse().map_err(PortError::Unexpected)?,
            name: self.name,
            earned_at: self.earned_at,
        })
    }
}

#[derive(FromRow)]
struct ChallengeRecord {
    id: Uuid,
    name: String,
    kind: String,
    description: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    reward_points: i32,
}
impl ChallengeRecord {
    fn to_domain(self) -> PortResult<Challenge> {
        Ok(Challenge {
            id: self.id,
            name: self.name,
            kind: self.kind.parse().map_err(PortError::Unexpected)?,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            reward_points: self.reward_points,
        })
    }
}

#[derive(FromRow)]
struct EnrollmentRecord {
    id: Uuid,
    user_id: Uuid,
    challenge_id: Uuid,
    progress: i32,
    status: String,
    awarded_points: i32,
    joined_at: DateTime<Utc>,
}
impl EnrollmentRecord {
    fn to_domain(self) -> PortResult<ChallengeEnrollment> {
        Ok(ChallengeEnrollment {
            id: self.id,
            user_id: self.user_id,
            challenge_id: self.challenge_id,
            progress: self.progress,
            status: self.status.parse().map_err(PortError::Unexpected)?,
            awarded_points: self.awarded_points,
            joined_at: self.joined_at,
        })
    }
}

#[derive(FromRow)]
struct ParticipantRecord {
    id: Uuid,
    user_id: Uuid,
    challenge_id: Uuid,
    progress: i32,
    status: String,
    awarded_points: i32,
    joined_at: DateTime<Utc>,
    user_name: String,
}

#[derive(FromRow)]
struct PartnerRecord {
    id: Uuid,
    name: String,
    description: String,
    points_cost: i32,
    discount_min: f64,
    discount_max: f64,
    is_active: bool,
}
impl PartnerRecord {
    fn to_domain(self) -> PartnerOffer {
        PartnerOffer {
            id: self.id,
            name: self.name,
            description: self.description,
            points_cost: self.points_cost,
            discount_min: self.discount_min,
            discount_max: self.discount_max,
            is_active: self.is_active,
        }
    }
}

#[derive(FromRow)]
struct RedemptionRecord {
    id: Uuid,
    user_id: Uuid,
    partner_id: Uuid,
    points_spent: i32,
    discount_amount: f64,
    redeemed_at: DateTime<Utc>,
}
impl RedemptionRecord {
    fn to_domain(self) -> Redemption {
        Redemption {
            id: self.id,
            user_id: self.user_id,
            partner_id: self.partner_id,
            points_spent: self.points_spent,
            discount_amount: self.discount_amount,
            redeemed_at: self.redeemed_at,
        }
    }
}

#[derive(FromRow)]
struct ScoreRecord {
    health_score: i32,
}

//=========================================================================================
// `NutritionStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl NutritionStore for PgStore {
    async fn create_user(&self, new_user: NewUser) -> PortResult<UserProfile> {
        let sql = format!(
            "INSERT INTO users (id, email, name, hashed_password, age, weight_kg, height_cm, sex, activity, goal) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {USER_COLUMNS}"
        );
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_user.email)
            .bind(&new_user.name)
            .bind(&new_user.hashed_password)
            .bind(new_user.age)
            .bind(new_user.weight_kg)
            .bind(new_user.height_cm)
            .bind(new_user.sex.map(|s| s.as_str()))
            .bind(new_user.activity.map(|a| a.as_str()))
            .bind(new_user.goal.map(|g| g.as_str()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    PortError::Conflict("A user with this email already exists".to_string())
                } else {
                    unexpected(e)
                }
            })?;
        Ok(record.to_domain())
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<UserProfile> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found("User not found", e))?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found("User not found", e))?;
        Ok(record.to_domain())
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> PortResult<UserProfile> {
        // COALESCE keeps the stored value for every field the update leaves
        // unset, so one statement covers any combination of changes.
        let sql = format!(
            "UPDATE users SET \
                name = COALESCE($2, name), \
                hashed_password = COALESCE($3, hashed_password), \
                age = COALESCE($4, age), \
                weight_kg = COALESCE($5, weight_kg), \
                height_cm = COALESCE($6, height_cm), \
                sex = COALESCE($7, sex), \
                activity = COALESCE($8, activity), \
                goal = COALESCE($9, goal) \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .bind(update.name)
            .bind(update.hashed_password)
            .bind(update.age)
            .bind(update.weight_kg)
            .bind(update.height_cm)
            .bind(update.sex.map(|s| s.as_str()))
            .bind(update.activity.map(|a| a.as_str()))
            .bind(update.goal.map(|g| g.as_str()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found("User not found", e))?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let row: (Uuid,) = sqlx::query_as(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            other => unexpected(other),
        })?;
        Ok(row.0)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn get_daily_target(&self, user_id: Uuid, date: NaiveDate) -> PortResult<DailyTarget> {
        let record = sqlx::query_as::<_, TargetRecord>(
            "SELECT id, user_id, date, calories, protein, carbs, fat, water, created_at \
             FROM daily_targets WHERE user_id = $1 AND date = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found("Daily target not found", e))?;
        Ok(record.to_domain())
    }

    async fn replace_daily_target(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        goal: NutritionFacts,
    ) -> PortResult<DailyTarget> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query("DELETE FROM daily_targets WHERE user_id = $1 AND date = $2")
            .bind(user_id)
            .bind(date)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        let record = sqlx::query_as::<_, TargetRecord>(
            "INSERT INTO daily_targets (id, user_id, date, calories, protein, carbs, fat, water) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id, user_id, date, calories, protein, carbs, fat, water, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(date)
        .bind(goal.calories)
        .bind(goal.protein)
        .bind(goal.carbs)
        .bind(goal.fat)
        .bind(goal.water)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn upsert_ledger_entry(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        delta: &NutritionFacts,
        description: &str,
    ) -> PortResult<LedgerEntry> {
        // Single conditional-increment statement; concurrent submissions for
        // the same day serialize on the row instead of losing updates.
        let record = sqlx::query_as::<_, LedgerRecord>(
            "INSERT INTO daily_ledger (id, user_id, date, calories, protein, carbs, fat, water, description) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (user_id, date) DO UPDATE SET \
                calories = daily_ledger.calories + EXCLUDED.calories, \
                protein = daily_ledger.protein + EXCLUDED.protein, \
                carbs = daily_ledger.carbs + EXCLUDED.carbs, \
                fat = daily_ledger.fat + EXCLUDED.fat, \
                water = daily_ledger.water + EXCLUDED.water, \
                description = trim(both '; ' from daily_ledger.description || '; ' || EXCLUDED.description), \
                updated_at = now() \
             RETURNING id, user_id, date, calories, protein, carbs, fat, water, description, completed, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(date)
        .bind(delta.calories)
        .bind(delta.protein)
        .bind(delta.carbs)
        .bind(delta.fat)
        .bind(delta.water)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_ledger_entry(&self, user_id: Uuid, date: NaiveDate) -> PortResult<LedgerEntry> {
        let record = sqlx::query_as::<_, LedgerRecord>(
            "SELECT id, user_id, date, calories, protein, carbs, fat, water, description, completed, updated_at \
             FROM daily_ledger WHERE user_id = $1 AND date = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found("No food logged for this day", e))?;
        Ok(record.to_domain())
    }

    async fn mark_day_completed(&self, user_id: Uuid, date: NaiveDate) -> PortResult<bool> {
        // The FALSE guard makes the claim atomic; only one submission per
        // day can flip the marker.
        let result = sqlx::query(
            "UPDATE daily_ledger SET completed = TRUE \
             WHERE user_id = $1 AND date = $2 AND completed = FALSE",
        )
        .bind(user_id)
        .bind(date)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn credit_health_points(&self, user_id: Uuid, amount: i32, cap: i32) -> PortResult<i32> {
        let record = sqlx::query_as::<_, ScoreRecord>(
            "UPDATE users SET health_score = LEAST(health_score + $2, $3) \
             WHERE id = $1 RETURNING health_score",
        )
        .bind(user_id)
        .bind(amount)
        .bind(cap)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found("User not found", e))?;
        Ok(record.health_score)
    }

    async fn debit_health_points(&self, user_id: Uuid, cost: i32) -> PortResult<i32> {
        // The balance check is part of the statement: no row updated means
        // the score did not cover the cost (or the user is gone).
        let record = sqlx::query_as::<_, ScoreRecord>(
            "UPDATE users SET health_score = health_score - $2 \
             WHERE id = $1 AND health_score >= $2 RETURNING health_score",
        )
        .bind(user_id)
        .bind(cost)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        match record {
            Some(r) => Ok(r.health_score),
            None => {
                self.get_user(user_id).await?;
                Err(PortError::InsufficientPoints)
            }
        }
    }

    async fn get_or_create_gamification(&self, user_id: Uuid) -> PortResult<GamificationState> {
        let record = sqlx::query_as::<_, GamificationRecord>(
            "INSERT INTO gamification (user_id) VALUES ($1) \
             ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id \
             RETURNING user_id, level, experience, streak, total_days, last_active_on, \
                       last_seen_at, calories_goal, protein_goal, water_goal",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn save_gamification(&self, state: &GamificationState) -> PortResult<()> {
        sqlx::query(
            "UPDATE gamification SET level = $2, experience = $3, streak = $4, total_days = $5, \
                last_active_on = $6, last_seen_at = $7, calories_goal = $8, protein_goal = $9, \
                water_goal = $10 \
             WHERE user_id = $1",
        )
        .bind(state.user_id)
        .bind(state.level)
        .bind(state.experience)
        .bind(state.streak)
        .bind(state.total_days)
        .bind(state.last_active_on)
        .bind(state.last_seen_at)
        .bind(state.calories_goal)
        .bind(state.protein_goal)
        .bind(state.water_goal)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn has_achievement(&self, user_id: Uuid, kind: AchievementKind) -> PortResult<bool> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM achievements WHERE user_id = $1 AND kind = $2)",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(row.0)
    }

    async fn insert_achievement(&self, achievement: Achievement) -> PortResult<()> {
        // The unique index backs up the caller's existence check; a race
        // between two completions of the same day must not duplicate awards.
        sqlx::query(
            "INSERT INTO achievements (id, user_id, kind, name, earned_at) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT (user_id, kind) DO NOTHING",
        )
        .bind(achievement.id)
        .bind(achievement.user_id)
        .bind(achievement.kind.as_str())
        .bind(&achievement.name)
        .bind(achievement.earned_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn list_achievements(&self, user_id: Uuid, limit: i64) -> PortResult<Vec<Achievement>> {
        let records = sqlx::query_as::<_, AchievementRecord>(
            "SELECT id, user_id, kind, name, earned_at FROM achievements \
             WHERE user_id = $1 ORDER BY earned_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn leaderboard(&self, limit: i64) -> PortResult<Vec<LeaderboardRow>> {
        let records = sqlx::query_as::<_, (Uuid, String, i32, i32, i32, i32)>(
            "SELECT g.user_id, u.name, g.level, g.experience, g.streak, g.total_days \
             FROM gamification g JOIN users u ON u.id = g.user_id \
             ORDER BY g.level DESC, g.experience DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records
            .into_iter()
            .map(
                |(user_id, name, level, experience, streak, total_days)| LeaderboardRow {
                    user_id,
                    name,
                    level,
                    experience,
                    streak,
                    total_days,
                },
            )
            .collect())
    }

    async fn create_challenge(&self, challenge: Challenge) -> PortResult<Challenge> {
        let record = sqlx::query_as::<_, ChallengeRecord>(
            "INSERT INTO challenges (id, name, kind, description, start_date, end_date, reward_points) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, name, kind, description, start_date, end_date, reward_points",
        )
        .bind(challenge.id)
        .bind(&challenge.name)
        .bind(challenge.kind.as_str())
        .bind(&challenge.description)
        .bind(challenge.start_date)
        .bind(challenge.end_date)
        .bind(challenge.reward_points)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn list_challenges(&self) -> PortResult<Vec<Challenge>> {
        let records = sqlx::query_as::<_, ChallengeRecord>(
            "SELECT id, name, kind, description, start_date, end_date, reward_points \
             FROM challenges ORDER BY start_date DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_challenge(&self, challenge_id: Uuid) -> PortResult<Challenge> {
        let record = sqlx::query_as::<_, ChallengeRecord>(
            "SELECT id, name, kind, description, start_date, end_date, reward_points \
             FROM challenges WHERE id = $1",
        )
        .bind(challenge_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found("Challenge not found", e))?;
        record.to_domain()
    }

    async fn join_challenge(
        &self,
        user_id: Uuid,
        challenge_id: Uuid,
    ) -> PortResult<ChallengeEnrollment> {
        self.get_challenge(challenge_id).await?;
        let record = sqlx::query_as::<_, EnrollmentRecord>(
            "INSERT INTO challenge_enrollments (id, user_id, challenge_id, progress, status, awarded_points) \
             VALUES ($1, $2, $3, 0, 'active', 0) \
             RETURNING id, user_id, challenge_id, progress, status, awarded_points, joined_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(challenge_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::AlreadyEnrolled
            } else {
                unexpected(e)
            }
        })?;
        record.to_domain()
    }

    async fn active_enrollments(&self, user_id: Uuid) -> PortResult<Vec<ChallengeEnrollment>> {
        let records = sqlx::query_as::<_, EnrollmentRecord>(
            "SELECT id, user_id, challenge_id, progress, status, awarded_points, joined_at \
             FROM challenge_enrollments WHERE user_id = $1 AND status = 'active'",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn save_enrollment(&self, enrollment: &ChallengeEnrollment) -> PortResult<()> {
        sqlx::query(
            "UPDATE challenge_enrollments SET progress = $2, status = $3, awarded_points = $4 \
             WHERE id = $1",
        )
        .bind(enrollment.id)
        .bind(enrollment.progress)
        .bind(enrollment.status.as_str())
        .bind(enrollment.awarded_points)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn challenge_participants(
        &self,
        challenge_id: Uuid,
    ) -> PortResult<Vec<ChallengeParticipant>> {
        let records = sqlx::query_as::<_, ParticipantRecord>(
            "SELECT e.id, e.user_id, e.challenge_id, e.progress, e.status, e.awarded_points, \
                    e.joined_at, u.name AS user_name \
             FROM challenge_enrollments e JOIN users u ON u.id = e.user_id \
             WHERE e.challenge_id = $1 ORDER BY e.progress DESC",
        )
        .bind(challenge_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records
            .into_iter()
            .map(|r| {
                let user_name = r.user_name;
                let enrollment = EnrollmentRecord {
                    id: r.id,
                    user_id: r.user_id,
                    challenge_id: r.challenge_id,
                    progress: r.progress,
                    status: r.status,
                    awarded_points: r.awarded_points,
                    joined_at: r.joined_at,
                }
                .to_domain()?;
                Ok(ChallengeParticipant {
                    enrollment,
                    user_name,
                })
            })
            .collect()
    }

    async fn list_partner_offers(&self) -> PortResult<Vec<PartnerOffer>> {
        let records = sqlx::query_as::<_, PartnerRecord>(
            "SELECT id, name, description, points_cost, discount_min, discount_max, is_active \
             FROM partner_offers WHERE is_active = TRUE ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_partner_offer(&self, partner_id: Uuid) -> PortResult<PartnerOffer> {
        let record = sqlx::query_as::<_, PartnerRecord>(
            "SELECT id, name, description, points_cost, discount_min, discount_max, is_active \
             FROM partner_offers WHERE id = $1",
        )
        .bind(partner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found("Partner offer not found", e))?;
        Ok(record.to_domain())
    }

    async fn insert_redemption(&self, redemption: Redemption) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO redemptions (id, user_id, partner_id, points_spent, discount_amount, redeemed_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(redemption.id)
        .bind(redemption.user_id)
        .bind(redemption.partner_id)
        .bind(redemption.points_spent)
        .bind(redemption.discount_amount)
        .bind(redemption.redeemed_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn redemption_history(&self, user_id: Uuid) -> PortResult<Vec<Redemption>> {
        let records = sqlx::query_as::<_, RedemptionRecord>(
            "SELECT id, user_id, partner_id, points_spent, discount_amount, redeemed_at \
             FROM redemptions WHERE user_id = $1 ORDER BY redeemed_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}
