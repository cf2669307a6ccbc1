//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::auth::parse_attr;
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, NaiveDate, Utc};
use healthpilot_core::{
    domain::{Achievement, Challenge, ChallengeKind, NutritionFacts, Redemption},
    ports::{PortError, ProfileUpdate},
    rules,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        record_food_handler,
        get_food_handler,
        get_target_handler,
        target_status_handler,
        update_profile_handler,
        health_score_handler,
        gamification_handler,
        achievements_handler,
        leaderboard_handler,
        create_challenge_handler,
        list_challenges_handler,
        join_challenge_handler,
        challenge_participants_handler,
        list_partners_handler,
        redeem_handler,
        redemption_history_handler,
    ),
    components(schemas(
        crate::web::auth::SignupRequest,
        crate::web::auth::LoginRequest,
        crate::web::auth::AuthResponse,
        NutritionPayload,
        RecordFoodRequest,
        RecordFoodResponse,
        FoodLogResponse,
        TargetResponse,
        TargetStatusResponse,
        UpdateProfileRequest,
        ProfileResponse,
        HealthScoreResponse,
        GamificationResponse,
        AchievementPayload,
        LeaderboardEntry,
        CreateChallengeRequest,
        ChallengePayload,
        JoinChallengeRequest,
        EnrollmentPayload,
        ParticipantPayload,
        PartnerPayload,
        RedeemRequest,
        RedeemResponse,
        RedemptionPayload,
    )),
    tags(
        (name = "HealthPilot API", description = "API endpoints for the nutrition and fitness tracker.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// Nutrition quantities as they appear on the wire.
#[derive(Serialize, Deserialize, ToSchema, Clone, Copy)]
pub struct NutritionPayload {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub water: f64,
}

impl From<NutritionFacts> for NutritionPayload {
    fn from(f: NutritionFacts) -> Self {
        Self {
            calories: f.calories,
            protein: f.protein,
            carbs: f.carbs,
            fat: f.fat,
            water: f.water,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct RecordFoodRequest {
    /// Free-text description of what was eaten, e.g. "two eggs and a slice of toast".
    pub description: String,
}

#[derive(Serialize, ToSchema)]
pub struct RecordFoodResponse {
    /// What the analyzer extracted from this submission alone.
    pub parsed: NutritionPayload,
    /// The day's running totals after this submission.
    pub consumed: NutritionPayload,
    pub health_score: i32,
    pub day_completed: bool,
    pub level: i32,
    pub experience: i32,
    pub streak: i32,
    /// Titles of achievements earned by this submission, usually empty.
    pub new_achievements: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct FoodLogResponse {
    pub date: NaiveDate,
    pub consumed: NutritionPayload,
    pub description: String,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct TargetResponse {
    pub date: NaiveDate,
    pub goal: NutritionPayload,
}

#[derive(Serialize, ToSchema)]
pub struct TargetStatusResponse {
    pub date: NaiveDate,
    pub goal: NutritionPayload,
    pub consumed: NutritionPayload,
    /// How much is left per nutrient, floored at zero.
    pub remaining: NutritionPayload,
    pub completed: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub activity: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub age: i32,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub sex: Option<String>,
    pub activity: Option<String>,
    pub goal: Option<String>,
    pub health_score: i32,
}

#[derive(Serialize, ToSchema)]
pub struct HealthScoreResponse {
    pub health_score: i32,
}

#[derive(Serialize, ToSchema)]
pub struct GamificationResponse {
    pub user_id: Uuid,
    pub level: i32,
    pub experience: i32,
    pub experience_to_next: i32,
    pub streak: i32,
    pub total_days: i32,
    pub last_active_on: Option<NaiveDate>,
    pub calories_goal: i32,
    pub protein_goal: i32,
    pub water_goal: i32,
    pub recent_achievements: Vec<AchievementPayload>,
}

#[derive(Serialize, ToSchema)]
pub struct AchievementPayload {
    pub id: Uuid,
    pub kind: String,
    pub name: String,
    pub earned_at: DateTime<Utc>,
}

impl From<Achievement> for AchievementPayload {
    fn from(a: Achievement) -> Self {
        Self {
            id: a.id,
            kind: a.kind.as_str().to_string(),
            name: a.name,
            earned_at: a.earned_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LeaderboardEntry {
    pub user_id: Uuid,
    pub name: String,
    pub level: i32,
    pub experience: i32,
    pub streak: i32,
    pub total_days: i32,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateChallengeRequest {
    pub name: String,
    /// One of: weekly_target, monthly_target, steps_5000, steps_10000.
    pub kind: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reward_points: i32,
}

#[derive(Serialize, ToSchema)]
pub struct ChallengePayload {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reward_points: i32,
    pub required_days: i32,
}

impl From<Challenge> for ChallengePayload {
    fn from(c: Challenge) -> Self {
        Self {
            id: c.id,
            name: c.name,
            kind: c.kind.as_str().to_string(),
            description: c.description,
            start_date: c.start_date,
            end_date: c.end_date,
            reward_points: c.reward_points,
            required_days: c.kind.required_days(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct JoinChallengeRequest {
    pub challenge_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct EnrollmentPayload {
    pub id: Uuid,
    pub challenge_id: Uuid,
    pub progress: i32,
    pub status: String,
    pub awarded_points: i32,
    pub joined_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct ParticipantPayload {
    pub user_id: Uuid,
    pub user_name: String,
    pub progress: i32,
    pub status: String,
    /// Human-readable progress, e.g. "4/7 days".
    pub result: String,
}

#[derive(Serialize, ToSchema)]
pub struct PartnerPayload {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub points_cost: i32,
    pub discount_min: f64,
    pub discount_max: f64,
}

#[derive(Deserialize, ToSchema)]
pub struct RedeemRequest {
    pub partner_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct RedeemResponse {
    pub redemption_id: Uuid,
    pub partner_id: Uuid,
    pub discount_amount: f64,
    pub points_spent: i32,
    pub remaining_score: i32,
}

#[derive(Serialize, ToSchema)]
pub struct RedemptionPayload {
    pub id: Uuid,
    pub partner_id: Uuid,
    pub points_spent: i32,
    pub discount_amount: f64,
    pub redeemed_at: DateTime<Utc>,
}

impl From<Redemption> for RedemptionPayload {
    fn from(r: Redemption) -> Self {
        Self {
            id: r.id,
            partner_id: r.partner_id,
            points_spent: r.points_spent,
            discount_amount: r.discount_amount,
            redeemed_at: r.redeemed_at,
        }
    }
}

/// Optional date filter for day-scoped lookups; defaults to today (UTC).
#[derive(Deserialize, IntoParams)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

/// Optional row cap for list endpoints.
#[derive(Deserialize, IntoParams)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

//=========================================================================================
// Shared Handler Helpers
//=========================================================================================

/// Translates a port failure into the HTTP response the client sees.
fn port_error(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        PortError::AlreadyEnrolled => (
            StatusCode::CONFLICT,
            "Already enrolled in this challenge".to_string(),
        ),
        PortError::InsufficientPoints => (
            StatusCode::BAD_REQUEST,
            "Insufficient health points".to_string(),
        ),
        PortError::Upstream(msg) => {
            error!("Upstream service failure: {msg}");
            (StatusCode::BAD_GATEWAY, "Upstream service failed".to_string())
        }
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Unexpected(msg) => {
            error!("Unexpected port error: {msg}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

/// A session may only act on its own resources.
fn authorize(auth_user: Uuid, path_user: Uuid) -> Result<(), (StatusCode, String)> {
    if auth_user == path_user {
        Ok(())
    } else {
        Err((
            StatusCode::FORBIDDEN,
            "Cannot access another user's data".to_string(),
        ))
    }
}

fn remaining(goal: &NutritionFacts, consumed: &NutritionFacts) -> NutritionFacts {
    NutritionFacts {
        calories: (goal.calories - consumed.calories).max(0.0),
        protein: (goal.protein - consumed.protein).max(0.0),
        carbs: (goal.carbs - consumed.carbs).max(0.0),
        fat: (goal.fat - consumed.fat).max(0.0),
        water: (goal.water - consumed.water).max(0.0),
    }
}

//=========================================================================================
// Food Ledger Handlers
//=========================================================================================

/// Record eaten food from a free-text description.
///
/// Runs the full daily pipeline: analyze the text, fold it into today's
/// ledger, credit health points, and re-evaluate completion, streak,
/// achievements and challenge progress.
#[utoipa::path(
    post,
    path = "/users/{user_id}/food",
    request_body = RecordFoodRequest,
    responses(
        (status = 200, description = "Food recorded", body = RecordFoodResponse),
        (status = 400, description = "Empty description"),
        (status = 403, description = "Not the session user"),
        (status = 502, description = "Nutrition analysis failed")
    ),
    params(("user_id" = Uuid, Path, description = "The user recording the food."))
)]
pub async fn record_food_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<Uuid>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<RecordFoodRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    authorize(auth_user, user_id)?;
    let description = req.description.trim();
    if description.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Food description must not be empty".to_string(),
        ));
    }

    // 1. Parse the description into nutrition quantities.
    let parsed = state
        .estimator
        .analyze_food_text(description)
        .await
        .map_err(port_error)?;

    // 2. Fold it into today's ledger in one atomic write.
    let now = Utc::now();
    let today = now.date_naive();
    let entry = state
        .store
        .upsert_ledger_entry(user_id, today, &parsed, description)
        .await
        .map_err(port_error)?;

    // 3. Credit the flat per-log reward, saturating at the cap.
    let health_score = state
        .store
        .credit_health_points(user_id, rules::FOOD_LOG_POINTS, rules::HEALTH_SCORE_CAP)
        .await
        .map_err(port_error)?;

    // 4. Evaluate the day against the target, if one exists.
    let target = match state.store.get_daily_target(user_id, today).await {
        Ok(t) => Some(t),
        Err(PortError::NotFound(_)) => None,
        Err(e) => return Err(port_error(e)),
    };
    let goal = target.as_ref().map(|t| &t.goal);
    let day_completed = rules::day_completed(Some(&entry.consumed), goal);

    // 5. Update the gamification state.
    let mut gamification = state
        .store
        .get_or_create_gamification(user_id)
        .await
        .map_err(port_error)?;
    gamification.record_activity(today, now);

    // Completion XP and challenge progress fire once, on the submission
    // that tips the day over the target. The ledger row's marker decides;
    // claiming it is an atomic write, so neither a repeat submission nor a
    // concurrent one re-fires the awards.
    let mut health_score = health_score;
    if rules::completion_award_due(day_completed, entry.completed)
        && state
            .store
            .mark_day_completed(user_id, today)
            .await
            .map_err(port_error)?
    {
        info!("User {user_id} completed their daily target for {today}.");
        gamification.add_experience(rules::DAILY_COMPLETION_XP);
        health_score = advance_challenges(&state, user_id, health_score)
            .await
            .map_err(port_error)?;
    }

    // 6. Award any achievements whose thresholds were just crossed. The
    //    existence check makes re-crossing a threshold a no-op.
    let mut new_achievements = Vec::new();
    for kind in gamification.pending_achievements() {
        let already = state
            .store
            .has_achievement(user_id, kind)
            .await
            .map_err(port_error)?;
        if already {
            continue;
        }
        state
            .store
            .insert_achievement(Achievement {
                id: Uuid::new_v4(),
                user_id,
                kind,
                name: kind.title().to_string(),
                earned_at: now,
            })
            .await
            .map_err(port_error)?;
        gamification.add_experience(rules::ACHIEVEMENT_XP);
        new_achievements.push(kind.title().to_string());
    }

    state
        .store
        .save_gamification(&gamification)
        .await
        .map_err(port_error)?;

    Ok(Json(RecordFoodResponse {
        parsed: parsed.into(),
        consumed: entry.consumed.into(),
        health_score,
        day_completed,
        level: gamification.level,
        experience: gamification.experience,
        streak: gamification.streak,
        new_achievements,
    }))
}

/// Walks the user's active enrollments one day forward, crediting rewards
/// for any challenge that just completed. Returns the updated health score.
async fn advance_challenges(
    state: &AppState,
    user_id: Uuid,
    mut health_score: i32,
) -> Result<i32, PortError> {
    let enrollments = state.store.active_enrollments(user_id).await?;
    for mut enrollment in enrollments {
        let challenge = state.store.get_challenge(enrollment.challenge_id).await?;
        let completed = enrollment.advance(challenge.kind, challenge.reward_points);
        state.store.save_enrollment(&enrollment).await?;
        if completed {
            info!(
                "User {user_id} completed challenge '{}' (+{} points).",
                challenge.name, challenge.reward_points
            );
            health_score = state
                .store
                .credit_health_points(user_id, challenge.reward_points, rules::HEALTH_SCORE_CAP)
                .await?;
        }
    }
    Ok(health_score)
}

/// Get the food ledger entry for a day (today by default).
#[utoipa::path(
    get,
    path = "/users/{user_id}/food",
    responses(
        (status = 200, description = "The day's ledger entry", body = FoodLogResponse),
        (status = 404, description = "Nothing logged for this day")
    ),
    params(
        ("user_id" = Uuid, Path, description = "The user whose ledger to read."),
        DateQuery
    )
)]
pub async fn get_food_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<Uuid>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<DateQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    authorize(auth_user, user_id)?;
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let entry = state
        .store
        .get_ledger_entry(user_id, date)
        .await
        .map_err(port_error)?;
    Ok(Json(FoodLogResponse {
        date: entry.date,
        consumed: entry.consumed.into(),
        description: entry.description,
        completed: entry.completed,
        updated_at: entry.updated_at,
    }))
}

//=========================================================================================
// Daily Target Handlers
//=========================================================================================

/// Get the daily nutrition target for a day (today by default).
#[utoipa::path(
    get,
    path = "/users/{user_id}/target",
    responses(
        (status = 200, description = "The day's target", body = TargetResponse),
        (status = 404, description = "No target computed for this day")
    ),
    params(
        ("user_id" = Uuid, Path, description = "The user whose target to read."),
        DateQuery
    )
)]
pub async fn get_target_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<Uuid>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<DateQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    authorize(auth_user, user_id)?;
    let today = Utc::now().date_naive();
    let date = query.date.unwrap_or(today);
    let target = match state.store.get_daily_target(user_id, date).await {
        Ok(t) => t,
        // Today's target is created on demand the first time it is asked
        // for, provided the profile is complete enough to estimate from.
        Err(PortError::NotFound(msg)) if date == today => {
            let user = state.store.get_user(user_id).await.map_err(port_error)?;
            let profile = user
                .complete_profile()
                .ok_or((StatusCode::NOT_FOUND, msg))?;
            let goal = state
                .estimator
                .estimate_daily_target(&profile)
                .await
                .map_err(port_error)?;
            state
                .store
                .replace_daily_target(user_id, today, goal)
                .await
                .map_err(port_error)?
        }
        Err(e) => return Err(port_error(e)),
    };
    Ok(Json(TargetResponse {
        date: target.date,
        goal: target.goal.into(),
    }))
}

/// Get progress toward the day's target.
#[utoipa::path(
    get,
    path = "/users/{user_id}/target/status",
    responses(
        (status = 200, description = "Progress toward the day's target", body = TargetStatusResponse),
        (status = 404, description = "No target computed for this day")
    ),
    params(
        ("user_id" = Uuid, Path, description = "The user whose progress to read."),
        DateQuery
    )
)]
pub async fn target_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<Uuid>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<DateQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    authorize(auth_user, user_id)?;
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let target = state
        .store
        .get_daily_target(user_id, date)
        .await
        .map_err(port_error)?;
    // A day with no ledger entry simply has zero consumption.
    let consumed = match state.store.get_ledger_entry(user_id, date).await {
        Ok(entry) => entry.consumed,
        Err(PortError::NotFound(_)) => NutritionFacts::default(),
        Err(e) => return Err(port_error(e)),
    };
    let completed = rules::day_completed(Some(&consumed), Some(&target.goal));
    Ok(Json(TargetStatusResponse {
        date,
        remaining: remaining(&target.goal, &consumed).into(),
        goal: target.goal.into(),
        consumed: consumed.into(),
        completed,
    }))
}

//=========================================================================================
// Profile Handlers
//=========================================================================================

/// Update profile attributes; unset fields are left unchanged.
///
/// Any change enqueues a background recompute of today's target.
#[utoipa::path(
    put,
    path = "/users/{user_id}",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Invalid attribute value"),
        (status = 404, description = "User not found")
    ),
    params(("user_id" = Uuid, Path, description = "The user to update."))
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<Uuid>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    authorize(auth_user, user_id)?;
    let update = ProfileUpdate {
        name: req.name,
        hashed_password: None,
        age: req.age,
        weight_kg: req.weight_kg,
        height_cm: req.height_cm,
        sex: parse_attr(req.sex, "sex")?,
        activity: parse_attr(req.activity, "activity level")?,
        goal: parse_attr(req.goal, "goal")?,
    };
    let user = state
        .store
        .update_profile(user_id, update)
        .await
        .map_err(port_error)?;

    // The target depends on the profile, so recompute in the background.
    state.targets.enqueue(user_id);

    Ok(Json(ProfileResponse {
        user_id: user.id,
        email: user.email,
        name: user.name,
        age: user.age,
        weight_kg: user.weight_kg,
        height_cm: user.height_cm,
        sex: user.sex.map(|s| s.as_str().to_string()),
        activity: user.activity.map(|a| a.as_str().to_string()),
        goal: user.goal.map(|g| g.as_str().to_string()),
        health_score: user.health_score,
    }))
}

/// Get the user's current health score.
#[utoipa::path(
    get,
    path = "/users/{user_id}/health-score",
    responses(
        (status = 200, description = "Current health score", body = HealthScoreResponse),
        (status = 404, description = "User not found")
    ),
    params(("user_id" = Uuid, Path, description = "The user whose score to read."))
)]
pub async fn health_score_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<Uuid>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    authorize(auth_user, user_id)?;
    let user = state.store.get_user(user_id).await.map_err(port_error)?;
    Ok(Json(HealthScoreResponse {
        health_score: user.health_score,
    }))
}

//=========================================================================================
// Gamification Handlers
//=========================================================================================

/// Get the user's level, experience and streak.
#[utoipa::path(
    get,
    path = "/gamification/{user_id}",
    responses(
        (status = 200, description = "Gamification state", body = GamificationResponse)
    ),
    params(("user_id" = Uuid, Path, description = "The user whose state to read."))
)]
pub async fn gamification_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<Uuid>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    authorize(auth_user, user_id)?;
    let mut g = state
        .store
        .get_or_create_gamification(user_id)
        .await
        .map_err(port_error)?;
    // Reading the stats counts as being seen today; a fresh calendar day
    // moves the streak even without a food log.
    let now = Utc::now();
    let mut dirty = g.record_activity(now.date_naive(), now);

    // Refresh the goal snapshots from today's target when one exists.
    if let Ok(target) = state.store.get_daily_target(user_id, now.date_naive()).await {
        let (calories, protein, water) = (
            target.goal.calories.round() as i32,
            target.goal.protein.round() as i32,
            target.goal.water.round() as i32,
        );
        if (g.calories_goal, g.protein_goal, g.water_goal) != (calories, protein, water) {
            g.calories_goal = calories;
            g.protein_goal = protein;
            g.water_goal = water;
            dirty = true;
        }
    }
    if dirty {
        state
            .store
            .save_gamification(&g)
            .await
            .map_err(port_error)?;
    }
    let recent = state
        .store
        .list_achievements(user_id, 5)
        .await
        .map_err(port_error)?;
    Ok(Json(GamificationResponse {
        user_id: g.user_id,
        level: g.level,
        experience: g.experience,
        experience_to_next: g.experience_to_next(),
        streak: g.streak,
        total_days: g.total_days,
        last_active_on: g.last_active_on,
        calories_goal: g.calories_goal,
        protein_goal: g.protein_goal,
        water_goal: g.water_goal,
        recent_achievements: recent.into_iter().map(Into::into).collect(),
    }))
}

/// List the user's earned achievements, most recent first.
#[utoipa::path(
    get,
    path = "/gamification/{user_id}/achievements",
    responses(
        (status = 200, description = "Earned achievements", body = [AchievementPayload])
    ),
    params(("user_id" = Uuid, Path, description = "The user whose achievements to list."))
)]
pub async fn achievements_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<Uuid>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    authorize(auth_user, user_id)?;
    let achievements = state
        .store
        .list_achievements(user_id, 100)
        .await
        .map_err(port_error)?;
    let payload: Vec<AchievementPayload> =
        achievements.into_iter().map(Into::into).collect();
    Ok(Json(payload))
}

/// The top users by level and experience.
#[utoipa::path(
    get,
    path = "/gamification/leaderboard",
    responses(
        (status = 200, description = "Leaderboard rows", body = [LeaderboardEntry])
    ),
    params(LimitQuery)
)]
pub async fn leaderboard_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let rows = state.store.leaderboard(limit).await.map_err(port_error)?;
    let payload: Vec<LeaderboardEntry> = rows
        .into_iter()
        .map(|r| LeaderboardEntry {
            user_id: r.user_id,
            name: r.name,
            level: r.level,
            experience: r.experience,
            streak: r.streak,
            total_days: r.total_days,
        })
        .collect();
    Ok(Json(payload))
}

//=========================================================================================
// Challenge Handlers
//=========================================================================================

/// Create a new challenge.
#[utoipa::path(
    post,
    path = "/challenges",
    request_body = CreateChallengeRequest,
    responses(
        (status = 201, description = "Challenge created", body = ChallengePayload),
        (status = 400, description = "Invalid kind or date range")
    )
)]
pub async fn create_challenge_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateChallengeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let kind: ChallengeKind = req
        .kind
        .parse()
        .map_err(|e: String| (StatusCode::BAD_REQUEST, format!("Invalid kind: {e}")))?;
    if req.end_date < req.start_date {
        return Err((
            StatusCode::BAD_REQUEST,
            "end_date must not precede start_date".to_string(),
        ));
    }
    let challenge = state
        .store
        .create_challenge(Challenge {
            id: Uuid::new_v4(),
            name: req.name,
            kind,
            description: req.description,
            start_date: req.start_date,
            end_date: req.end_date,
            reward_points: req.reward_points,
        })
        .await
        .map_err(port_error)?;
    Ok((StatusCode::CREATED, Json(ChallengePayload::from(challenge))))
}

/// List all challenges.
#[utoipa::path(
    get,
    path = "/challenges",
    responses(
        (status = 200, description = "All challenges", body = [ChallengePayload])
    )
)]
pub async fn list_challenges_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let challenges = state.store.list_challenges().await.map_err(port_error)?;
    let payload: Vec<ChallengePayload> = challenges.into_iter().map(Into::into).collect();
    Ok(Json(payload))
}

/// Join a challenge. A user can hold one active enrollment per challenge.
#[utoipa::path(
    post,
    path = "/challenges/join",
    request_body = JoinChallengeRequest,
    responses(
        (status = 201, description = "Enrolled", body = EnrollmentPayload),
        (status = 404, description = "Challenge not found"),
        (status = 409, description = "Already enrolled")
    )
)]
pub async fn join_challenge_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<Uuid>,
    Json(req): Json<JoinChallengeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let enrollment = state
        .store
        .join_challenge(auth_user, req.challenge_id)
        .await
        .map_err(port_error)?;
    Ok((
        StatusCode::CREATED,
        Json(EnrollmentPayload {
            id: enrollment.id,
            challenge_id: enrollment.challenge_id,
            progress: enrollment.progress,
            status: enrollment.status.as_str().to_string(),
            awarded_points: enrollment.awarded_points,
            joined_at: enrollment.joined_at,
        }),
    ))
}

/// List a challenge's participants, ranked by progress.
#[utoipa::path(
    get,
    path = "/challenges/{challenge_id}/participants",
    responses(
        (status = 200, description = "Participants", body = [ParticipantPayload]),
        (status = 404, description = "Challenge not found")
    ),
    params(("challenge_id" = Uuid, Path, description = "The challenge to inspect."))
)]
pub async fn challenge_participants_handler(
    State(state): State<Arc<AppState>>,
    Path(challenge_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let challenge = state
        .store
        .get_challenge(challenge_id)
        .await
        .map_err(port_error)?;
    let required = challenge.kind.required_days();
    let participants = state
        .store
        .challenge_participants(challenge_id)
        .await
        .map_err(port_error)?;
    let payload: Vec<ParticipantPayload> = participants
        .into_iter()
        .map(|p| ParticipantPayload {
            user_id: p.enrollment.user_id,
            user_name: p.user_name,
            result: format!("{}/{} days", p.enrollment.progress, required),
            progress: p.enrollment.progress,
            status: p.enrollment.status.as_str().to_string(),
        })
        .collect();
    Ok(Json(payload))
}

//=========================================================================================
// Partner Offer Handlers
//=========================================================================================

/// List active partner discount offers.
#[utoipa::path(
    get,
    path = "/partners",
    responses(
        (status = 200, description = "Active offers", body = [PartnerPayload])
    )
)]
pub async fn list_partners_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let offers = state.store.list_partner_offers().await.map_err(port_error)?;
    let payload: Vec<PartnerPayload> = offers
        .into_iter()
        .map(|o| PartnerPayload {
            id: o.id,
            name: o.name,
            description: o.description,
            points_cost: o.points_cost,
            discount_min: o.discount_min,
            discount_max: o.discount_max,
        })
        .collect();
    Ok(Json(payload))
}

/// Spend health points on a partner discount.
///
/// The discount size scales with how far the current score exceeds the
/// offer's cost, and the debit is refused when the balance is short.
#[utoipa::path(
    post,
    path = "/partners/redeem",
    request_body = RedeemRequest,
    responses(
        (status = 200, description = "Redeemed", body = RedeemResponse),
        (status = 400, description = "Insufficient points or inactive offer"),
        (status = 404, description = "Offer not found")
    )
)]
pub async fn redeem_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<Uuid>,
    Json(req): Json<RedeemRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let offer = state
        .store
        .get_partner_offer(req.partner_id)
        .await
        .map_err(port_error)?;
    if !offer.is_active {
        return Err((
            StatusCode::BAD_REQUEST,
            "This offer is no longer active".to_string(),
        ));
    }

    // The tier is decided by the score before the debit.
    let user = state.store.get_user(auth_user).await.map_err(port_error)?;
    let discount_amount = rules::discount_for(
        user.health_score,
        offer.points_cost,
        offer.discount_min,
        offer.discount_max,
    );

    let remaining_score = state
        .store
        .debit_health_points(auth_user, offer.points_cost)
        .await
        .map_err(port_error)?;

    let redemption = Redemption {
        id: Uuid::new_v4(),
        user_id: auth_user,
        partner_id: offer.id,
        points_spent: offer.points_cost,
        discount_amount,
        redeemed_at: Utc::now(),
    };
    state
        .store
        .insert_redemption(redemption.clone())
        .await
        .map_err(port_error)?;
    info!(
        "User {auth_user} redeemed offer '{}' for a {discount_amount}% discount.",
        offer.name
    );

    Ok(Json(RedeemResponse {
        redemption_id: redemption.id,
        partner_id: offer.id,
        discount_amount,
        points_spent: offer.points_cost,
        remaining_score,
    }))
}

/// The user's redemption history, most recent first.
#[utoipa::path(
    get,
    path = "/users/{user_id}/partners/history",
    responses(
        (status = 200, description = "Past redemptions", body = [RedemptionPayload])
    ),
    params(("user_id" = Uuid, Path, description = "The user whose history to list."))
)]
pub async fn redemption_history_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<Uuid>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    authorize(auth_user, user_id)?;
    let history = state
        .store
        .redemption_history(user_id)
        .await
        .map_err(port_error)?;
    let payload: Vec<RedemptionPayload> = history.into_iter().map(Into::into).collect();
    Ok(Json(payload))
}
