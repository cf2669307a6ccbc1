//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{db::PgStore, nutrition_llm::OpenAiNutritionAdapter},
    config::Config,
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler, signup_handler},
        middleware::require_auth,
        rest::{
            achievements_handler, challenge_participants_handler, create_challenge_handler,
            gamification_handler, get_food_handler, get_target_handler, health_score_handler,
            join_challenge_handler, leaderboard_handler, list_challenges_handler,
            list_partners_handler, record_food_handler, redeem_handler,
            redemption_history_handler, target_status_handler, update_profile_handler, ApiDoc,
        },
        state::AppState,
        target_task::spawn_target_worker,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgStore::new(db_pool.clone()));
    info!("Running database migrations...");
    store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Nutrition Estimator ---
    // One client per configured key; the adapter rotates across them.
    let clients: Vec<Client<OpenAIConfig>> = config
        .openai_api_keys
        .iter()
        .map(|key| Client::with_config(OpenAIConfig::new().with_api_key(key)))
        .collect();
    info!("Nutrition estimator configured with {} API key(s).", clients.len());
    let estimator = Arc::new(OpenAiNutritionAdapter::new(
        clients,
        config.target_model.clone(),
        config.food_model.clone(),
        config.llm_timeout,
    ));

    // --- 4. Spawn the Target Worker & Build the Shared AppState ---
    let targets = spawn_target_worker(
        store.clone(),
        estimator.clone(),
        config.target_queue_capacity,
    );
    let app_state = Arc::new(AppState {
        store,
        estimator,
        targets,
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_origin
                .parse::<HeaderValue>()
                .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {e}")))?,
        )
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/users/{user_id}/food",
            post(record_food_handler).get(get_food_handler),
        )
        .route("/users/{user_id}/target", get(get_target_handler))
        .route("/users/{user_id}/target/status", get(target_status_handler))
        .route("/users/{user_id}", put(update_profile_handler))
        .route("/users/{user_id}/health-score", get(health_score_handler))
        .route("/users/{user_id}/partners/history", get(redemption_history_handler))
        .route("/gamification/leaderboard", get(leaderboard_handler))
        .route("/gamification/{user_id}", get(gamification_handler))
        .route(
            "/gamification/{user_id}/achievements",
            get(achievements_handler),
        )
        .route(
            "/challenges",
            post(create_challenge_handler).get(list_challenges_handler),
        )
        .route("/challenges/join", post(join_challenge_handler))
        .route(
            "/challenges/{challenge_id}/participants",
            get(challenge_participants_handler),
        )
        .route("/partners", get(list_partners_handler))
        .route("/partners/redeem", post(redeem_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
