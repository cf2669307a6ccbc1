//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::target_task::TargetQueue;
use healthpilot_core::ports::{NutritionEstimator, NutritionStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn NutritionStore>,
    pub estimator: Arc<dyn NutritionEstimator>,
    /// Handle to the background target-recompute worker.
    pub targets: TargetQueue,
    pub config: Arc<Config>,
}
