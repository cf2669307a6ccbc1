//! services/api/src/web/target_task.rs
//!
//! This module contains the asynchronous "worker" task that recomputes a
//! user's daily nutrition target in the background. Handlers enqueue a job
//! after any change that affects the target (signup, profile update) and
//! return immediately; the worker calls the estimator and stores the result.

use std::sync::Arc;

use chrono::Utc;
use healthpilot_core::ports::{NutritionEstimator, NutritionStore, PortError};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// A request to recompute one user's target for today.
#[derive(Debug, Clone, Copy)]
pub struct TargetJob {
    pub user_id: Uuid,
}

/// A bounded handle to the target-recompute worker.
#[derive(Clone)]
pub struct TargetQueue {
    tx: mpsc::Sender<TargetJob>,
}

impl TargetQueue {
    /// Enqueues a recompute job without waiting. When the queue is full the
    /// job is dropped with a warning; the next profile change or signup will
    /// enqueue a fresh one.
    pub fn enqueue(&self, user_id: Uuid) {
        if let Err(e) = self.tx.try_send(TargetJob { user_id }) {
            warn!("Target queue full, dropping recompute job for user {user_id}: {e}");
        }
    }
}

/// Spawns the worker task and returns the queue handle for the handlers.
pub fn spawn_target_worker(
    store: Arc<dyn NutritionStore>,
    estimator: Arc<dyn NutritionEstimator>,
    capacity: usize,
) -> TargetQueue {
    let (tx, mut rx) = mpsc::channel::<TargetJob>(capacity);

    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            if let Err(e) = recompute_target(store.as_ref(), estimator.as_ref(), job.user_id).await
            {
                error!("Target recompute failed for user {}: {e}", job.user_id);
            }
        }
        info!("Target worker shutting down: queue closed.");
    });

    TargetQueue { tx }
}

/// Recomputes and stores today's target for one user. A profile that is not
/// complete enough to estimate from is skipped silently; the target appears
/// once the user fills in the missing attributes.
async fn recompute_target(
    store: &dyn NutritionStore,
    estimator: &dyn NutritionEstimator,
    user_id: Uuid,
) -> Result<(), PortError> {
    let user = store.get_user(user_id).await?;
    let Some(profile) = user.complete_profile() else {
        info!("Skipping target recompute for user {user_id}: profile incomplete.");
        return Ok(());
    };

    let goal = estimator.estimate_daily_target(&profile).await?;
    let today = Utc::now().date_naive();
    store.replace_daily_target(user_id, today, goal).await?;
    info!("Stored recomputed daily target for user {user_id}.");
    Ok(())
}
