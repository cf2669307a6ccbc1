pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod target_task;

// Re-export the pieces the binary needs to build the router.
pub use middleware::require_auth;
pub use target_task::spawn_target_worker;
