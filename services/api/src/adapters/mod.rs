//! services/api/src/adapters/mod.rs
//!
//! Declares the concrete implementations of the ports defined in the `core` crate.

pub mod db;
pub mod nutrition_llm;

pub use db::PgStore;
pub use nutrition_llm::OpenAiNutritionAdapter;
