//! services/api/src/adapters/nutrition_llm.rs
//!
//! This module contains the adapter for the nutrition-estimation LLM.
//! It implements the `NutritionEstimator` port from the `core` crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use healthpilot_core::{
    domain::{CompleteProfile, NutritionFacts},
    ports::{NutritionEstimator, PortError, PortResult},
};
use regex::Regex;

const TARGET_SYSTEM_PROMPT: &str = "You are a nutrition planning assistant. Given a person's \
age, weight, height, sex, activity level and goal, compute their daily nutrition targets. \
Respond with EXACTLY one JSON object and nothing else, in this shape: \
{\"calories\": <kcal>, \"protein\": <grams>, \"carbs\": <grams>, \"fat\": <grams>, \
\"water\": <liters>}. All values are numbers.";

const FOOD_SYSTEM_PROMPT: &str = "You are a nutrition analysis assistant. The user describes \
food they just ate, in free text. Estimate the total nutrition content of everything described. \
If quantities or preparation details are missing, assume typical servings rather than refusing. \
Respond with EXACTLY one JSON object and nothing else, in this shape: \
{\"calories\": <kcal>, \"protein\": <grams>, \"carbs\": <grams>, \"fat\": <grams>, \
\"water\": <liters>}. All values are numbers.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `NutritionEstimator` using an OpenAI-compatible LLM.
///
/// It holds one client per configured API key and rotates between them with
/// an atomic cursor, so bursts of food submissions spread across keys.
pub struct OpenAiNutritionAdapter {
    clients: Vec<Client<OpenAIConfig>>,
    cursor: AtomicUsize,
    target_model: String,
    food_model: String,
    timeout: Duration,
}

impl OpenAiNutritionAdapter {
    /// Creates a new `OpenAiNutritionAdapter` from one client per API key.
    /// `clients` must be non-empty; `Config` guarantees at least one key.
    pub fn new(
        clients: Vec<Client<OpenAIConfig>>,
        target_model: String,
        food_model: String,
        timeout: Duration,
    ) -> Self {
        Self {
            clients,
            cursor: AtomicUsize::new(0),
            target_model,
            food_model,
            timeout,
        }
    }

    fn next_client(&self) -> &Client<OpenAIConfig> {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        &self.clients[i % self.clients.len()]
    }

    /// Runs one chat completion, bounded by the configured timeout, and
    /// returns the text content of the first choice.
    async fn complete(&self, model: &str, system: &str, user: String) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // The chat handle must outlive the future borrowing it.
        let chat = self.next_client().chat();
        let call = chat.create(request);
        let response = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                PortError::Upstream(format!(
                    "Nutrition LLM call timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e: OpenAIError| PortError::Upstream(e.to_string()))?;

        if let Some(choice) = response.choices.into_iter().next() {
            if let Some(content) = choice.message.content {
                Ok(content)
            } else {
                Err(PortError::Upstream(
                    "Nutrition LLM response contained no text content.".to_string(),
                ))
            }
        } else {
            Err(PortError::Upstream(
                "Nutrition LLM returned no choices in its response.".to_string(),
            ))
        }
    }
}

/// Pulls the first `{...}` block out of a model reply and decodes it.
/// Models occasionally wrap the JSON in prose or a code fence even when told
/// not to; the reply is rejected only if no decodable block exists.
fn extract_nutrition_json(reply: &str) -> PortResult<NutritionFacts> {
    let re = Regex::new(r"(?s)\{.*?\}").map_err(|e| PortError::Unexpected(e.to_string()))?;
    let block = re
        .find(reply)
        .ok_or_else(|| PortError::Upstream("Nutrition LLM reply contained no JSON".to_string()))?;
    serde_json::from_str(block.as_str())
        .map_err(|e| PortError::Upstream(format!("Could not decode nutrition JSON: {e}")))
}

//=========================================================================================
// `NutritionEstimator` Trait Implementation
//=========================================================================================

#[async_trait]
impl NutritionEstimator for OpenAiNutritionAdapter {
    async fn estimate_daily_target(
        &self,
        profile: &CompleteProfile,
    ) -> PortResult<NutritionFacts> {
        let user = format!(
            "Age: {} years\nWeight: {} kg\nHeight: {} cm\nSex: {}\nActivity level: {}\nGoal: {}",
            profile.age,
            profile.weight_kg,
            profile.height_cm,
            profile.sex.as_str(),
            profile.activity.as_str(),
            profile.goal.as_str(),
        );
        let reply = self
            .complete(&self.target_model, TARGET_SYSTEM_PROMPT, user)
            .await?;
        extract_nutrition_json(&reply)
    }

    async fn analyze_food_text(&self, description: &str) -> PortResult<NutritionFacts> {
        let reply = self
            .complete(&self.food_model, FOOD_SYSTEM_PROMPT, description.to_string())
            .await?;
        extract_nutrition_json(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_bare_json_reply() {
        let facts = extract_nutrition_json(
            r#"{"calories": 2200, "protein": 140, "carbs": 250, "fat": 70, "water": 2.5}"#,
        )
        .unwrap();
        assert_eq!(facts.calories, 2200.0);
        assert_eq!(facts.water, 2.5);
    }

    #[test]
    fn decodes_json_wrapped_in_prose_and_fences() {
        let reply = "Here is the estimate:\n```json\n{\"calories\": 450, \"protein\": 30, \
                     \"carbs\": 40, \"fat\": 15, \"water\": 0.3}\n```\nEnjoy!";
        let facts = extract_nutrition_json(reply).unwrap();
        assert_eq!(facts.protein, 30.0);
    }

    #[test]
    fn missing_fields_default_to_zero() {
        let facts = extract_nutrition_json(r#"{"calories": 100}"#).unwrap();
        assert_eq!(facts.calories, 100.0);
        assert_eq!(facts.fat, 0.0);
    }

    #[test]
    fn rejects_reply_without_json() {
        let err = extract_nutrition_json("I cannot estimate that.").unwrap_err();
        assert!(matches!(err, PortError::Upstream(_)));
    }
}
