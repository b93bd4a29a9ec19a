//! Diet plan generation — structured output from a single model call
//!
//! Deliberately simpler than the chat path: one user-role instruction prompt
//! carrying retrieved memory, retrieved knowledge, and the caller's settings,
//! with an explicit JSON-only output contract. The completion is parsed into
//! a typed document; a malformed response is a content problem and is never
//! retried here.

use crate::error::NutriaError;
use crate::inference::{ChatOptions, ModelClient, PromptMessage};
use crate::retrieve::{Corpus, Retriever};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Generation runs hot: plan variety matters more than determinism.
const DIET_PLAN_TEMPERATURE: f32 = 0.7;

/// High ceiling — multi-day plans with per-meal detail are long.
const DIET_PLAN_MAX_TOKENS: u32 = 10_000;

const RETRIEVAL_TOP_K: i64 = 5;

// ============================================================================
// Document types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DietPlanMeal {
    pub meal_type: MealType,
    pub menu: String,
    pub calories: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DietPlanDay {
    pub day: u32,
    pub meals: Vec<DietPlanMeal>,
}

/// The validated result of one generation call. Never persisted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DietPlanDocument {
    pub diet_plan: Vec<DietPlanDay>,
}

/// Caller-supplied generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DietPlanSettings {
    pub calories_per_day: u32,
    pub meals_per_day: u32,
    pub diet_type: String,
    pub duration_in_days: u32,
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum DietPlanError {
    #[error("Model output is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Model output has an invalid shape: {0}")]
    Invalid(String),
}

// ============================================================================
// Generator
// ============================================================================

#[derive(Clone)]
pub struct DietPlanGenerator {
    retriever: Retriever,
    model: ModelClient,
}

impl DietPlanGenerator {
    pub fn new(retriever: Retriever, model: ModelClient) -> Self {
        Self { retriever, model }
    }

    /// Generate a personalized diet plan for `user_id`.
    pub async fn generate(
        &self,
        user_id: &str,
        preferences: &str,
        restrictions: &str,
        settings: &DietPlanSettings,
    ) -> Result<DietPlanDocument, NutriaError> {
        let query = format!("{} {}", preferences, restrictions);

        let (memory, knowledge) = tokio::try_join!(
            self.retriever
                .retrieve(Corpus::Memory, &query, Some(user_id), Some(RETRIEVAL_TOP_K)),
            self.retriever
                .retrieve(Corpus::Knowledge, &query, None, Some(RETRIEVAL_TOP_K)),
        )?;

        let prompt = build_prompt(&memory, &knowledge, preferences, restrictions, settings);
        let messages = vec![PromptMessage::user(prompt)];
        let opts = ChatOptions {
            temperature: Some(DIET_PLAN_TEMPERATURE),
            max_tokens: Some(DIET_PLAN_MAX_TOKENS),
            ..Default::default()
        };

        let completion = self.model.complete_chat(&messages, &opts).await?;

        let document = parse_document(&completion.content)?;
        tracing::info!(
            user_id,
            days = document.diet_plan.len(),
            "Generated diet plan"
        );
        Ok(document)
    }
}

/// Assemble the single-message instruction prompt.
pub fn build_prompt(
    memory: &[String],
    knowledge: &[String],
    preferences: &str,
    restrictions: &str,
    settings: &DietPlanSettings,
) -> String {
    format!(
        "You are a professional nutritionist. Create a personalized diet plan.\n\n\
        User Memory:\n{}\n\n\
        Relevant Context:\n{}\n\n\
        Preferences: {}\n\
        Restrictions: {}\n\
        Daily calorie target: {}\n\
        Meals per day: {}\n\
        Diet type: {}\n\
        Duration in days: {}\n\n\
        Respond with a single JSON object and no surrounding text. The object \
        must have a \"dietPlan\" array with one element per day; each element \
        has a positive integer \"day\" and a \"meals\" array; each meal has \
        \"mealType\" (one of \"breakfast\", \"lunch\", \"dinner\", \"snack\"), \
        a \"menu\" string, a non-negative integer \"calories\", and an optional \
        \"additionalInfo\" string.",
        memory.join("\n"),
        knowledge.join("\n"),
        preferences,
        restrictions,
        settings.calories_per_day,
        settings.meals_per_day,
        settings.diet_type,
        settings.duration_in_days,
    )
}

/// Parse and validate a completion's content into a typed document.
///
/// Tolerates a markdown code fence around the JSON (models add one routinely)
/// but nothing else.
pub fn parse_document(raw: &str) -> Result<DietPlanDocument, DietPlanError> {
    let body = strip_code_fence(raw.trim());
    let document: DietPlanDocument = serde_json::from_str(body)?;

    for day in &document.diet_plan {
        if day.day == 0 {
            return Err(DietPlanError::Invalid(
                "day numbers must be positive".to_string(),
            ));
        }
    }

    Ok(document)
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // Drop the info string ("json") on the opening fence line
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> DietPlanSettings {
        DietPlanSettings {
            calories_per_day: 2000,
            meals_per_day: 3,
            diet_type: "mediterranean".to_string(),
            duration_in_days: 2,
        }
    }

    fn sample_json() -> &'static str {
        r#"{
            "dietPlan": [
                {
                    "day": 1,
                    "meals": [
                        { "mealType": "breakfast", "menu": "oatmeal with berries", "calories": 450 },
                        { "mealType": "lunch", "menu": "grilled chicken salad", "calories": 650, "additionalInfo": "dressing on the side" },
                        { "mealType": "dinner", "menu": "baked salmon with rice", "calories": 700 }
                    ]
                },
                {
                    "day": 2,
                    "meals": [
                        { "mealType": "snack", "menu": "greek yogurt", "calories": 200 }
                    ]
                }
            ]
        }"#
    }

    #[test]
    fn test_parse_document_valid_json() {
        let document = parse_document(sample_json()).expect("parse failed");

        assert_eq!(document.diet_plan.len(), 2);
        assert_eq!(document.diet_plan[0].day, 1);
        assert_eq!(document.diet_plan[0].meals.len(), 3);
        assert_eq!(document.diet_plan[0].meals[0].meal_type, MealType::Breakfast);
        assert_eq!(
            document.diet_plan[0].meals[1].additional_info.as_deref(),
            Some("dressing on the side")
        );
        assert_eq!(document.diet_plan[1].meals[0].meal_type, MealType::Snack);
    }

    #[test]
    fn test_parse_document_not_json_fails_without_partial_document() {
        let result = parse_document("not json");
        assert!(matches!(result, Err(DietPlanError::Parse(_))));
    }

    #[test]
    fn test_parse_document_rejects_unknown_meal_type() {
        let raw = r#"{"dietPlan":[{"day":1,"meals":[{"mealType":"brunch","menu":"x","calories":1}]}]}"#;
        assert!(matches!(parse_document(raw), Err(DietPlanError::Parse(_))));
    }

    #[test]
    fn test_parse_document_rejects_day_zero() {
        let raw = r#"{"dietPlan":[{"day":0,"meals":[]}]}"#;
        assert!(matches!(parse_document(raw), Err(DietPlanError::Invalid(_))));
    }

    #[test]
    fn test_parse_document_rejects_negative_calories() {
        let raw = r#"{"dietPlan":[{"day":1,"meals":[{"mealType":"lunch","menu":"x","calories":-10}]}]}"#;
        assert!(matches!(parse_document(raw), Err(DietPlanError::Parse(_))));
    }

    #[test]
    fn test_parse_document_strips_markdown_fence() {
        let fenced = format!("```json\n{}\n```", sample_json());
        let document = parse_document(&fenced).expect("parse failed");
        assert_eq!(document.diet_plan.len(), 2);
    }

    #[test]
    fn test_document_round_trip_is_idempotent() {
        let document = parse_document(sample_json()).expect("parse failed");
        let serialized = serde_json::to_string(&document).expect("serialize failed");
        let reparsed = parse_document(&serialized).expect("reparse failed");
        assert_eq!(document, reparsed);
    }

    #[test]
    fn test_build_prompt_enumerates_meal_types_and_settings() {
        let memory = vec!["allergic to peanuts".to_string()];
        let knowledge = vec!["mediterranean diets favor fish".to_string()];

        let prompt = build_prompt(&memory, &knowledge, "fish", "no peanuts", &settings());

        for meal_type in ["breakfast", "lunch", "dinner", "snack"] {
            assert!(prompt.contains(meal_type), "prompt must enumerate {meal_type}");
        }
        assert!(prompt.contains("allergic to peanuts"));
        assert!(prompt.contains("mediterranean diets favor fish"));
        assert!(prompt.contains("Daily calorie target: 2000"));
        assert!(prompt.contains("Duration in days: 2"));
        assert!(prompt.contains("single JSON object"));
    }
}
