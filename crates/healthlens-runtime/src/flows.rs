//! Typed entry points for the built-in HealthLens flows.
//!
//! Request and result types mirror the flows' contracts in camelCase JSON.
//! The contracts stay authoritative: every request is still validated by the
//! runner, so these types only make the common cases convenient.

use std::sync::Arc;

use healthlens_core::{Catalog, DefinitionError, FlowDefinition};
use serde::{Deserialize, Serialize};

use crate::error::FlowError;
use crate::runner::FlowRunner;

pub const MEAL_PLAN_FLOW: &str = "generate_meal_plan";
pub const MOOD_JOURNAL_FLOW: &str = "analyze_mood_journal";
pub const SYMPTOM_CHECK_FLOW: &str = "check_symptoms";
pub const RECIPE_IMAGE_FLOW: &str = "generate_recipe_image";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    En,
    Es,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
    PreferNotToSay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    LightlyActive,
    ModeratelyActive,
    VeryActive,
    ExtraActive,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DietaryPreferences {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restrictions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allergies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cuisines: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dislikes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanRequest {
    pub age: u32,
    pub gender: Gender,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub activity_level: ActivityLevel,
    pub health_goals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dietary_preferences: Option<DietaryPreferences>,
    /// 1 to 7; the flow defaults to 3
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_duration_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub meal_type: MealType,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingredients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPlan {
    pub day: u32,
    pub meals: Vec<Meal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_calories: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlan {
    pub daily_plans: Vec<DailyPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrition_summary: Option<String>,
    pub overall_disclaimer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodJournalRequest {
    pub entry: String,
    /// 1 to 10
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood_rating: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodAnalysis {
    pub summary: String,
    pub sentiment: Sentiment,
    #[serde(default)]
    pub emotions: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub support_message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symptom {
    pub name: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymptomCheckRequest {
    pub symptoms: Vec<Symptom>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Likelihood {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    SelfCare,
    SeeDoctor,
    Urgent,
    Emergency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PossibleCause {
    pub name: String,
    pub likelihood: Likelihood,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymptomAssessment {
    pub possible_causes: Vec<PossibleCause>,
    pub urgency: Urgency,
    pub recommendations: Vec<String>,
    pub disclaimer: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStyle {
    #[default]
    Photo,
    Illustration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeImageRequest {
    pub recipe_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ImageStyle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeImage {
    /// A `data:image/...` URI
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// The HealthLens flows behind one runner.
#[derive(Debug)]
pub struct HealthLens {
    runner: FlowRunner,
    meal_plan: Arc<FlowDefinition>,
    mood_journal: Arc<FlowDefinition>,
    symptom_check: Arc<FlowDefinition>,
    recipe_image: Arc<FlowDefinition>,
}

impl HealthLens {
    /// Use the built-in flow definitions.
    pub fn new(runner: FlowRunner) -> Result<Self, DefinitionError> {
        Self::with_catalog(&Catalog::builtin()?, runner)
    }

    /// Use flow definitions from a catalog, e.g. the built-ins with reworded
    /// prompts. The catalog must contain all four flows.
    pub fn with_catalog(catalog: &Catalog, runner: FlowRunner) -> Result<Self, DefinitionError> {
        let require = |name: &str| {
            catalog.get(name).ok_or_else(|| DefinitionError::Invalid {
                flow: name.to_string(),
                problems: vec!["flow is not in the catalog".to_string()],
            })
        };

        Ok(Self {
            meal_plan: require(MEAL_PLAN_FLOW)?,
            mood_journal: require(MOOD_JOURNAL_FLOW)?,
            symptom_check: require(SYMPTOM_CHECK_FLOW)?,
            recipe_image: require(RECIPE_IMAGE_FLOW)?,
            runner,
        })
    }

    pub fn runner(&self) -> &FlowRunner {
        &self.runner
    }

    pub async fn generate_meal_plan(
        &self,
        request: &MealPlanRequest,
    ) -> Result<MealPlan, FlowError> {
        self.runner.run_typed(&self.meal_plan, request).await
    }

    pub async fn analyze_mood_journal(
        &self,
        request: &MoodJournalRequest,
    ) -> Result<MoodAnalysis, FlowError> {
        self.runner.run_typed(&self.mood_journal, request).await
    }

    pub async fn check_symptoms(
        &self,
        request: &SymptomCheckRequest,
    ) -> Result<SymptomAssessment, FlowError> {
        self.runner.run_typed(&self.symptom_check, request).await
    }

    pub async fn generate_recipe_image(
        &self,
        request: &RecipeImageRequest,
    ) -> Result<RecipeImage, FlowError> {
        self.runner.run_typed(&self.recipe_image, request).await
    }
}
