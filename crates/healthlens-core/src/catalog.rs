//! The set of registered flows.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::definition::{DefinitionError, FlowDefinition};

/// Built-in HealthLens flow definitions, embedded at compile time.
pub const BUILTIN_FLOWS: &[(&str, &str)] = &[
    ("meal_plan.yaml", include_str!("../../../flows/meal_plan.yaml")),
    ("mood_journal.yaml", include_str!("../../../flows/mood_journal.yaml")),
    ("symptom_check.yaml", include_str!("../../../flows/symptom_check.yaml")),
    ("recipe_image.yaml", include_str!("../../../flows/recipe_image.yaml")),
];

/// Compiled flows keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    flows: BTreeMap<String, Arc<FlowDefinition>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every built-in flow.
    pub fn builtin() -> Result<Self, DefinitionError> {
        let mut catalog = Self::new();
        for (file, source) in BUILTIN_FLOWS {
            let flow = FlowDefinition::from_yaml(source).map_err(|e| {
                tracing::error!(file, error = %e, "Built-in flow failed to compile");
                e
            })?;
            catalog.register(flow);
        }
        Ok(catalog)
    }

    /// Register a flow, replacing any flow with the same name.
    pub fn register(&mut self, flow: FlowDefinition) -> Arc<FlowDefinition> {
        let flow = Arc::new(flow);
        if self
            .flows
            .insert(flow.name().to_string(), Arc::clone(&flow))
            .is_some()
        {
            tracing::debug!(flow = %flow.name(), "Replaced registered flow");
        }
        flow
    }

    pub fn get(&self, name: &str) -> Option<Arc<FlowDefinition>> {
        self.flows.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.flows.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<FlowDefinition>> {
        self.flows.values()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Modality;
    use serde_json::json;

    #[test]
    fn test_builtin_flows_compile() {
        let catalog = Catalog::builtin().unwrap();
        let names: Vec<&str> = catalog.names().collect();
        assert_eq!(
            names,
            vec![
                "analyze_mood_journal",
                "check_symptoms",
                "generate_meal_plan",
                "generate_recipe_image"
            ]
        );
    }

    #[test]
    fn test_every_health_flow_guarantees_a_disclaimer() {
        let catalog = Catalog::builtin().unwrap();
        for flow in catalog.iter().filter(|f| f.name() != "generate_recipe_image") {
            assert!(
                flow.rules()
                    .iter()
                    .any(|r| r.name() == "ensure_disclaimer"),
                "{} has no disclaimer rule",
                flow.name()
            );
            assert!(flow.safety().is_some(), "{} has no safety guard", flow.name());
        }
    }

    #[test]
    fn test_meal_plan_prompt_renders() {
        let catalog = Catalog::builtin().unwrap();
        let flow = catalog.get("generate_meal_plan").unwrap();
        let input = flow
            .validate_input(&json!({
                "age": 34,
                "gender": "female",
                "weightKg": 62.5,
                "heightCm": 168,
                "activityLevel": "moderately_active",
                "healthGoals": ["more energy", "eat more fiber"],
                "dietaryPreferences": {"allergies": ["peanuts"]},
                "planDurationDays": 1
            }))
            .unwrap();
        let prompt = flow.render_prompt(&input);
        assert!(prompt.contains("Create a 1-day meal plan"));
        assert!(prompt.contains("- Weight: 62.5 kg"));
        assert!(prompt.contains("- Height: 168 cm"));
        assert!(prompt.contains("- eat more fiber"));
        assert!(prompt.contains("Allergies (never include): peanuts"));
        assert!(!prompt.contains("Restrictions"));
        assert!(!prompt.contains("Additional notes"));
    }

    #[test]
    fn test_symptom_prompt_renders_each_symptom() {
        let catalog = Catalog::builtin().unwrap();
        let flow = catalog.get("check_symptoms").unwrap();
        let input = flow
            .validate_input(&json!({
                "symptoms": [
                    {"name": "headache", "severity": "mild", "durationDays": 2},
                    {"name": "fatigue", "severity": "moderate"}
                ]
            }))
            .unwrap();
        let prompt = flow.render_prompt(&input);
        assert!(prompt.contains("- headache (mild, for 2 days)"));
        assert!(prompt.contains("- fatigue (moderate)"));
        assert!(!prompt.contains("0. "));
    }

    #[test]
    fn test_image_flows_name_their_model() {
        let catalog = Catalog::builtin().unwrap();
        let image_flows: Vec<_> = catalog
            .iter()
            .filter(|f| f.generation().modalities.contains(&Modality::Image))
            .collect();
        assert!(!image_flows.is_empty());

        for flow in image_flows {
            assert!(
                flow.generation().model.is_some(),
                "{} generates images but relies on the default model",
                flow.name()
            );
        }
    }

    #[test]
    fn test_register_replaces() {
        let mut catalog = Catalog::builtin().unwrap();
        let before = catalog.len();
        let flow = (*catalog.get("check_symptoms").unwrap()).clone();
        catalog.register(flow);
        assert_eq!(catalog.len(), before);
        assert!(catalog.get("unknown").is_none());
    }
}
