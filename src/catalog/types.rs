use serde::Deserialize;

/// A named stylistic context applied to a product. Vibes differ in data, not
/// behaviour: one composer consumes every entry.
#[derive(Debug, Clone, Deserialize)]
pub struct VibeSpec {
    pub name: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(default)]
    pub description: String,
    /// Scenario-driven vibes offer the scenario catalogue's sub-variants;
    /// all other vibes are composed from the base payload alone.
    #[serde(default)]
    pub scenario_driven: bool,
    #[serde(default)]
    pub payload: Option<BasePayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BasePayload {
    #[serde(default)]
    pub lighting_mode: Option<String>,
    #[serde(default)]
    pub background_prompt: Option<String>,
    /// `None` means the camera angle is unconstrained.
    #[serde(default)]
    pub camera_angle: Option<String>,
    #[serde(default)]
    pub structure_lock: Option<f32>,
    #[serde(default)]
    pub color_temperature: Option<String>,
    #[serde(default)]
    pub shadow_intensity: Option<String>,
    #[serde(default)]
    pub atmosphere: Option<String>,
    #[serde(default)]
    pub negative_prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VibeCatalog {
    pub vibes: Vec<VibeSpec>,
}

impl VibeCatalog {
    pub fn get(&self, name: &str) -> Option<&VibeSpec> {
        self.vibes.iter().find(|vibe| vibe.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VibeSpec> {
        self.vibes.iter()
    }
}

/// A concrete real-world usage of the product within a scenario-driven vibe.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioSpec {
    pub id: String,
    pub label: String,
    /// Preview asset shown by the selection UI.
    #[serde(default)]
    pub image_path: String,
    pub prompt_modifier: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    /// Classifier-free guidance override, a sibling of the structure lock in
    /// the outgoing request. Values may exceed [0,1].
    #[serde(default)]
    pub guidance_scale: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioCategory {
    pub name: String,
    pub scenarios: Vec<ScenarioSpec>,
}

/// keyword -> category entry. First match wins when scanning the lowercased
/// primary subject description, so declaration order is precedence.
#[derive(Debug, Clone, Deserialize)]
pub struct SubjectRule {
    pub keyword: String,
    pub category: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioCatalog {
    pub subject_map: Vec<SubjectRule>,
    pub categories: Vec<ScenarioCategory>,
}

pub const DEFAULT_CATEGORY: &str = "default";

impl ScenarioCatalog {
    pub fn category(&self, name: &str) -> Option<&ScenarioCategory> {
        self.categories.iter().find(|category| category.name == name)
    }

    /// First scenario matching `id` across all categories, in declaration
    /// order. Unknown ids are simply absent; stale UI state must not break
    /// generation.
    pub fn find_scenario(&self, id: &str) -> Option<&ScenarioSpec> {
        self.categories
            .iter()
            .flat_map(|category| category.scenarios.iter())
            .find(|scenario| scenario.id == id)
    }

    /// Category name for a subject description, scanning the subject map in
    /// declaration order against the lowercased text.
    pub fn category_for_subject(&self, description: &str) -> Option<&str> {
        let lowered = description.to_lowercase();
        self.subject_map
            .iter()
            .find(|rule| lowered.contains(&rule.keyword))
            .map(|rule| rule.category.as_str())
    }
}
