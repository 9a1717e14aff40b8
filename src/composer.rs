use serde::Serialize;

use crate::catalog::{ScenarioCatalog, VibeCatalog};
use crate::config::Config;
use crate::error::PipelineError;
use crate::scene::SceneAnalysis;

const DEFAULT_STRUCTURE_LOCK: f32 = 0.9;
const DEFAULT_BACKGROUND_PROMPT: &str = "clean background";
const QUALITY_BOOSTER: &str =
    "ultra-realistic, 8k resolution, cinematic lighting, professional marketing photograph.";

/// Fully formed request for the generation service. Single-use, immutable,
/// serialized as-is into the request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub num_results: u32,
    pub width: u32,
    pub height: u32,
    /// Structure lock in [0, 1]: how strongly the generator preserves the
    /// input composition.
    pub structure_guidance_scale: f32,
    /// Classifier-free guidance from the scenario catalogue. A sibling of
    /// the structure lock, not a replacement for it; scenario values may
    /// exceed [0, 1].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f32>,
    pub sync: bool,
    pub negative_prompt: String,
}

/// Per-request user options recognized by the composer.
#[derive(Debug, Clone, Default)]
pub struct RenderOverrides {
    /// Free-text camera instruction; wins over `camera_angle`.
    pub camera_prompt: Option<String>,
    /// Symbolic angle such as `low_angle`; underscores become spaces.
    pub camera_angle: Option<String>,
    pub structure_lock: Option<f32>,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderDefaults {
    pub width: u32,
    pub height: u32,
}

impl Default for RenderDefaults {
    fn default() -> Self {
        RenderDefaults {
            width: 1024,
            height: 1024,
        }
    }
}

impl RenderDefaults {
    pub fn from_config(config: &Config) -> Self {
        RenderDefaults {
            width: config.default_width,
            height: config.default_height,
        }
    }
}

/// Rule-based subject rewriting keyed on scenario id substrings. Scene
/// analyses describe the product in its sealed marketing state; scenarios
/// that show it in use need the description rewritten to match.
struct SanitizeRule {
    triggers: &'static [&'static str],
    apply: fn(String) -> String,
}

static SANITIZE_RULES: &[SanitizeRule] = &[SanitizeRule {
    triggers: &["drinking", "open", "pouring"],
    apply: force_open_container,
}];

/// Rewrites run in a fixed sequence (replace, delete, prepend, append)
/// because the replacements feed the container test used for the prefix.
fn force_open_container(subject: String) -> String {
    let mut subject = subject
        .replace("sealed", "opened")
        .replace("closed", "opened");
    for token in ["cap", "lid", "cork"] {
        subject = subject.replace(token, "");
    }

    let lowered = subject.to_lowercase();
    let opener = if lowered.contains("bottle") {
        "opened bottle of "
    } else if lowered.contains("can") {
        "opened can of "
    } else {
        "opened "
    };

    let mut rewritten = String::with_capacity(opener.len() + subject.len() + 40);
    rewritten.push_str(opener);
    rewritten.push_str(&subject);
    rewritten.push_str(", opened neck, liquid visible at rim");
    rewritten
}

fn sanitize_subject(scenario_id: &str, subject: String) -> String {
    let id = scenario_id.to_lowercase();
    let mut subject = subject;
    for rule in SANITIZE_RULES {
        if rule.triggers.iter().any(|trigger| id.contains(trigger)) {
            subject = (rule.apply)(subject);
        }
    }
    subject
}

fn synthesize_subject_prompt(analysis: &SceneAnalysis) -> String {
    if analysis.subjects.is_empty() {
        return "the product".to_string();
    }

    let mut pieces = Vec::with_capacity(analysis.subjects.len());
    for subject in &analysis.subjects {
        let mut piece = subject.detailed_description.clone();
        if let Some(colors) = subject
            .primary_colors
            .as_ref()
            .filter(|colors| !colors.is_empty())
        {
            piece.push_str(&format!(" Primary colors are {}.", colors.join(", ")));
        }
        if let Some(material) = subject.effective_material() {
            piece.push_str(&format!(" Made of {}.", material));
        }
        pieces.push(piece);
    }
    pieces.join(" ")
}

fn humanize_camera_angle(angle: &str) -> String {
    format!("Use a {} camera angle.", angle.replace('_', " "))
}

fn append_negative(base: String, extra: &str) -> String {
    if base.trim().is_empty() {
        extra.to_string()
    } else {
        format!("{base}, {extra}")
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deterministic prompt assembly: identical inputs yield byte-identical
/// requests. Pure except for reading the immutable catalogues.
pub struct PromptComposer<'a> {
    vibes: &'a VibeCatalog,
    scenarios: &'a ScenarioCatalog,
    defaults: RenderDefaults,
}

impl<'a> PromptComposer<'a> {
    pub fn new(
        vibes: &'a VibeCatalog,
        scenarios: &'a ScenarioCatalog,
        defaults: RenderDefaults,
    ) -> Self {
        PromptComposer {
            vibes,
            scenarios,
            defaults,
        }
    }

    pub fn compose(
        &self,
        analysis: &SceneAnalysis,
        vibe_name: &str,
        scenario_id: Option<&str>,
        overrides: &RenderOverrides,
    ) -> Result<GenerationRequest, PipelineError> {
        let vibe = self.vibes.get(vibe_name).ok_or_else(|| {
            PipelineError::PromptInvalid(format!("unknown vibe '{vibe_name}'"))
        })?;
        let base = vibe.payload.clone().unwrap_or_default();

        let mut subject_prompt = synthesize_subject_prompt(analysis);
        let mut structure_lock = base.structure_lock.unwrap_or(DEFAULT_STRUCTURE_LOCK);
        let mut negative_prompt = base.negative_prompt.clone().unwrap_or_default();
        let mut camera_instruction = String::new();
        let mut prompt_modifier = String::new();
        let mut guidance_scale = None;

        let scenario_id = scenario_id
            .map(|id| id.trim().to_lowercase())
            .filter(|id| !id.is_empty());
        if let Some(id) = scenario_id.as_deref() {
            // A stale id from the UI matches nothing and is ignored.
            if let Some(scenario) = self.scenarios.find_scenario(id) {
                prompt_modifier = scenario.prompt_modifier.clone();
                if let Some(extra) = scenario.negative_prompt.as_deref() {
                    negative_prompt = append_negative(negative_prompt, extra);
                }
                guidance_scale = scenario.guidance_scale;
            }
        }

        if let Some(camera_prompt) = overrides.camera_prompt.as_deref() {
            camera_instruction = camera_prompt.to_string();
        } else if let Some(angle) = overrides.camera_angle.as_deref() {
            camera_instruction = humanize_camera_angle(angle);
        }

        if let Some(lock) = overrides.structure_lock {
            structure_lock = lock;
        }

        if let Some(id) = scenario_id.as_deref() {
            subject_prompt = sanitize_subject(id, subject_prompt);
        }

        let background = base
            .background_prompt
            .as_deref()
            .unwrap_or(DEFAULT_BACKGROUND_PROMPT);
        let atmosphere = base.atmosphere.as_deref().unwrap_or("");
        let prompt = normalize_whitespace(&format!(
            "{subject_prompt}. {prompt_modifier} {camera_instruction} {background}. {atmosphere} {QUALITY_BOOSTER}"
        ));

        Ok(GenerationRequest {
            prompt,
            num_results: 1,
            width: self.defaults.width,
            height: self.defaults.height,
            structure_guidance_scale: structure_lock,
            guidance_scale,
            sync: true,
            negative_prompt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{load_scenarios, load_vibes};
    use std::path::PathBuf;

    fn catalogs() -> (VibeCatalog, ScenarioCatalog) {
        let data = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data");
        (
            load_vibes(&data.join("vibes.yaml")).unwrap(),
            load_scenarios(&data.join("scenarios.yaml")).unwrap(),
        )
    }

    fn analysis_with_subject(description: &str) -> SceneAnalysis {
        serde_json::from_value(serde_json::json!({
            "global_description": "Product photo.",
            "subjects": [{ "type": "object", "detailed_description": description }]
        }))
        .unwrap()
    }

    #[test]
    fn marketplace_clean_without_overrides() {
        let (vibes, scenarios) = catalogs();
        let composer = PromptComposer::new(&vibes, &scenarios, RenderDefaults::default());
        let analysis =
            analysis_with_subject("A silver aluminum beverage can with condensation");
        let request = composer
            .compose(&analysis, "Marketplace Clean", None, &RenderOverrides::default())
            .unwrap();

        assert_eq!(request.structure_guidance_scale, 0.9);
        assert!(request
            .prompt
            .ends_with("professional marketing photograph."));
        assert_eq!(request.negative_prompt, "");
        assert_eq!(request.num_results, 1);
        assert_eq!((request.width, request.height), (1024, 1024));
        assert!(request.sync);
    }

    #[test]
    fn composition_is_deterministic() {
        let (vibes, scenarios) = catalogs();
        let composer = PromptComposer::new(&vibes, &scenarios, RenderDefaults::default());
        let analysis = analysis_with_subject("A matte black sneaker");
        let overrides = RenderOverrides {
            camera_angle: Some("low_angle".to_string()),
            ..Default::default()
        };
        let first = composer
            .compose(&analysis, "Consumption/Active", Some("tying_laces"), &overrides)
            .unwrap();
        let second = composer
            .compose(&analysis, "Consumption/Active", Some("tying_laces"), &overrides)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn holding_drink_scenario_applies_modifier_and_negative() {
        let (vibes, scenarios) = catalogs();
        let composer = PromptComposer::new(&vibes, &scenarios, RenderDefaults::default());
        let analysis =
            analysis_with_subject("A silver aluminum beverage can with condensation");
        let request = composer
            .compose(
                &analysis,
                "Consumption/Active",
                Some("holding_drink"),
                &RenderOverrides::default(),
            )
            .unwrap();

        assert_eq!(request.structure_guidance_scale, 0.6);
        assert!(request
            .prompt
            .contains("hand naturally holding an aluminum beverage can"));
        assert!(request.negative_prompt.contains("bottle cap"));
        assert!(request.negative_prompt.contains("closed bottle"));
    }

    #[test]
    fn pouring_scenario_forces_open_container() {
        let (vibes, scenarios) = catalogs();
        let composer = PromptComposer::new(&vibes, &scenarios, RenderDefaults::default());
        let analysis = analysis_with_subject("sealed can of lager");
        let request = composer
            .compose(
                &analysis,
                "Consumption/Active",
                Some("pouring_can"),
                &RenderOverrides::default(),
            )
            .unwrap();

        assert!(request
            .prompt
            .contains("opened can of opened can of lager, opened neck, liquid visible at rim"));
        for forbidden in ["sealed", "cap", "lid", "cork"] {
            assert!(
                !request.prompt.contains(forbidden),
                "prompt still contains '{forbidden}': {}",
                request.prompt
            );
        }
        // Scenario CFG rides along as a sibling of the structure lock.
        assert_eq!(request.structure_guidance_scale, 0.6);
        assert_eq!(request.guidance_scale, Some(4.0));
    }

    #[test]
    fn open_container_rule_prefers_bottle_over_can() {
        let rewritten =
            force_open_container("a sealed glass bottle, can-shaped label".to_string());
        assert!(rewritten.starts_with("opened bottle of "));
        assert!(rewritten.ends_with(", opened neck, liquid visible at rim"));
    }

    #[test]
    fn open_container_rule_generic_prefix_without_container_words() {
        let rewritten = force_open_container("a carton of oat milk".to_string());
        assert!(rewritten.starts_with("opened a carton"));
    }

    #[test]
    fn structure_lock_override_wins_over_base() {
        let (vibes, scenarios) = catalogs();
        let composer = PromptComposer::new(&vibes, &scenarios, RenderDefaults::default());
        let analysis = analysis_with_subject("A ceramic vase");
        let overrides = RenderOverrides {
            structure_lock: Some(0.35),
            ..Default::default()
        };
        let request = composer
            .compose(&analysis, "Hero Spotlight", None, &overrides)
            .unwrap();
        assert_eq!(request.structure_guidance_scale, 0.35);
    }

    #[test]
    fn camera_prompt_wins_over_camera_angle() {
        let (vibes, scenarios) = catalogs();
        let composer = PromptComposer::new(&vibes, &scenarios, RenderDefaults::default());
        let analysis = analysis_with_subject("A ceramic vase");
        let overrides = RenderOverrides {
            camera_prompt: Some("Shot from directly overhead.".to_string()),
            camera_angle: Some("low_angle".to_string()),
            ..Default::default()
        };
        let request = composer
            .compose(&analysis, "Tech Abstract", None, &overrides)
            .unwrap();
        assert!(request.prompt.contains("Shot from directly overhead."));
        assert!(!request.prompt.contains("Use a low angle camera angle."));
    }

    #[test]
    fn camera_angle_is_humanized() {
        let (vibes, scenarios) = catalogs();
        let composer = PromptComposer::new(&vibes, &scenarios, RenderDefaults::default());
        let analysis = analysis_with_subject("A ceramic vase");
        let overrides = RenderOverrides {
            camera_angle: Some("low_angle".to_string()),
            ..Default::default()
        };
        let request = composer
            .compose(&analysis, "Tech Abstract", None, &overrides)
            .unwrap();
        assert!(request.prompt.contains("Use a low angle camera angle."));
    }

    #[test]
    fn unknown_scenario_id_is_ignored() {
        let (vibes, scenarios) = catalogs();
        let composer = PromptComposer::new(&vibes, &scenarios, RenderDefaults::default());
        let analysis = analysis_with_subject("A ceramic vase");
        let with_stale = composer
            .compose(
                &analysis,
                "Marketplace Clean",
                Some("deleted_scenario"),
                &RenderOverrides::default(),
            )
            .unwrap();
        let without = composer
            .compose(&analysis, "Marketplace Clean", None, &RenderOverrides::default())
            .unwrap();
        assert_eq!(with_stale, without);
    }

    #[test]
    fn unknown_vibe_is_rejected() {
        let (vibes, scenarios) = catalogs();
        let composer = PromptComposer::new(&vibes, &scenarios, RenderDefaults::default());
        let analysis = analysis_with_subject("A ceramic vase");
        let err = composer
            .compose(&analysis, "Vaporwave", None, &RenderOverrides::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::PromptInvalid(_)));
    }

    #[test]
    fn empty_subject_list_falls_back_to_generic_product() {
        let (vibes, scenarios) = catalogs();
        let composer = PromptComposer::new(&vibes, &scenarios, RenderDefaults::default());
        let analysis: SceneAnalysis = serde_json::from_value(serde_json::json!({
            "global_description": "Nothing recognized.",
            "subjects": []
        }))
        .unwrap();
        let request = composer
            .compose(&analysis, "Marketplace Clean", None, &RenderOverrides::default())
            .unwrap();
        assert!(request.prompt.starts_with("the product."));
    }

    #[test]
    fn subject_colors_and_material_are_appended() {
        let (vibes, scenarios) = catalogs();
        let composer = PromptComposer::new(&vibes, &scenarios, RenderDefaults::default());
        let analysis: SceneAnalysis = serde_json::from_value(serde_json::json!({
            "global_description": "Product photo.",
            "subjects": [{
                "detailed_description": "A beverage can",
                "primary_colors": ["silver", "blue"],
                "attributes": { "material": "aluminum" }
            }]
        }))
        .unwrap();
        let request = composer
            .compose(&analysis, "Marketplace Clean", None, &RenderOverrides::default())
            .unwrap();
        assert!(request
            .prompt
            .contains("Primary colors are silver, blue."));
        assert!(request.prompt.contains("Made of aluminum."));
    }

    #[test]
    fn request_body_omits_absent_guidance_scale() {
        let (vibes, scenarios) = catalogs();
        let composer = PromptComposer::new(&vibes, &scenarios, RenderDefaults::default());
        let analysis = analysis_with_subject("A ceramic vase");
        let request = composer
            .compose(&analysis, "Marketplace Clean", None, &RenderOverrides::default())
            .unwrap();
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("guidance_scale").is_none());
        let lock = body["structure_guidance_scale"].as_f64().unwrap();
        assert!((lock - 0.9).abs() < 1e-6);
        assert_eq!(body["sync"], true);
    }
}
