use tracing::debug;

use crate::catalog::{ScenarioCatalog, ScenarioSpec, VibeCatalog, DEFAULT_CATEGORY};
use crate::scene::SceneAnalysis;

/// Scenarios to offer for a chosen vibe, in UI presentation order.
///
/// Non-scenario-driven vibes (and unknown vibe names) get no scenarios. For
/// scenario-driven vibes the primary subject's description is matched
/// against the subject map in declaration order; no match, or a match whose
/// category is absent from the catalogue, falls back to the `default`
/// category.
pub fn scenarios_for<'a>(
    analysis: &SceneAnalysis,
    vibe_name: &str,
    vibes: &VibeCatalog,
    scenarios: &'a ScenarioCatalog,
) -> Vec<&'a ScenarioSpec> {
    let Some(vibe) = vibes.get(vibe_name) else {
        return Vec::new();
    };
    if !vibe.scenario_driven {
        return Vec::new();
    }

    let description = analysis
        .primary_subject()
        .map(|subject| subject.detailed_description.as_str())
        .unwrap_or("");
    let category_name = scenarios
        .category_for_subject(description)
        .unwrap_or(DEFAULT_CATEGORY);
    debug!(
        "Resolved scenario category '{}' for vibe '{}'",
        category_name, vibe_name
    );

    scenarios
        .category(category_name)
        .or_else(|| scenarios.category(DEFAULT_CATEGORY))
        .map(|category| category.scenarios.iter().collect())
        .unwrap_or_default()
}
