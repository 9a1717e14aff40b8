use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use crate::catalog::types::{ScenarioCatalog, VibeCatalog, DEFAULT_CATEGORY};

fn validate_vibes(catalog: &VibeCatalog) -> Result<()> {
    if catalog.vibes.is_empty() {
        return Err(anyhow!("Vibe catalogue contains no vibes"));
    }

    let mut seen = HashSet::new();
    for vibe in &catalog.vibes {
        let name = vibe.name.trim();
        if name.is_empty() {
            return Err(anyhow!("Vibe name cannot be empty"));
        }
        if !seen.insert(name.to_string()) {
            return Err(anyhow!("Duplicate vibe name '{}'", name));
        }
        if let Some(lock) = vibe.payload.as_ref().and_then(|payload| payload.structure_lock) {
            if !(0.0..=1.0).contains(&lock) {
                return Err(anyhow!(
                    "Vibe '{}' has structure_lock {} outside [0, 1]",
                    name,
                    lock
                ));
            }
        }
    }
    Ok(())
}

fn validate_scenarios(catalog: &ScenarioCatalog) -> Result<()> {
    if catalog.category(DEFAULT_CATEGORY).is_none() {
        return Err(anyhow!(
            "Scenario catalogue is missing the mandatory '{}' category",
            DEFAULT_CATEGORY
        ));
    }

    for category in &catalog.categories {
        let mut seen = HashSet::new();
        for scenario in &category.scenarios {
            let id = scenario.id.trim();
            if id.is_empty() {
                return Err(anyhow!(
                    "Category '{}' contains a scenario with an empty id",
                    category.name
                ));
            }
            if !seen.insert(id.to_string()) {
                return Err(anyhow!(
                    "Duplicate scenario id '{}' in category '{}'",
                    id,
                    category.name
                ));
            }
        }
    }

    for rule in &catalog.subject_map {
        if rule.keyword.trim().is_empty() {
            return Err(anyhow!("Subject map contains an empty keyword"));
        }
        if catalog.category(&rule.category).is_none() {
            warn!(
                "Subject map keyword '{}' points at unknown category '{}'; \
                 lookups will fall back to '{}'",
                rule.keyword, rule.category, DEFAULT_CATEGORY
            );
        }
    }
    Ok(())
}

pub fn load_vibes(path: &Path) -> Result<VibeCatalog> {
    let raw = fs::read_to_string(path)
        .map_err(|err| anyhow!("Failed to read vibe catalogue '{}': {}", path.display(), err))?;
    let catalog = parse_vibes(&raw)
        .map_err(|err| anyhow!("Invalid vibe catalogue '{}': {}", path.display(), err))?;
    info!("Loaded {} vibe(s) from {}", catalog.vibes.len(), path.display());
    Ok(catalog)
}

pub fn load_scenarios(path: &Path) -> Result<ScenarioCatalog> {
    let raw = fs::read_to_string(path).map_err(|err| {
        anyhow!(
            "Failed to read scenario catalogue '{}': {}",
            path.display(),
            err
        )
    })?;
    let catalog = parse_scenarios(&raw)
        .map_err(|err| anyhow!("Invalid scenario catalogue '{}': {}", path.display(), err))?;
    info!(
        "Loaded {} scenario categorie(s) and {} subject rule(s) from {}",
        catalog.categories.len(),
        catalog.subject_map.len(),
        path.display()
    );
    Ok(catalog)
}

pub fn parse_vibes(raw: &str) -> Result<VibeCatalog> {
    let catalog: VibeCatalog = serde_yaml::from_str(raw)?;
    validate_vibes(&catalog)?;
    Ok(catalog)
}

pub fn parse_scenarios(raw: &str) -> Result<ScenarioCatalog> {
    let catalog: ScenarioCatalog = serde_yaml::from_str(raw)?;
    validate_scenarios(&catalog)?;
    Ok(catalog)
}
