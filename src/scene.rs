use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::error::PipelineError;

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid hex color regex"));

/// Structured description of an uploaded product photograph, produced once
/// per image by the scene analyser and immutable thereafter.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneAnalysis {
    pub global_description: String,
    #[serde(default)]
    pub scene_type: SceneType,
    #[serde(default)]
    pub camera: Option<CameraInfo>,
    #[serde(default)]
    pub lighting: Option<LightingInfo>,
    #[serde(default)]
    pub color_palette: Option<ColorPalette>,
    /// The first subject is treated as the primary product.
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub objects_and_details: Vec<ObjectDetail>,
    #[serde(default)]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub composition: Option<Composition>,
    #[serde(default)]
    pub overall_mood: Option<String>,
    #[serde(default = "default_confidence")]
    pub metadata_confidence: f32,
}

fn default_confidence() -> f32 {
    0.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneType {
    Indoor,
    Outdoor,
    Studio,
    Abstract,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CameraInfo {
    #[serde(default)]
    pub shot_type: Option<String>,
    #[serde(default)]
    pub camera_angle: Option<String>,
    #[serde(default, alias = "lens_focal_length_mm")]
    pub focal_length_mm: Option<f32>,
    #[serde(default)]
    pub field_of_view: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub depth_of_field: Option<String>,
    #[serde(default)]
    pub focus_points: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LightingInfo {
    #[serde(default, rename = "type")]
    pub light_type: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub color_temperature: Option<String>,
    #[serde(default)]
    pub intensity: Option<String>,
    #[serde(default)]
    pub shadows: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColorPalette {
    #[serde(default)]
    pub dominant_colors: Vec<String>,
    #[serde(default)]
    pub overall_tone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Subject {
    #[serde(default, rename = "type")]
    pub subject_type: Option<String>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub detailed_description: String,
    #[serde(default)]
    pub position_in_frame: Option<String>,
    #[serde(default)]
    pub attributes: Option<SubjectAttributes>,
    /// Optional enrichment keys some analyses carry at the subject level.
    #[serde(default)]
    pub primary_colors: Option<Vec<String>>,
    #[serde(default)]
    pub material: Option<String>,
}

impl Subject {
    /// Material for prompt synthesis: subject-level key first, then the
    /// extraction schema's `attributes.material`.
    pub fn effective_material(&self) -> Option<&str> {
        self.material
            .as_deref()
            .or_else(|| self.attributes.as_ref().and_then(|a| a.material.as_deref()))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubjectAttributes {
    #[serde(default)]
    pub size_relative: Option<String>,
    #[serde(default)]
    pub shape: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub texture: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub expressions_or_state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectDetail {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub material: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub weather: Option<String>,
    #[serde(default)]
    pub background_elements: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Composition {
    #[serde(default)]
    pub framing: Option<String>,
    #[serde(default)]
    pub visual_balance: Option<String>,
    #[serde(default)]
    pub notable_elements: Vec<String>,
}

pub fn is_valid_hex_color(value: &str) -> bool {
    HEX_COLOR_RE.is_match(value.trim())
}

fn retain_valid_colors(colors: &mut Vec<String>, context: &str) {
    let before = colors.len();
    colors.retain(|color| is_valid_hex_color(color));
    if colors.len() < before {
        warn!(
            "Dropped {} invalid hex color(s) from {}",
            before - colors.len(),
            context
        );
    }
}

impl SceneAnalysis {
    /// Post-parse validation: a successful analysis must name at least one
    /// subject, confidence is clamped to [0,1] and malformed colour entries
    /// are dropped rather than failing the whole analysis.
    pub fn validate(mut self) -> Result<Self, PipelineError> {
        if self.global_description.trim().is_empty() {
            return Err(PipelineError::AnalysisFailed(
                "analysis is missing a global description".to_string(),
            ));
        }
        if self.subjects.is_empty() {
            return Err(PipelineError::AnalysisFailed(
                "analysis contains no subjects".to_string(),
            ));
        }

        self.metadata_confidence = self.metadata_confidence.clamp(0.0, 1.0);

        if let Some(palette) = self.color_palette.as_mut() {
            retain_valid_colors(&mut palette.dominant_colors, "color_palette");
        }
        for detail in self.objects_and_details.iter_mut() {
            retain_valid_colors(&mut detail.colors, "objects_and_details");
        }

        Ok(self)
    }

    pub fn primary_subject(&self) -> Option<&Subject> {
        self.subjects.first()
    }
}
