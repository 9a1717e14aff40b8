use std::env;
use std::path::PathBuf;

use anyhow::Result;

/// Runtime configuration for the render pipeline.
///
/// Loaded once at startup from the environment and passed explicitly to the
/// service clients; the crate keeps no global configuration state.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub bria_api_key: String,
    pub bria_endpoint: String,
    pub default_width: u32,
    pub default_height: u32,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: usize,
    pub log_level: String,
    pub vibes_path: PathBuf,
    pub scenarios_path: PathBuf,
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn resolve_data_path(name: &str, default: &str) -> PathBuf {
    if let Ok(value) = env::var(name) {
        return PathBuf::from(value);
    }
    let candidates = [PathBuf::from(default), PathBuf::from("..").join(default)];
    for candidate in &candidates {
        if candidate.exists() {
            return candidate.clone();
        }
    }
    PathBuf::from(default)
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let gemini_api_key = env::var("GEMINI_API_KEY").unwrap_or_default();
        if gemini_api_key.trim().is_empty() {
            return Err(anyhow::anyhow!("GEMINI_API_KEY is required"));
        }
        let bria_api_key = env::var("BRIA_API_KEY").unwrap_or_default();
        if bria_api_key.trim().is_empty() {
            return Err(anyhow::anyhow!("BRIA_API_KEY is required"));
        }

        Ok(Config {
            gemini_api_key,
            gemini_model: env_string("GEMINI_MODEL", "gemini-flash-lite-latest"),
            bria_api_key,
            bria_endpoint: env_string(
                "BRIA_API_ENDPOINT",
                "https://engine.prod.bria-api.com/v2/image/generate",
            ),
            default_width: env_u32("DEFAULT_IMAGE_WIDTH", 1024),
            default_height: env_u32("DEFAULT_IMAGE_HEIGHT", 1024),
            poll_interval_secs: env_u64("POLL_INTERVAL_SECONDS", 2),
            max_poll_attempts: env_usize("MAX_POLL_ATTEMPTS", 30),
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            vibes_path: resolve_data_path("VIBES_CONFIG_PATH", "data/vibes.yaml"),
            scenarios_path: resolve_data_path("SCENARIOS_CONFIG_PATH", "data/scenarios.yaml"),
        })
    }
}

/// Fixed extraction prompt sent with every scene-analysis request. The model
/// must answer with the JSON shape `scene::SceneAnalysis` deserializes.
pub const SCENE_ANALYSIS_PROMPT: &str = r##"
You are an advanced visual-analysis agent specialized in professional, structured, JSON-native image descriptions.
Your task is to analyze this image and produce the most detailed, high-precision, production-grade JSON description possible.

OUTPUT RULES:
- Output ONLY valid JSON.
- JSON must contain no comments, explanation, or text outside the JSON structure.
- All fields must be as detailed, objective, and specific as possible.
- Never invent objects that do not appear in the image.
- Maintain a highly consistent, professional taxonomy.

JSON FORMAT REQUIREMENTS:
{
  "global_description": "A detailed paragraph summarizing the full scene.",
  "scene_type": "indoor | outdoor | studio | abstract | unknown",
  "camera": {
    "shot_type": "wide | medium | close-up | macro | aerial | etc",
    "camera_angle": "eye-level | low-angle | high-angle | bird's-eye | dutch-angle | etc",
    "lens_focal_length_mm": 35,
    "field_of_view": "narrow | medium | wide | ultra-wide",
    "aspect_ratio": "e.g., 16:9, 3:2, 1:1",
    "depth_of_field": "shallow | medium | deep",
    "focus_points": "What the camera focuses on"
  },
  "lighting": {
    "type": "natural | studio | ambient | harsh | soft | cinematic | etc",
    "direction": "front | side | back | top | multiple",
    "color_temperature": "warm | neutral | cool",
    "intensity": "low | medium | high",
    "shadows": "soft | sharp | diffused"
  },
  "color_palette": {
    "dominant_colors": ["#hex1", "#hex2", "#hex3"],
    "overall_tone": "vibrant | muted | high-contrast | pastel | monochromatic | etc"
  },
  "subjects": [
    {
      "type": "person | animal | object | environment feature",
      "count": 1,
      "detailed_description": "Highly detailed description of each subject.",
      "position_in_frame": "left | right | center | foreground | midground | background",
      "attributes": {
         "size_relative": "small | medium | large",
         "shape": "descriptive shape",
         "material": "wood | metal | fabric | plastic | etc",
         "texture": "smooth | rough | glossy | matte | etc",
         "color": "precise color(s)",
         "expressions_or_state": "if applicable (emotion, posture, action)"
      }
    }
  ],
  "objects_and_details": [
    {
      "name": "object name",
      "description": "precise details",
      "position": "location in frame",
      "colors": ["#hex1", "#hex2"],
      "material": "type if identifiable"
    }
  ],
  "environment": {
    "location": "type of environment",
    "weather": "if applicable",
    "background_elements": "detailed list"
  },
  "composition": {
    "framing": "rule of thirds | centered | symmetrical | leading lines | etc",
    "visual_balance": "balanced | unbalanced | dynamic",
    "notable_elements": ["anything visually important"]
  },
  "overall_mood": "emotionally and atmospherically descriptive phrase",
  "metadata_confidence": 0.9
}

Ensure every field is filled with maximum detail and precision.
"##;
