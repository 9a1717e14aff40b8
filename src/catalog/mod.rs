pub mod loader;
pub mod types;

pub use loader::{load_scenarios, load_vibes};
pub use types::{
    BasePayload, ScenarioCatalog, ScenarioCategory, ScenarioSpec, SubjectRule, VibeCatalog,
    VibeSpec, DEFAULT_CATEGORY,
};
