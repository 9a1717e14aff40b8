pub mod bria;
pub mod gemini;
pub mod media;

pub use bria::{BriaClient, CompletionStatus, GenerationResult};
pub use gemini::SceneAnalyzer;
