//! Turns a single product photograph into a set of styled marketing renders.
//!
//! The flow: an uploaded photo is analysed by an external vision model into a
//! structured [`scene::SceneAnalysis`]; for each selected vibe the
//! [`composer::PromptComposer`] assembles a deterministic generation request
//! (positive prompt, negative prompt, structure lock), which the
//! [`llm::BriaClient`] dispatches to the external image-generation service;
//! the [`pipeline::Pipeline`] drives the per-vibe batch and collects results.
//!
//! ```no_run
//! use context_chameleon::catalog::{load_scenarios, load_vibes};
//! use context_chameleon::composer::RenderDefaults;
//! use context_chameleon::config::Config;
//! use context_chameleon::llm::{BriaClient, SceneAnalyzer};
//! use context_chameleon::pipeline::{Pipeline, VibeSelection};
//!
//! # async fn run(photo: &[u8]) -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let vibes = load_vibes(&config.vibes_path)?;
//! let scenarios = load_scenarios(&config.scenarios_path)?;
//!
//! let analysis = SceneAnalyzer::new(&config).analyze(photo).await?;
//! let client = BriaClient::new(&config)?;
//! let pipeline = Pipeline::new(
//!     &vibes,
//!     &scenarios,
//!     RenderDefaults::from_config(&config),
//!     &client,
//! );
//! let outcomes = pipeline
//!     .run(
//!         &analysis,
//!         &[VibeSelection {
//!             vibe: "Marketplace Clean".to_string(),
//!             ..Default::default()
//!         }],
//!     )
//!     .await;
//! # let _ = outcomes;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod composer;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod resolver;
pub mod scene;
pub mod utils;

pub use composer::{GenerationRequest, PromptComposer, RenderDefaults, RenderOverrides};
pub use error::PipelineError;
pub use llm::{BriaClient, GenerationResult, SceneAnalyzer};
pub use pipeline::{GenerationBackend, Pipeline, VibeOutcome, VibeSelection};
pub use resolver::scenarios_for;
pub use scene::SceneAnalysis;
