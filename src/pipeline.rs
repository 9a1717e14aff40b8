use std::future::Future;

use tracing::{info, warn};

use crate::catalog::{ScenarioCatalog, VibeCatalog};
use crate::composer::{GenerationRequest, PromptComposer, RenderDefaults, RenderOverrides};
use crate::error::PipelineError;
use crate::llm::bria::{BriaClient, GenerationResult};
use crate::scene::SceneAnalysis;

/// Seam between the orchestrator and the generation service, so batch
/// behaviour can be exercised without a network.
pub trait GenerationBackend {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<GenerationResult, PipelineError>> + Send;
}

impl GenerationBackend for BriaClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, PipelineError> {
        BriaClient::generate(self, request).await
    }
}

/// One requested render: a vibe plus its optional scenario and options.
#[derive(Debug, Clone, Default)]
pub struct VibeSelection {
    pub vibe: String,
    pub scenario_id: Option<String>,
    pub overrides: RenderOverrides,
}

/// Per-vibe outcome. Failures are recorded, not propagated, so one bad vibe
/// never costs the rest of the batch.
#[derive(Debug)]
pub struct VibeOutcome {
    pub vibe: String,
    pub result: Result<GenerationResult, PipelineError>,
}

/// Public entry point (C7): composes and dispatches one request per selected
/// vibe, sequentially and in selection order, so progress reporting to the
/// caller is monotone and per-vibe.
pub struct Pipeline<'a, B> {
    composer: PromptComposer<'a>,
    backend: &'a B,
}

impl<'a, B: GenerationBackend> Pipeline<'a, B> {
    pub fn new(
        vibes: &'a VibeCatalog,
        scenarios: &'a ScenarioCatalog,
        defaults: RenderDefaults,
        backend: &'a B,
    ) -> Self {
        Pipeline {
            composer: PromptComposer::new(vibes, scenarios, defaults),
            backend,
        }
    }

    pub async fn run(
        &self,
        analysis: &SceneAnalysis,
        selection: &[VibeSelection],
    ) -> Vec<VibeOutcome> {
        let mut outcomes = Vec::with_capacity(selection.len());

        for (index, entry) in selection.iter().enumerate() {
            info!(
                "Rendering vibe '{}' ({}/{})",
                entry.vibe,
                index + 1,
                selection.len()
            );

            let result = match self.composer.compose(
                analysis,
                &entry.vibe,
                entry.scenario_id.as_deref(),
                &entry.overrides,
            ) {
                Ok(request) => self.backend.generate(&request).await,
                Err(err) => Err(err),
            };

            match &result {
                Ok(generated) => info!(
                    "Vibe '{}' completed in {:.1}s (request_id={:?})",
                    entry.vibe,
                    generated.latency.as_secs_f64(),
                    generated.request_id
                ),
                Err(err) => warn!("Vibe '{}' failed: {err}", entry.vibe),
            }

            outcomes.push(VibeOutcome {
                vibe: entry.vibe.clone(),
                result,
            });
        }

        outcomes
    }
}
