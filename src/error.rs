/// Error taxonomy for the render pipeline.
///
/// `AnalysisFailed` aborts a session before any generation; the other kinds
/// are scoped to a single vibe and are recorded per-vibe by the orchestrator
/// without aborting the batch.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Scene analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Invalid prompt input: {0}")]
    PromptInvalid(String),

    #[error("Image generation failed: {0}")]
    GenerationFailed(String),

    #[error("Generation timed out after {attempts} polling attempts")]
    GenerationTimeout { attempts: usize },
}

impl PipelineError {
    /// Timeout is treated identically to a service failure at the batch
    /// level; this distinguishes the two for diagnostics only.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PipelineError::GenerationTimeout { .. })
    }
}
