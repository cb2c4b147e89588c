//! External collaborators invoked by the pipeline steps.
//!
//! Each collaborator sits behind a narrow async trait so the orchestrator can
//! be driven by external processes in production and scripted doubles in tests.

pub mod command;
pub mod render;

#[cfg(test)]
pub mod testing;

use crate::domain::{
    ContentFormat, Excerpt, GenerationError, RenderError, RetrievalError, Section, Tone,
};
use async_trait::async_trait;
use serde::Serialize;

pub use command::{CommandGenerator, CommandRetriever};
pub use render::PagedTextRenderer;

/// Which step is asking the generator for text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStep {
    Draft,
    Review,
    Revision,
}

impl GenerationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStep::Draft => "draft",
            GenerationStep::Review => "review",
            GenerationStep::Revision => "revision",
        }
    }
}

/// Structured context sent alongside every generation prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationContext {
    pub step: GenerationStep,
    pub topic: String,
    pub content_format: ContentFormat,
    pub tone: Tone,
    /// Revisions completed before this call.
    pub iteration: u32,
}

/// Everything the renderer needs to lay out the final document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderRequest {
    pub title: String,
    pub topic: String,
    pub run_id: String,
    pub content_format: ContentFormat,
    pub tone: Tone,
    pub iteration_count: u32,
    pub sections: Vec<Section>,
    pub sources: Vec<String>,
}

/// Bytes produced by a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    pub bytes: Vec<u8>,
    pub page_count: u32,
    pub media_type: String,
    /// File extension without the dot.
    pub extension: String,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Looks up source material for a query.
    async fn search(&self, query: &str) -> Result<Vec<Excerpt>, RetrievalError>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Produces text for a prompt. Used for drafting, review and revision.
    async fn complete(
        &self,
        prompt: &str,
        context: &GenerationContext,
    ) -> Result<String, GenerationError>;
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedArtifact, RenderError>;
}
