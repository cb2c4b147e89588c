//! Scripted collaborator doubles for tests.

use super::{
    GenerationContext, GenerationStep, Generator, RenderRequest, RenderedArtifact, Renderer,
    Retriever,
};
use crate::domain::{Excerpt, GenerationError, RenderError, RetrievalError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub struct ScriptedRetriever {
    response: Result<Vec<Excerpt>, RetrievalError>,
}

impl ScriptedRetriever {
    pub fn with_sources(sources: &[&str]) -> Self {
        Self {
            response: Ok(sources
                .iter()
                .map(|s| Excerpt {
                    text: format!("Findings from {}", s),
                    source: s.to_string(),
                })
                .collect()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(RetrievalError::new(message)),
        }
    }

    pub fn with_excerpts(excerpts: Vec<Excerpt>) -> Self {
        Self {
            response: Ok(excerpts),
        }
    }
}

#[async_trait]
impl Retriever for ScriptedRetriever {
    async fn search(&self, _query: &str) -> Result<Vec<Excerpt>, RetrievalError> {
        self.response.clone()
    }
}

/// A recorded generator call.
#[derive(Debug, Clone)]
pub struct GeneratorCall {
    pub step: GenerationStep,
    pub prompt: String,
    pub iteration: u32,
}

/// Generator that answers from per-step queues and records every call.
///
/// When a queue runs dry the step falls back to a canned answer: a fresh
/// draft for draft/revision, `REJECTED` for review.
pub struct ScriptedGenerator {
    drafts: Mutex<VecDeque<Result<String, GenerationError>>>,
    reviews: Mutex<VecDeque<Result<String, GenerationError>>>,
    revisions: Mutex<VecDeque<Result<String, GenerationError>>>,
    calls: Mutex<Vec<GeneratorCall>>,
    delay: Option<Duration>,
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            drafts: Mutex::new(VecDeque::new()),
            reviews: Mutex::new(VecDeque::new()),
            revisions: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Reviewer that always rejects.
    pub fn always_reject() -> Self {
        Self::new()
    }

    /// Queues review answers in order: `true` accepts, `false` rejects.
    pub fn with_reviews(verdicts: &[bool]) -> Self {
        let generator = Self::new();
        for accepted in verdicts {
            generator.push_review(if *accepted {
                "VERDICT: ACCEPTED".to_string()
            } else {
                "VERDICT: REJECTED\nCRITIQUE: Needs more supporting data.".to_string()
            });
        }
        generator
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_draft(&self, result: Result<String, GenerationError>) {
        self.drafts.lock().unwrap().push_back(result);
    }

    pub fn push_review(&self, text: String) {
        self.reviews.lock().unwrap().push_back(Ok(text));
    }

    pub fn push_revision(&self, result: Result<String, GenerationError>) {
        self.revisions.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<GeneratorCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, step: GenerationStep) -> Vec<GeneratorCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.step == step)
            .collect()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn complete(
        &self,
        prompt: &str,
        context: &GenerationContext,
    ) -> Result<String, GenerationError> {
        self.calls.lock().unwrap().push(GeneratorCall {
            step: context.step,
            prompt: prompt.to_string(),
            iteration: context.iteration,
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queue = match context.step {
            GenerationStep::Draft => &self.drafts,
            GenerationStep::Review => &self.reviews,
            GenerationStep::Revision => &self.revisions,
        };
        if let Some(next) = queue.lock().unwrap().pop_front() {
            return next;
        }

        Ok(match context.step {
            GenerationStep::Draft => format!(
                "# {}\n\n## Overview\n\nAn overview of {}.\n\n## Conclusion\n\nClosing thoughts.",
                context.topic, context.topic
            ),
            GenerationStep::Revision => format!(
                "# {}\n\n## Overview\n\nRevision {} of {}.\n\n## Conclusion\n\nClosing thoughts.",
                context.topic,
                context.iteration + 1,
                context.topic
            ),
            GenerationStep::Review => {
                "VERDICT: REJECTED\nCRITIQUE: Needs more supporting data.".to_string()
            }
        })
    }
}

/// Renderer that fails a fixed number of times before succeeding.
pub struct FlakyRenderer {
    failures_left: AtomicU32,
    calls: AtomicU32,
}

impl FlakyRenderer {
    pub fn failing(times: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(times),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for FlakyRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedArtifact, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(RenderError::new("backend unavailable"));
        }
        let text = request
            .sections
            .iter()
            .map(|s| format!("{}\n{}", s.heading, s.body))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(RenderedArtifact {
            bytes: text.into_bytes(),
            page_count: 1,
            media_type: "text/plain".to_string(),
            extension: "txt".to_string(),
        })
    }
}
