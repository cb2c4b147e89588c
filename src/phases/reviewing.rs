use super::drafting::generation_context;
use super::prompts::review_prompt;
use super::verdict::{parse_review, ParsedReview, INCONCLUSIVE_CRITIQUE};
use crate::collaborators::{GenerationStep, Generator};
use crate::domain::ReviewVerdict;
use crate::state::WorkflowState;
use crate::structured_logger::StructuredLogger;

/// Asks the generator to judge the current draft against the rubric.
///
/// Always yields ACCEPTED or REJECTED. A collaborator error or an unparsable
/// response becomes a rejection with a generic critique so the loop keeps
/// moving; the loop guard still bounds it.
pub async fn run_review(
    generator: &dyn Generator,
    state: &WorkflowState,
    logger: &StructuredLogger,
) -> ReviewVerdict {
    let Some(draft) = state.draft() else {
        tracing::warn!(run_id = %state.run_id(), "review requested without a draft");
        return inconclusive();
    };

    let label = state.phase().with_iteration(state.iteration_count());
    tracing::info!(run_id = %state.run_id(), phase = %label, "reviewing");

    let prompt = review_prompt(draft, state.research_material());
    let context = generation_context(state, GenerationStep::Review);

    let response = generator.complete(&prompt, &context).await;
    logger.log_collaborator_call("review", 0, response.is_ok());

    let verdict = match response {
        Ok(text) => match parse_review(&text) {
            ParsedReview::Verdict(verdict) => verdict,
            parsed @ ParsedReview::Inconclusive { .. } => {
                tracing::warn!(?parsed, "review output had no verdict");
                parsed.into_verdict()
            }
        },
        Err(err) => {
            tracing::warn!(error = %err, "review call failed, treating as rejection");
            inconclusive()
        }
    };

    tracing::info!(verdict = verdict.label(), "review complete");
    verdict
}

fn inconclusive() -> ReviewVerdict {
    ReviewVerdict::Rejected {
        critique: INCONCLUSIVE_CRITIQUE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::testing::ScriptedGenerator;
    use crate::domain::{Draft, GenerationError, Section, Topic};
    use crate::state::RunParameters;
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn setup() -> (WorkflowState, StructuredLogger, TempDir) {
        let dir = TempDir::new().unwrap();
        let logger = StructuredLogger::new("test-run", dir.path()).unwrap();
        let mut state =
            WorkflowState::new(Topic::new("Tides").unwrap(), RunParameters::default());
        state.draft = Some(Draft {
            title: "Tides".into(),
            sections: vec![Section {
                heading: "Overview".into(),
                body: "Moon-driven.".into(),
            }],
        });
        (state, logger, dir)
    }

    struct BrokenGenerator;

    #[async_trait]
    impl Generator for BrokenGenerator {
        async fn complete(
            &self,
            _prompt: &str,
            _context: &crate::collaborators::GenerationContext,
        ) -> Result<String, GenerationError> {
            Err(GenerationError::new("rate limited"))
        }
    }

    #[tokio::test]
    async fn test_review_accepts() {
        let (state, logger, _dir) = setup();
        let generator = ScriptedGenerator::with_reviews(&[true]);
        assert_eq!(
            run_review(&generator, &state, &logger).await,
            ReviewVerdict::Accepted
        );
    }

    #[tokio::test]
    async fn test_review_rejects_with_critique() {
        let (state, logger, _dir) = setup();
        let generator = ScriptedGenerator::with_reviews(&[false]);
        let verdict = run_review(&generator, &state, &logger).await;
        assert_eq!(verdict.critique(), Some("Needs more supporting data."));
    }

    #[tokio::test]
    async fn test_unparsable_review_is_rejection() {
        let (state, logger, _dir) = setup();
        let generator = ScriptedGenerator::new();
        generator.push_review("Looks great, ship it!".into());
        let verdict = run_review(&generator, &state, &logger).await;
        assert_eq!(verdict.critique(), Some(INCONCLUSIVE_CRITIQUE));
    }

    #[tokio::test]
    async fn test_collaborator_error_is_rejection() {
        let (state, logger, _dir) = setup();
        let verdict = run_review(&BrokenGenerator, &state, &logger).await;
        assert_eq!(verdict.critique(), Some(INCONCLUSIVE_CRITIQUE));
    }
}
