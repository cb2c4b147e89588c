use super::cleaner::clean_generated;
use super::draft_parser::parse_draft;
use super::drafting::generation_context;
use super::prompts::revision_prompt;
use crate::collaborators::{GenerationStep, Generator};
use crate::domain::{Draft, GenerationError, RetryPolicy, RevisionInput, StepError};
use crate::state::WorkflowState;
use crate::structured_logger::StructuredLogger;

/// Produces a new draft addressing exactly one feedback source.
///
/// The caller obtains `input` from `WorkflowState::revision_input`, so a
/// revision never sees both a critique and human feedback. The loop guard has
/// already been checked before this runs.
pub async fn run_revision(
    generator: &dyn Generator,
    state: &WorkflowState,
    input: &RevisionInput,
    policy: &RetryPolicy,
    logger: &StructuredLogger,
) -> Result<Draft, StepError> {
    let Some(current) = state.draft() else {
        return Err(GenerationError::new("no draft to revise").into());
    };

    let prompt = revision_prompt(current, input, state.params().tone);
    let context = generation_context(state, GenerationStep::Revision);
    let fallback_title = current.title.as_str();

    tracing::info!(
        run_id = %state.run_id(),
        phase = %state.phase().with_iteration(state.iteration_count()),
        author = ?input.author(),
        "revising"
    );

    policy
        .run("revision", |attempt| {
            let prompt = &prompt;
            let context = &context;
            async move {
                let result = generator
                    .complete(prompt, context)
                    .await
                    .and_then(|text| parse_draft(&clean_generated(&text), fallback_title));
                logger.log_collaborator_call("revision", attempt, result.is_ok());
                result.map_err(StepError::from)
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::testing::ScriptedGenerator;
    use crate::domain::{Section, Topic};
    use crate::state::RunParameters;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup() -> (WorkflowState, StructuredLogger, TempDir) {
        let dir = TempDir::new().unwrap();
        let logger = StructuredLogger::new("test-run", dir.path()).unwrap();
        let mut state =
            WorkflowState::new(Topic::new("Tides").unwrap(), RunParameters::default());
        state.draft = Some(Draft {
            title: "Tidal Power".into(),
            sections: vec![Section {
                heading: "Basics".into(),
                body: "Moon-driven.".into(),
            }],
        });
        (state, logger, dir)
    }

    const ONE_RETRY: RetryPolicy = RetryPolicy {
        max_retries: 1,
        backoff: Duration::ZERO,
    };

    #[tokio::test]
    async fn test_revision_prompt_uses_only_given_input() {
        let (state, logger, _dir) = setup();
        let generator = ScriptedGenerator::new();
        generator.push_revision(Ok("## Basics\n\nMoon-driven.\n\n## Conclusion\n\nDone.".into()));

        let input = RevisionInput::HumanFeedback("add a conclusion".into());
        let draft = run_revision(&generator, &state, &input, &ONE_RETRY, &logger)
            .await
            .unwrap();

        // Title falls back to the previous draft's title.
        assert_eq!(draft.title, "Tidal Power");
        assert_eq!(draft.headings(), vec!["Basics", "Conclusion"]);

        let calls = generator.calls_for(GenerationStep::Revision);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.contains("add a conclusion"));
        assert!(!calls[0].prompt.contains("Editor Critique"));
    }

    #[tokio::test]
    async fn test_revision_retries_then_fails() {
        let (state, logger, _dir) = setup();
        let generator = ScriptedGenerator::new();
        generator.push_revision(Err(GenerationError::new("timeout")));
        generator.push_revision(Ok("".into()));

        let input = RevisionInput::Critique("too thin".into());
        let err = run_revision(&generator, &state, &input, &ONE_RETRY, &logger)
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Generation(_)));
        assert_eq!(generator.calls_for(GenerationStep::Revision).len(), 2);
    }
}
