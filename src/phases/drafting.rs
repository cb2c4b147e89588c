use super::cleaner::clean_generated;
use super::draft_parser::parse_draft;
use super::prompts::draft_prompt;
use crate::collaborators::{GenerationContext, GenerationStep, Generator};
use crate::domain::{Draft, GenerationError, RetryPolicy, StepError};
use crate::state::WorkflowState;
use crate::structured_logger::StructuredLogger;

/// Builds the generation context for a step from the run state.
pub(crate) fn generation_context(state: &WorkflowState, step: GenerationStep) -> GenerationContext {
    GenerationContext {
        step,
        topic: state.topic().to_string(),
        content_format: state.params().content_format,
        tone: state.params().tone,
        iteration: state.iteration_count(),
    }
}

/// Produces the initial draft from the research material.
///
/// Empty or malformed output counts as a `GenerationError` and is retried
/// according to `policy`.
pub async fn run_drafting(
    generator: &dyn Generator,
    state: &WorkflowState,
    policy: &RetryPolicy,
    logger: &StructuredLogger,
) -> Result<Draft, StepError> {
    if state.research_material().is_empty() {
        return Err(GenerationError::new("no research material to draft from").into());
    }

    let params = state.params();
    let prompt = draft_prompt(
        state.topic().as_str(),
        state.research_material(),
        params.content_format,
        params.tone,
    );
    let context = generation_context(state, GenerationStep::Draft);

    tracing::info!(
        run_id = %state.run_id(),
        format = params.content_format.label(),
        tone = params.tone.label(),
        "drafting"
    );

    policy
        .run("draft", |attempt| {
            let prompt = &prompt;
            let context = &context;
            async move {
                let result = generator
                    .complete(prompt, context)
                    .await
                    .and_then(|text| parse_draft(&clean_generated(&text), state.topic().as_str()));
                logger.log_collaborator_call("draft", attempt, result.is_ok());
                result.map_err(StepError::from)
            }
        })
        .await
}
