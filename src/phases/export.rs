use crate::collaborators::{RenderRequest, Renderer};
use crate::domain::{FinalDocument, RenderError, StepError};
use crate::state::WorkflowState;
use crate::structured_logger::StructuredLogger;

/// Builds the render request for the accepted draft.
pub fn render_request(state: &WorkflowState) -> Result<RenderRequest, RenderError> {
    if !state.review_verdict().is_accepted() {
        return Err(RenderError::new(format!(
            "cannot export a draft with verdict {}",
            state.review_verdict().label()
        )));
    }
    let draft = state
        .draft()
        .ok_or_else(|| RenderError::new("no draft to export"))?;

    Ok(RenderRequest {
        title: draft.title.clone(),
        topic: state.topic().to_string(),
        run_id: state.run_id().to_string(),
        content_format: state.params().content_format,
        tone: state.params().tone,
        iteration_count: state.iteration_count(),
        sections: draft.sections.clone(),
        sources: state.sources().into_iter().map(str::to_string).collect(),
    })
}

/// Renders the accepted draft. A render failure is fatal for the run but
/// leaves the draft in place so export can be retried on its own.
pub async fn run_export(
    renderer: &dyn Renderer,
    state: &WorkflowState,
    logger: &StructuredLogger,
) -> Result<FinalDocument, StepError> {
    let request = render_request(state)?;
    tracing::info!(run_id = %state.run_id(), sections = request.sections.len(), "exporting");

    let result = renderer.render(&request).await;
    logger.log_collaborator_call("export", 0, result.is_ok());
    let artifact = result?;

    let file_name = format!("{}.{}", state.topic().slug(), artifact.extension);
    let document = FinalDocument::new(
        file_name,
        artifact.media_type,
        artifact.page_count,
        artifact.bytes,
    );
    tracing::info!(
        pages = document.page_count,
        sha256 = %document.sha256,
        "export complete"
    );
    Ok(document)
}
