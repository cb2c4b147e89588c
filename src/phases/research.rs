use crate::collaborators::Retriever;
use crate::domain::{Excerpt, RetrievalError, StepError};
use crate::state::WorkflowState;
use crate::structured_logger::StructuredLogger;

/// Queries the retrieval collaborator with the run topic.
///
/// Blank excerpts are dropped. Not retried here: a failing or empty search is
/// fatal for the run.
pub async fn run_research(
    retriever: &dyn Retriever,
    state: &WorkflowState,
    logger: &StructuredLogger,
) -> Result<Vec<Excerpt>, StepError> {
    let topic = state.topic().as_str();
    tracing::info!(run_id = %state.run_id(), topic, "researching");

    let result = retriever.search(topic).await.and_then(|material| {
        let usable: Vec<Excerpt> = material
            .into_iter()
            .filter(|e| !e.text.trim().is_empty())
            .collect();
        if usable.is_empty() {
            Err(RetrievalError::new("no usable sources returned"))
        } else {
            Ok(usable)
        }
    });
    logger.log_collaborator_call("research", 0, result.is_ok());

    let material = result?;
    tracing::info!(excerpts = material.len(), "research complete");
    Ok(material)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::testing::ScriptedRetriever;
    use crate::domain::Topic;
    use crate::state::RunParameters;
    use tempfile::TempDir;

    fn setup() -> (WorkflowState, StructuredLogger, TempDir) {
        let dir = TempDir::new().unwrap();
        let logger = StructuredLogger::new("test-run", dir.path()).unwrap();
        let state = WorkflowState::new(Topic::new("Tides").unwrap(), RunParameters::default());
        (state, logger, dir)
    }

    #[tokio::test]
    async fn test_research_returns_material() {
        let (state, logger, _dir) = setup();
        let retriever = ScriptedRetriever::with_sources(&["https://a.example"]);
        let material = run_research(&retriever, &state, &logger).await.unwrap();
        assert_eq!(material.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_results_are_retrieval_error() {
        let (state, logger, _dir) = setup();
        let retriever = ScriptedRetriever::with_sources(&[]);
        let err = run_research(&retriever, &state, &logger).await.unwrap_err();
        assert!(matches!(err, StepError::Retrieval(_)));
    }

    #[tokio::test]
    async fn test_blank_excerpts_are_dropped() {
        let (state, logger, _dir) = setup();
        let excerpt = |text: &str, source: &str| Excerpt {
            text: text.into(),
            source: source.into(),
        };
        let retriever = ScriptedRetriever::with_excerpts(vec![
            excerpt("  ", "https://blank.example"),
            excerpt("Tides follow the moon.", "https://a.example"),
            excerpt("", "https://empty.example"),
        ]);
        let material = run_research(&retriever, &state, &logger).await.unwrap();
        assert_eq!(material, vec![excerpt("Tides follow the moon.", "https://a.example")]);

        let retriever = ScriptedRetriever::with_excerpts(vec![excerpt("\n", "https://a.example")]);
        let err = run_research(&retriever, &state, &logger).await.unwrap_err();
        assert!(matches!(err, StepError::Retrieval(_)));
    }

    #[tokio::test]
    async fn test_collaborator_error_propagates() {
        let (state, logger, _dir) = setup();
        let retriever = ScriptedRetriever::failing("search backend down");
        let err = run_research(&retriever, &state, &logger).await.unwrap_err();
        assert_eq!(err.to_string(), "retrieval failed: search backend down");
    }
}
