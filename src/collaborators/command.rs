//! Collaborators backed by external processes.
//!
//! The retriever runs `command args... <query>` and reads JSON search results
//! from stdout. The generator writes the prompt to stdin and reads the
//! completion from stdout; the structured context travels in environment
//! variables so any script or CLI can act as a backend.

use super::{GenerationContext, Generator, Retriever};
use crate::config::CommandConfig;
use crate::domain::{Excerpt, GenerationError, RetrievalError};
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Source label for search hits that carry no reference.
const UNATTRIBUTED: &str = "unattributed";

#[derive(Debug, Clone)]
pub struct CommandRetriever {
    config: CommandConfig,
}

impl CommandRetriever {
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Retriever for CommandRetriever {
    async fn search(&self, query: &str) -> Result<Vec<Excerpt>, RetrievalError> {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .arg(query)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(command = %self.config.command, query, "running retrieval command");

        let output = cmd.output().await.map_err(|e| {
            RetrievalError::new(format!("failed to spawn {}: {}", self.config.command, e))
        })?;

        if !output.status.success() {
            return Err(RetrievalError::new(format!(
                "{} exited with {}: {}",
                self.config.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_search_output(&String::from_utf8_lossy(&output.stdout))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Hits(Vec<SearchHit>),
    Wrapped { results: Vec<SearchHit> },
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(alias = "content")]
    excerpt: Option<String>,
    #[serde(alias = "url")]
    source: Option<String>,
}

/// Parses retrieval stdout into excerpts, dropping hits with no text.
pub(crate) fn parse_search_output(stdout: &str) -> Result<Vec<Excerpt>, RetrievalError> {
    let response: SearchResponse = serde_json::from_str(stdout.trim())
        .map_err(|e| RetrievalError::new(format!("malformed search results: {}", e)))?;

    let hits = match response {
        SearchResponse::Hits(hits) => hits,
        SearchResponse::Wrapped { results } => results,
    };

    let excerpts: Vec<Excerpt> = hits
        .into_iter()
        .filter_map(|hit| {
            let text = hit.excerpt?.trim().to_string();
            if text.is_empty() {
                return None;
            }
            let source = hit
                .source
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| UNATTRIBUTED.to_string());
            Some(Excerpt { text, source })
        })
        .collect();

    if excerpts.is_empty() {
        return Err(RetrievalError::new("no usable sources returned"));
    }
    Ok(excerpts)
}

#[derive(Debug, Clone)]
pub struct CommandGenerator {
    config: CommandConfig,
}

impl CommandGenerator {
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Generator for CommandGenerator {
    async fn complete(
        &self,
        prompt: &str,
        context: &GenerationContext,
    ) -> Result<String, GenerationError> {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .env("ALCHEMIST_STEP", context.step.as_str())
            .env("ALCHEMIST_TOPIC", &context.topic)
            .env("ALCHEMIST_FORMAT", context.content_format.label())
            .env("ALCHEMIST_TONE", context.tone.label())
            .env("ALCHEMIST_ITERATION", context.iteration.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            command = %self.config.command,
            step = context.step.as_str(),
            prompt_len = prompt.len(),
            "running generation command"
        );

        let mut child = cmd.spawn().map_err(|e| {
            GenerationError::new(format!("failed to spawn {}: {}", self.config.command, e))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| GenerationError::new("failed to open generator stdin"))?;
        // Feed stdin while draining stdout, or a backend that streams output
        // before reading all input fills the pipe and both sides block.
        let write_prompt = async move {
            let written = stdin.write_all(prompt.as_bytes()).await;
            drop(stdin);
            written
        };
        let (written, output) = tokio::join!(write_prompt, child.wait_with_output());

        let output =
            output.map_err(|e| GenerationError::new(format!("failed to read output: {}", e)))?;

        if !output.status.success() {
            return Err(GenerationError::new(format!(
                "{} exited with {}: {}",
                self.config.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        // A backend may exit successfully without reading the whole prompt.
        match written {
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                return Err(GenerationError::new(format!("failed to write prompt: {}", e)));
            }
            _ => {}
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(GenerationError::new("empty output"));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::GenerationStep;
    use crate::domain::{ContentFormat, Tone};

    fn context() -> GenerationContext {
        GenerationContext {
            step: GenerationStep::Draft,
            topic: "Renewable Energy".into(),
            content_format: ContentFormat::Newsletter,
            tone: Tone::CasualEngaging,
            iteration: 0,
        }
    }

    fn sh(script: &str) -> CommandConfig {
        CommandConfig {
            command: "sh".into(),
            args: vec!["-c".into(), script.into(), "sh".into()],
        }
    }

    #[test]
    fn test_parse_search_array() {
        let out = r#"[{"excerpt": "Solar grew 20%.", "source": "https://a.example"},
                      {"content": "Wind is cheap.", "url": "https://b.example"}]"#;
        let excerpts = parse_search_output(out).unwrap();
        assert_eq!(excerpts.len(), 2);
        assert_eq!(excerpts[1].text, "Wind is cheap.");
        assert_eq!(excerpts[1].source, "https://b.example");
    }

    #[test]
    fn test_parse_search_wrapped_results() {
        let out = r#"{"results": [{"content": "Hydro", "url": "https://c.example"}]}"#;
        let excerpts = parse_search_output(out).unwrap();
        assert_eq!(excerpts[0].source, "https://c.example");
    }

    #[test]
    fn test_parse_search_drops_blank_entries() {
        let out = r#"[{"excerpt": "  "}, {"excerpt": "Geothermal"}]"#;
        let excerpts = parse_search_output(out).unwrap();
        assert_eq!(excerpts.len(), 1);
        assert_eq!(excerpts[0].source, UNATTRIBUTED);
    }

    #[test]
    fn test_parse_search_zero_usable_is_error() {
        assert!(parse_search_output("[]").is_err());
        assert!(parse_search_output(r#"[{"source": "x"}]"#).is_err());
        assert!(parse_search_output("not json").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_retriever_runs_process() {
        let retriever = CommandRetriever::new(sh(
            r#"printf '[{"excerpt":"About %s","source":"local"}]' "$1""#,
        ));
        let excerpts = retriever.search("tides").await.unwrap();
        assert_eq!(excerpts[0].text, "About tides");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_retriever_nonzero_exit() {
        let retriever = CommandRetriever::new(sh("exit 3"));
        assert!(retriever.search("tides").await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_generator_reads_prompt_and_context() {
        let generator = CommandGenerator::new(sh(r#"cat; printf ' [%s]' "$ALCHEMIST_FORMAT""#));
        let text = generator.complete("Write it", &context()).await.unwrap();
        assert_eq!(text, "Write it [Newsletter]");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_generator_blank_output_is_error() {
        let generator = CommandGenerator::new(sh("cat > /dev/null; echo '   '"));
        let err = generator.complete("Write it", &context()).await.unwrap_err();
        assert!(err.message.contains("empty"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_generator_streams_large_prompt() {
        let generator = CommandGenerator::new(CommandConfig {
            command: "cat".into(),
            args: vec![],
        });
        let prompt = "x".repeat(512 * 1024);
        let text = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            generator.complete(&prompt, &context()),
        )
        .await
        .expect("generator must not block on a full stdout pipe")
        .unwrap();
        assert_eq!(text.len(), prompt.len());
    }

    #[tokio::test]
    async fn test_command_generator_missing_binary() {
        let generator = CommandGenerator::new(CommandConfig {
            command: "definitely-not-a-real-binary-xyz".into(),
            args: vec![],
        });
        assert!(generator.complete("Write it", &context()).await.is_err());
    }
}
