use crate::domain::FailurePolicy;
use crate::state::RunParameters;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AlchemistConfig {
    /// Run parameters applied to new runs unless overridden on the command line.
    #[serde(default)]
    pub workflow: RunParameters,
    #[serde(default)]
    pub collaborators: CollaboratorsConfig,
    #[serde(default)]
    pub render: RenderConfig,
    /// Retry policy for generation-backed steps.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

/// An external process used as a collaborator backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommandConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollaboratorsConfig {
    #[serde(default = "default_retrieval")]
    pub retrieval: CommandConfig,
    #[serde(default = "default_generation")]
    pub generation: CommandConfig,
}

impl Default for CollaboratorsConfig {
    fn default() -> Self {
        Self {
            retrieval: default_retrieval(),
            generation: default_generation(),
        }
    }
}

fn default_retrieval() -> CommandConfig {
    CommandConfig {
        command: "alchemist-search".to_string(),
        args: Vec::new(),
    }
}

fn default_generation() -> CommandConfig {
    CommandConfig {
        command: "claude".to_string(),
        args: vec!["-p".to_string()],
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RenderConfig {
    /// Lines per page including the footer. Default: 48
    #[serde(default = "default_lines_per_page")]
    pub lines_per_page: usize,
    /// Wrap width in characters. Default: 80
    #[serde(default = "default_line_width")]
    pub line_width: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            lines_per_page: default_lines_per_page(),
            line_width: default_line_width(),
        }
    }
}

fn default_lines_per_page() -> usize {
    48
}

fn default_line_width() -> usize {
    80
}

const MIN_LINES_PER_PAGE: usize = 10;
const MIN_LINE_WIDTH: usize = 20;

impl AlchemistConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).context("Failed to parse config as YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the explicit path if given, else the default path if it exists,
    /// else built-in defaults.
    pub fn resolve(explicit: Option<&Path>, default_path: &Path) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None if default_path.exists() => Self::load(default_path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, cmd) in [
            ("retrieval", &self.collaborators.retrieval),
            ("generation", &self.collaborators.generation),
        ] {
            if cmd.command.trim().is_empty() {
                anyhow::bail!("collaborators.{}.command must not be empty", name);
            }
        }

        if self.render.lines_per_page < MIN_LINES_PER_PAGE {
            anyhow::bail!(
                "render.lines_per_page must be at least {}, got {}",
                MIN_LINES_PER_PAGE,
                self.render.lines_per_page
            );
        }
        if self.render.line_width < MIN_LINE_WIDTH {
            anyhow::bail!(
                "render.line_width must be at least {}, got {}",
                MIN_LINE_WIDTH,
                self.render.line_width
            );
        }

        Ok(())
    }
}
