use crate::domain::{ContentFormat, HumanReviewMode, Tone};
use crate::state::RunParameters;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Package version plus the git commit stamped by build.rs.
const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("ALCHEMIST_GIT_SHA"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "alchemist")]
#[command(about = "Research, draft, review and export content with a human checkpoint")]
#[command(version = VERSION)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Config file (defaults to ~/.content-alchemist/config.yaml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a new run (all arguments are joined into the topic)
    Run(RunArgs),
    /// Continue a persisted run from its recorded phase
    Resume {
        run_id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List persisted runs
    List,
    /// Re-run export for a run that failed while rendering
    RetryExport {
        run_id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[arg(trailing_var_arg = true, required = true)]
    pub topic: Vec<String>,

    /// Maximum revisions before the run fails
    #[arg(short, long)]
    pub max_iterations: Option<u32>,

    /// When to stop for a human decision after review
    #[arg(long, value_enum)]
    pub human_review: Option<HumanReviewArg>,

    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    #[arg(long, value_enum)]
    pub tone: Option<ToneArg>,

    /// Directory for the exported document and run report
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl RunArgs {
    pub fn topic_text(&self) -> String {
        self.topic.join(" ")
    }

    /// Command-line flags override the configured run parameters.
    pub fn apply_to(&self, params: &mut RunParameters) {
        if let Some(max) = self.max_iterations {
            params.max_iterations = max;
        }
        if let Some(mode) = self.human_review {
            params.human_review_mode = mode.into();
        }
        if let Some(format) = self.format {
            params.content_format = format.into();
        }
        if let Some(tone) = self.tone {
            params.tone = tone.into();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HumanReviewArg {
    Always,
    OnReject,
    Never,
}

impl From<HumanReviewArg> for HumanReviewMode {
    fn from(arg: HumanReviewArg) -> Self {
        match arg {
            HumanReviewArg::Always => HumanReviewMode::Always,
            HumanReviewArg::OnReject => HumanReviewMode::OnReject,
            HumanReviewArg::Never => HumanReviewMode::Never,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    BlogPost,
    Newsletter,
    ProductWriteUp,
}

impl From<FormatArg> for ContentFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::BlogPost => ContentFormat::BlogPost,
            FormatArg::Newsletter => ContentFormat::Newsletter,
            FormatArg::ProductWriteUp => ContentFormat::ProductWriteUp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ToneArg {
    Formal,
    Casual,
    Technical,
}

impl From<ToneArg> for Tone {
    fn from(arg: ToneArg) -> Self {
        match arg {
            ToneArg::Formal => Tone::FormalCorporate,
            ToneArg::Casual => Tone::CasualEngaging,
            ToneArg::Technical => Tone::TechnicalAcademic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_joins_topic_and_overrides_params() {
        let cli = Cli::try_parse_from([
            "alchemist",
            "run",
            "--max-iterations",
            "5",
            "--human-review",
            "never",
            "--tone",
            "casual",
            "AI",
            "for",
            "farms",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(args.topic_text(), "AI for farms");

        let mut params = RunParameters::default();
        args.apply_to(&mut params);
        assert_eq!(params.max_iterations, 5);
        assert_eq!(params.human_review_mode, HumanReviewMode::Never);
        assert_eq!(params.tone, Tone::CasualEngaging);
        assert_eq!(params.content_format, ContentFormat::BlogPost);
    }

    #[test]
    fn test_run_requires_topic() {
        assert!(Cli::try_parse_from(["alchemist", "run"]).is_err());
    }

    #[test]
    fn test_global_config_and_resume() {
        let cli = Cli::try_parse_from([
            "alchemist",
            "resume",
            "abc",
            "--config",
            "/tmp/alchemist.yaml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/alchemist.yaml")));
        assert!(matches!(cli.command, Command::Resume { ref run_id, .. } if run_id == "abc"));
    }

    #[test]
    fn test_version_carries_build_sha() {
        use clap::CommandFactory;
        let version = Cli::command().render_version();
        assert!(version.contains(env!("CARGO_PKG_VERSION")));
        assert!(version.contains(env!("ALCHEMIST_GIT_SHA")));
    }

    #[test]
    fn test_kebab_case_values() {
        let cli = Cli::try_parse_from([
            "alchemist",
            "run",
            "--format",
            "product-write-up",
            "--human-review",
            "on-reject",
            "Widgets",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(args.format, Some(FormatArg::ProductWriteUp));
        assert_eq!(args.human_review, Some(HumanReviewArg::OnReject));
    }
}
