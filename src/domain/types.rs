//! Strongly typed domain primitives for a content run.
//!
//! These types carry the artifacts (research material, drafts, verdicts) and
//! the run parameters through the pipeline. They are plain serializable values
//! so a `WorkflowState` can be persisted across the human checkpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a run.
/// Used as the key in the session store and as the structured logger session id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Creates a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a run ID from its string form.
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The subject of a run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic(String);

impl Topic {
    /// Creates a topic, rejecting blank input.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase, hyphen-separated form suitable for file names.
    pub fn slug(&self) -> String {
        let slug = self
            .0
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect::<String>();
        let parts: Vec<&str> = slug.split('-').filter(|p| !p.is_empty()).collect();
        if parts.is_empty() {
            "untitled".to_string()
        } else {
            parts.join("-")
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// UTC timestamp wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimestampUtc(pub DateTime<Utc>);

impl TimestampUtc {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the timestamp as an RFC3339 string.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl Default for TimestampUtc {
    fn default() -> Self {
        Self::now()
    }
}

/// A single research excerpt with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Excerpt {
    pub text: String,
    pub source: String,
}

/// One titled section of a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub body: String,
}

/// Structured content: a title and ordered sections.
///
/// Drafts are immutable snapshots. Drafting and revision produce a new
/// `Draft`; older ones stay in the run history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub title: String,
    pub sections: Vec<Section>,
}

impl Draft {
    /// True when no section carries any body text.
    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.body.trim().is_empty())
    }

    /// Renders the draft back to the Markdown shape the generator is asked to produce.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n", self.title);
        for section in &self.sections {
            out.push_str(&format!("\n## {}\n\n{}\n", section.heading, section.body.trim()));
        }
        out
    }

    pub fn headings(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.heading.as_str()).collect()
    }
}

/// Who produced a draft snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorTag {
    Draft,
    AutoRevision,
    HumanRevision,
}

/// One entry of the append-only audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub draft: Draft,
    pub author: AuthorTag,
    pub iteration: u32,
    pub recorded_at: TimestampUtc,
}

/// Automated review outcome for the current draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReviewVerdict {
    #[default]
    Pending,
    Accepted,
    Rejected { critique: String },
}

impl ReviewVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ReviewVerdict::Accepted)
    }

    pub fn critique(&self) -> Option<&str> {
        match self {
            ReviewVerdict::Rejected { critique } => Some(critique),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReviewVerdict::Pending => "PENDING",
            ReviewVerdict::Accepted => "ACCEPTED",
            ReviewVerdict::Rejected { .. } => "REJECTED",
        }
    }
}

/// The single feedback source handed to a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "text", rename_all = "snake_case")]
pub enum RevisionInput {
    Critique(String),
    HumanFeedback(String),
}

impl RevisionInput {
    pub fn text(&self) -> &str {
        match self {
            RevisionInput::Critique(text) | RevisionInput::HumanFeedback(text) => text,
        }
    }

    /// History tag for the draft a revision with this input produces.
    pub fn author(&self) -> AuthorTag {
        match self {
            RevisionInput::Critique(_) => AuthorTag::AutoRevision,
            RevisionInput::HumanFeedback(_) => AuthorTag::HumanRevision,
        }
    }
}

/// When the run stops for a human checkpoint after automated review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HumanReviewMode {
    /// Checkpoint after every automated review, accepted or not.
    Always,
    /// Checkpoint after every rejection.
    #[default]
    OnReject,
    /// Never checkpoint; rejections go straight to automated revision.
    Never,
}

impl HumanReviewMode {
    /// Whether a verdict triggers a checkpoint under this mode.
    pub fn checkpoint_for(&self, verdict: &ReviewVerdict) -> bool {
        match self {
            HumanReviewMode::Always => true,
            HumanReviewMode::OnReject => matches!(verdict, ReviewVerdict::Rejected { .. }),
            HumanReviewMode::Never => false,
        }
    }
}

/// Output format requested from the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    #[default]
    BlogPost,
    Newsletter,
    ProductWriteUp,
}

impl ContentFormat {
    pub fn label(&self) -> &'static str {
        match self {
            ContentFormat::BlogPost => "Blog Post",
            ContentFormat::Newsletter => "Newsletter",
            ContentFormat::ProductWriteUp => "Product Write-up",
        }
    }
}

/// Writing tone requested from the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    FormalCorporate,
    CasualEngaging,
    TechnicalAcademic,
}

impl Tone {
    pub fn label(&self) -> &'static str {
        match self {
            Tone::FormalCorporate => "Formal Corporate",
            Tone::CasualEngaging => "Casual/Engaging",
            Tone::TechnicalAcademic => "Technical/Academic",
        }
    }
}

/// State-machine phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Init,
    Researching,
    Drafting,
    Reviewing,
    AwaitingHuman,
    Revising,
    Exporting,
    Done,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }

    /// Full label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Init => "Init",
            Phase::Researching => "Researching",
            Phase::Drafting => "Drafting",
            Phase::Reviewing => "Reviewing",
            Phase::AwaitingHuman => "Awaiting human",
            Phase::Revising => "Revising",
            Phase::Exporting => "Exporting",
            Phase::Done => "Done",
            Phase::Failed => "Failed",
        }
    }

    /// Label with iteration number for review/revise phases.
    pub fn with_iteration(&self, iteration: u32) -> String {
        match self {
            Phase::Reviewing if iteration > 0 => format!("Reviewing #{}", iteration + 1),
            Phase::Revising => format!("Revising #{}", iteration + 1),
            _ => self.label().to_string(),
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_rejects_blank() {
        assert!(Topic::new("   ").is_none());
        assert_eq!(Topic::new("  Solar  ").unwrap().as_str(), "Solar");
    }

    #[test]
    fn test_topic_slug() {
        let topic = Topic::new("AI for Rural Development!").unwrap();
        assert_eq!(topic.slug(), "ai-for-rural-development");
        assert_eq!(Topic::new("???").unwrap().slug(), "untitled");
    }

    #[test]
    fn test_draft_is_empty() {
        let draft = Draft {
            title: "T".to_string(),
            sections: vec![Section {
                heading: "Intro".to_string(),
                body: "  ".to_string(),
            }],
        };
        assert!(draft.is_empty());
    }

    #[test]
    fn test_revision_input_author() {
        assert_eq!(
            RevisionInput::Critique("x".into()).author(),
            AuthorTag::AutoRevision
        );
        assert_eq!(
            RevisionInput::HumanFeedback("x".into()).author(),
            AuthorTag::HumanRevision
        );
    }

    #[test]
    fn test_checkpoint_policy() {
        let rejected = ReviewVerdict::Rejected {
            critique: "thin".into(),
        };
        assert!(HumanReviewMode::Always.checkpoint_for(&ReviewVerdict::Accepted));
        assert!(HumanReviewMode::Always.checkpoint_for(&rejected));
        assert!(!HumanReviewMode::OnReject.checkpoint_for(&ReviewVerdict::Accepted));
        assert!(HumanReviewMode::OnReject.checkpoint_for(&rejected));
        assert!(!HumanReviewMode::Never.checkpoint_for(&rejected));
    }

    #[test]
    fn test_verdict_serialization() {
        let verdict = ReviewVerdict::Rejected {
            critique: "missing sources".into(),
        };
        let json = serde_json::to_string(&verdict).unwrap();
        assert!(json.contains("\"status\":\"rejected\""));
        let parsed: ReviewVerdict = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, verdict);
    }

    #[test]
    fn test_phase_with_iteration() {
        assert_eq!(Phase::Reviewing.with_iteration(0), "Reviewing");
        assert_eq!(Phase::Reviewing.with_iteration(2), "Reviewing #3");
        assert_eq!(Phase::Revising.with_iteration(0), "Revising #1");
        assert_eq!(Phase::Done.with_iteration(4), "Done");
    }
}
