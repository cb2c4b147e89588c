//! Verdict parsing for the review step.
//!
//! Review output is free text, so control flow never depends on it directly:
//! the parser either finds an explicit `VERDICT:` line or reports the review
//! as inconclusive, which callers treat as a rejection. An unparsable review
//! is never read as ACCEPTED.

use crate::domain::ReviewVerdict;
use regex::Regex;
use std::sync::LazyLock;

/// Critique recorded when the review output has no recognizable verdict.
pub const INCONCLUSIVE_CRITIQUE: &str = "automated review inconclusive";

/// Critique recorded for a REJECTED verdict that came without an explanation.
pub const GENERIC_CRITIQUE: &str =
    "the draft did not meet the review rubric (completeness, clarity, factual consistency)";

static VERDICT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*(?:#+\s*)?\**\s*verdict\s*\**\s*[:\-]?\s*\**\s*(ACCEPTED|REJECTED)\b")
        .expect("verdict pattern is valid")
});

/// Matched per line; the colon is required so prose like "Critiques are..."
/// is not taken for a header.
static CRITIQUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:#+\s*)?\**\s*critique\s*\**\s*:\s*\**\s*(.*)$")
        .expect("critique pattern is valid")
});

/// Result of parsing a review response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReview {
    Verdict(ReviewVerdict),
    Inconclusive { reason: String },
}

impl ParsedReview {
    /// Collapses an inconclusive parse into a REJECTED verdict.
    pub fn into_verdict(self) -> ReviewVerdict {
        match self {
            ParsedReview::Verdict(verdict) => verdict,
            ParsedReview::Inconclusive { .. } => ReviewVerdict::Rejected {
                critique: INCONCLUSIVE_CRITIQUE.to_string(),
            },
        }
    }
}

/// Parses `VERDICT: ACCEPTED` / `VERDICT: REJECTED` plus an optional critique,
/// taken from a `<critique>` tag or a `CRITIQUE:` block.
pub fn parse_review(report: &str) -> ParsedReview {
    let Some(verdict) = VERDICT_RE
        .captures(report)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase())
    else {
        return ParsedReview::Inconclusive {
            reason: "no VERDICT line found".to_string(),
        };
    };

    if verdict == "ACCEPTED" {
        return ParsedReview::Verdict(ReviewVerdict::Accepted);
    }

    let critique = extract_feedback_tag("critique", report)
        .or_else(|| critique_block(report))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| GENERIC_CRITIQUE.to_string());

    ParsedReview::Verdict(ReviewVerdict::Rejected { critique })
}

/// Text of a `CRITIQUE:` block: the rest of the header line plus the lines
/// after it, up to a blank line or the next VERDICT line.
fn critique_block(report: &str) -> Option<String> {
    let mut lines = report.lines();
    let first = lines.by_ref().find_map(|line| {
        CRITIQUE_RE
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    })?;

    let mut block = Vec::new();
    if !first.is_empty() {
        block.push(first);
    }
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            if block.is_empty() {
                continue;
            }
            break;
        }
        if VERDICT_RE.is_match(line) {
            break;
        }
        block.push(line.to_string());
    }
    (!block.is_empty()).then(|| block.join("\n"))
}

/// Extracts the content between `<tag>` and `</tag>`, if present.
pub fn extract_feedback_tag(tag: &str, report: &str) -> Option<String> {
    let pattern = format!(r"(?s)<{}>\s*(.*?)\s*</{}>", regex::escape(tag), regex::escape(tag));
    let re = Regex::new(&pattern).ok()?;
    re.captures(report)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
#[path = "tests/verdict_tests.rs"]
mod tests;
