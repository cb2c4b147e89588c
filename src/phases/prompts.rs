//! Prompt templates for the generation-backed steps.
//!
//! All three steps share one generator; the prompt text is what tells it
//! which job it is doing.

use crate::domain::{ContentFormat, Draft, Excerpt, RevisionInput, Tone};

const DRAFT_SYSTEM_PROMPT: &str = r###"You are a professional content writer.
Write only from the research material provided. Do not invent statistics.
Structure the piece as Markdown: one "# " title line, then "## " section headings.
Return only the content, with no notes about what you did."###;

const REVIEW_SYSTEM_PROMPT: &str = r###"You are a strict editor reviewing a draft against a rubric:
completeness, clarity, and factual consistency with the research material.
Reply in exactly this format:

VERDICT: ACCEPTED
or
VERDICT: REJECTED
CRITIQUE: <specific deficiencies in structure, accuracy, or tone>"###;

const REVISION_SYSTEM_PROMPT: &str = r###"You are revising a draft based on feedback.
Keep the existing section structure unless the feedback asks for restructuring.
Return the complete revised content as Markdown ("# " title, "## " sections),
with no commentary about the changes."###;

/// Research excerpts shown to the generator are capped to keep prompts bounded.
const MAX_EXCERPT_CHARS: usize = 1500;

pub fn draft_prompt(
    topic: &str,
    material: &[Excerpt],
    format: ContentFormat,
    tone: Tone,
) -> String {
    format!(
        "{}\n\nTopic: {}\nFormat: {}\nTone: {}\n\n## Research Material\n\n{}",
        DRAFT_SYSTEM_PROMPT,
        topic,
        format.label(),
        tone.label(),
        render_material(material)
    )
}

pub fn review_prompt(draft: &Draft, material: &[Excerpt]) -> String {
    format!(
        "{}\n\n## Research Material\n\n{}\n\n## Draft\n\n{}",
        REVIEW_SYSTEM_PROMPT,
        render_material(material),
        draft.to_markdown()
    )
}

pub fn revision_prompt(draft: &Draft, input: &RevisionInput, tone: Tone) -> String {
    let feedback_heading = match input {
        RevisionInput::Critique(_) => "Editor Critique",
        RevisionInput::HumanFeedback(_) => "Reviewer Instructions",
    };
    format!(
        "{}\nTone: {}\n\n## {}\n\n{}\n\n## Current Draft\n\n{}",
        REVISION_SYSTEM_PROMPT,
        tone.label(),
        feedback_heading,
        input.text(),
        draft.to_markdown()
    )
}

fn render_material(material: &[Excerpt]) -> String {
    material
        .iter()
        .enumerate()
        .map(|(i, excerpt)| {
            let text: String = excerpt.text.chars().take(MAX_EXCERPT_CHARS).collect();
            format!("[{}] {}\nSource: {}", i + 1, text, excerpt.source)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
