//! Parses generator output into a structured `Draft`.

use crate::domain::{Draft, GenerationError, Section};

const INTRODUCTION: &str = "Introduction";

/// Parses Markdown-ish text: the first `# ` line is the title, each `## `
/// line opens a section, and text before the first section becomes an
/// "Introduction" section. Falls back to `fallback_title` without a title line.
pub fn parse_draft(text: &str, fallback_title: &str) -> Result<Draft, GenerationError> {
    let mut title: Option<String> = None;
    let mut sections: Vec<Section> = Vec::new();
    let mut heading: Option<String> = None;
    let mut body: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(h) = trimmed.strip_prefix("## ") {
            flush(&mut sections, heading.take(), &mut body);
            heading = Some(h.trim().to_string());
        } else if let Some(t) = trimmed.strip_prefix("# ") {
            if title.is_none() && heading.is_none() && body.iter().all(|l| l.trim().is_empty()) {
                title = Some(t.trim().to_string());
            } else {
                body.push(line);
            }
        } else {
            body.push(line);
        }
    }
    flush(&mut sections, heading, &mut body);

    let draft = Draft {
        title: title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| fallback_title.to_string()),
        sections,
    };

    if draft.sections.is_empty() || draft.is_empty() {
        return Err(GenerationError::new("generated content has no body text"));
    }
    Ok(draft)
}

fn flush(sections: &mut Vec<Section>, heading: Option<String>, body: &mut Vec<&str>) {
    let text = body.join("\n").trim().to_string();
    body.clear();
    match heading {
        Some(heading) => sections.push(Section { heading, body: text }),
        None if !text.is_empty() => sections.push(Section {
            heading: INTRODUCTION.to_string(),
            body: text,
        }),
        None => {}
    }
}
