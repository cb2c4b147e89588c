//! Paginated plain-text renderer.

use super::{RenderRequest, RenderedArtifact, Renderer};
use crate::domain::RenderError;
use async_trait::async_trait;
use unicode_width::UnicodeWidthStr;

const FORM_FEED: char = '\x0c';
const FOOTER_LINES: usize = 2;

/// Lays a document out as fixed-width pages separated by form feeds.
///
/// Output depends only on the request, so rendering the same accepted draft
/// twice yields identical bytes.
#[derive(Debug, Clone)]
pub struct PagedTextRenderer {
    lines_per_page: usize,
    line_width: usize,
}

impl PagedTextRenderer {
    pub fn new(lines_per_page: usize, line_width: usize) -> Self {
        Self {
            lines_per_page,
            line_width,
        }
    }

    /// Renders the request into page strings, title page first.
    pub fn paginate(&self, request: &RenderRequest) -> Result<Vec<String>, RenderError> {
        if self.lines_per_page <= FOOTER_LINES + 1 {
            return Err(RenderError::new(format!(
                "page height {} leaves no room for content",
                self.lines_per_page
            )));
        }
        if self.line_width == 0 {
            return Err(RenderError::new("line width must be positive"));
        }
        if request.sections.is_empty() {
            return Err(RenderError::new("document has no sections"));
        }

        let body_height = self.lines_per_page - FOOTER_LINES;
        let mut pages: Vec<Vec<String>> = self
            .title_page(request)
            .chunks(body_height)
            .map(<[String]>::to_vec)
            .collect();
        pages.extend(
            self.content_lines(request)
                .chunks(body_height)
                .map(<[String]>::to_vec),
        );

        let total = pages.len();
        Ok(pages
            .into_iter()
            .enumerate()
            .map(|(i, mut lines)| {
                lines.resize(body_height, String::new());
                lines.push(String::new());
                lines.push(format!("Page {} of {}", i + 1, total));
                let mut page = lines.join("\n");
                page.push('\n');
                page
            })
            .collect())
    }

    fn title_page(&self, request: &RenderRequest) -> Vec<String> {
        let title = request.title.to_uppercase();
        let mut lines = vec![String::new(), String::new()];
        lines.extend(wrap(&title, self.line_width));
        lines.push("=".repeat(title.width().min(self.line_width)));
        lines.push(String::new());
        lines.push(format!("Topic: {}", request.topic));
        lines.push(format!("Format: {}", request.content_format.label()));
        lines.push(format!("Tone: {}", request.tone.label()));
        lines.push(format!("Run: {}", request.run_id));
        lines.push(format!("Revisions: {}", request.iteration_count));
        lines.push(format!(
            "Generated from {} source{}",
            request.sources.len(),
            if request.sources.len() == 1 { "" } else { "s" }
        ));
        lines
    }

    fn content_lines(&self, request: &RenderRequest) -> Vec<String> {
        let mut lines = Vec::new();
        for section in &request.sections {
            push_heading(&mut lines, &section.heading, self.line_width);
            for paragraph in paragraphs(&section.body) {
                lines.extend(wrap(&paragraph, self.line_width));
                lines.push(String::new());
            }
        }

        push_heading(&mut lines, "VERIFIED SOURCES", self.line_width);
        for (i, source) in request.sources.iter().enumerate() {
            lines.extend(wrap(&format!("{}. {}", i + 1, source), self.line_width));
        }
        lines
    }
}

#[async_trait]
impl Renderer for PagedTextRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedArtifact, RenderError> {
        let pages = self.paginate(request)?;
        let page_count = u32::try_from(pages.len())
            .map_err(|_| RenderError::new("page count overflow"))?;
        let text = pages.join(&FORM_FEED.to_string());

        Ok(RenderedArtifact {
            bytes: text.into_bytes(),
            page_count,
            media_type: "text/plain; charset=utf-8".to_string(),
            extension: "txt".to_string(),
        })
    }
}

fn push_heading(lines: &mut Vec<String>, heading: &str, width: usize) {
    let wrapped = wrap(heading, width);
    let underline = wrapped
        .iter()
        .map(|l| l.width())
        .max()
        .unwrap_or(0);
    lines.extend(wrapped);
    lines.push("-".repeat(underline));
    lines.push(String::new());
}

/// Splits body text on blank lines, joining soft-wrapped lines.
fn paragraphs(body: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                out.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current.join(" "));
    }
    out
}

/// Greedy word wrap by display column. Words wider than `width` get a line
/// of their own.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.width();
        if line_len > 0 && line_len + 1 + word_len > width {
            lines.push(std::mem::take(&mut line));
            line_len = 0;
        }
        if line_len > 0 {
            line.push(' ');
            line_len += 1;
        }
        line.push_str(word);
        line_len += word_len;
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}
