//! Strips assistant meta-commentary from generated content.

/// Line prefixes (lowercase) that start a note about the edit rather than content.
const META_PREFIXES: &[&str] = &[
    "i made the following",
    "refined for clarity",
    "note:",
    "simplified sentence",
];

/// Truncates `text` at the first meta-commentary line and trims the result.
pub fn clean_generated(text: &str) -> String {
    let mut kept = Vec::new();
    for line in text.lines() {
        let lowered = line.trim_start().trim_start_matches(['*', '_']).to_lowercase();
        if META_PREFIXES.iter().any(|p| lowered.starts_with(p)) {
            break;
        }
        kept.push(line);
    }
    kept.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_is_untouched() {
        let text = "# Title\n\n## Intro\n\nBody text.";
        assert_eq!(clean_generated(text), text);
    }

    #[test]
    fn test_truncates_at_meta_commentary() {
        let text = "# Title\n\nBody text.\n\nI made the following changes:\n- shorter";
        assert_eq!(clean_generated(text), "# Title\n\nBody text.");
    }

    #[test]
    fn test_matching_is_case_insensitive_and_ignores_emphasis() {
        assert_eq!(clean_generated("Body.\n**NOTE:** trimmed"), "Body.");
        assert_eq!(clean_generated("Body.\nrefined for clarity."), "Body.");
        assert_eq!(clean_generated("Body.\n  Simplified sentence 3."), "Body.");
    }

    #[test]
    fn test_note_inside_sentence_is_kept() {
        let text = "Please take note: wind is cheap.";
        assert_eq!(clean_generated(text), text);
    }

    #[test]
    fn test_all_meta_yields_empty() {
        assert_eq!(clean_generated("Note: nothing to add"), "");
    }
}
