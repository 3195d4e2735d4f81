//! Variation Generator
//!
//! One text-generation call per batch. The response is expected to be a JSON
//! object with a `prompts` array; anything else degrades to line extraction.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::service::{CompletionRequest, ServiceError, TextGenerator};

pub const PROMPTS_FIELD: &str = "prompts";

/// One entry of the generated list, in page order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PromptVariation {
    Text(String),
    /// A non-string structured entry, kept as its JSON rendering.
    Malformed(String),
}

impl PromptVariation {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            Self::Malformed(_) => None,
        }
    }

    pub fn display(&self) -> &str {
        match self {
            Self::Text(s) | Self::Malformed(s) => s,
        }
    }
}

impl From<&str> for PromptVariation {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariationSource {
    Structured,
    LineFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedVariations {
    pub variations: Vec<PromptVariation>,
    pub source: VariationSource,
}

pub struct VariationGenerator<'a> {
    backend: &'a dyn TextGenerator,
    signature: String,
}

impl<'a> VariationGenerator<'a> {
    pub fn new(backend: &'a dyn TextGenerator, signature: impl Into<String>) -> Self {
        Self {
            backend,
            signature: signature.into(),
        }
    }

    pub fn build_request(&self, theme: &str, count: u32) -> CompletionRequest {
        CompletionRequest {
            system: format!(
                "You are a helpful assistant that creates concise coloring book prompts. \
                 Please always include instruction first: 'Generate an image which is colouring. \
                 Use only black colour for lines and white for inside of objects. \
                 Extend picture with small signature at the bottom right of the picture \"{}\".'",
                self.signature
            ),
            user: format!(
                "Please generate {count} different variations of a coloring book prompt for the main theme: \
                 \"{theme}\" as a JSON array. Example: {{\"{PROMPTS_FIELD}\" : [\"prompt 1\", \"prompt 2\", \"prompt 3\" ]}}"
            ),
        }
    }

    /// Ask the backend for `count` variations of `theme`.
    ///
    /// Only transport/backend failures are errors. A response that does not
    /// parse is salvaged line by line.
    pub fn generate_variations(&self, theme: &str, count: u32) -> Result<Vec<PromptVariation>, ServiceError> {
        info!(theme, count, "requesting prompt variations");
        let raw = self.backend.complete(&self.build_request(theme, count))?;
        let parsed = parse_variations(&raw);

        match parsed.source {
            VariationSource::Structured => {
                info!(received = parsed.variations.len(), "parsed structured variations");
            }
            VariationSource::LineFallback => {
                warn!(
                    recovered = parsed.variations.len(),
                    raw = %raw,
                    "structured parse failed, fell back to line extraction"
                );
            }
        }

        Ok(parsed.variations)
    }
}

/// Parse a backend response into variations, never failing.
pub fn parse_variations(raw: &str) -> ParsedVariations {
    match parse_structured(strip_code_fence(raw)) {
        Some(variations) => ParsedVariations {
            variations,
            source: VariationSource::Structured,
        },
        None => ParsedVariations {
            variations: extract_lines(raw)
                .into_iter()
                .map(PromptVariation::Text)
                .collect(),
            source: VariationSource::LineFallback,
        },
    }
}

fn parse_structured(content: &str) -> Option<Vec<PromptVariation>> {
    let items = match serde_json::from_str::<Value>(content).ok()? {
        Value::Object(mut map) => match map.remove(PROMPTS_FIELD)? {
            Value::Array(items) => items,
            _ => return None,
        },
        Value::Array(items) => items,
        _ => return None,
    };

    Some(
        items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => PromptVariation::Text(s),
                other => PromptVariation::Malformed(other.to_string()),
            })
            .collect(),
    )
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string (`json`) on the opening fence line
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

const LIST_MARKERS: &[char] = &['-', '*', '•', '+'];

/// Heuristic extraction: one variation per non-empty line.
pub fn extract_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim_matches(|c: char| c.is_whitespace() || LIST_MARKERS.contains(&c));

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(after) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            if after.is_empty() || after.starts_with(char::is_whitespace) {
                return after.trim();
            }
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct CannedText {
        response: Result<String, String>,
        seen: RefCell<Vec<CompletionRequest>>,
    }

    impl CannedText {
        fn ok(body: &str) -> Self {
            Self { response: Ok(body.to_string()), seen: RefCell::new(vec![]) }
        }
    }

    impl TextGenerator for CannedText {
        fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
            self.seen.borrow_mut().push(request.clone());
            self.response.clone().map_err(ServiceError::Rejected)
        }
    }

    fn texts(items: &[&str]) -> Vec<PromptVariation> {
        items.iter().map(|s| PromptVariation::from(*s)).collect()
    }

    #[test]
    fn test_structured_object() {
        let parsed = parse_variations(r#"{"prompts": ["a T-rex", "a raptor", "a stegosaurus"]}"#);
        assert_eq!(parsed.source, VariationSource::Structured);
        assert_eq!(parsed.variations, texts(&["a T-rex", "a raptor", "a stegosaurus"]));
    }

    #[test]
    fn test_bare_array() {
        let parsed = parse_variations(r#"["one", "two"]"#);
        assert_eq!(parsed.source, VariationSource::Structured);
        assert_eq!(parsed.variations, texts(&["one", "two"]));
    }

    #[test]
    fn test_non_string_entries_kept() {
        let parsed = parse_variations(r#"{"prompts": ["one", 7, {"x": 1}, "two"]}"#);
        assert_eq!(parsed.variations.len(), 4);
        assert_eq!(parsed.variations[1], PromptVariation::Malformed("7".into()));
        assert!(parsed.variations[2].as_text().is_none());
        assert_eq!(parsed.variations[3].as_text(), Some("two"));
    }

    #[test]
    fn test_code_fence_removed() {
        let parsed = parse_variations("```json\n{\"prompts\": [\"fenced\"]}\n```");
        assert_eq!(parsed.source, VariationSource::Structured);
        assert_eq!(parsed.variations, texts(&["fenced"]));
    }

    #[test]
    fn test_wrong_shape_falls_back() {
        let parsed = parse_variations(r#"{"ideas": ["x"]}"#);
        assert_eq!(parsed.source, VariationSource::LineFallback);
        assert_eq!(parsed.variations, texts(&[r#"{"ideas": ["x"]}"#]));

        let parsed = parse_variations(r#"{"prompts": "just one"}"#);
        assert_eq!(parsed.source, VariationSource::LineFallback);
    }

    #[test]
    fn test_line_fallback_strips_markers() {
        let raw = "Here you go:\n\n- a castle on a hill \n  * a dragon  \n1. a knight\n2) a princess\n-\n";
        assert_eq!(
            extract_lines(raw),
            vec!["Here you go:", "a castle on a hill", "a dragon", "a knight", "a princess"]
        );
    }

    #[test]
    fn test_leading_digits_kept_without_marker() {
        assert_eq!(extract_lines("3D dinosaur\n10 cats"), vec!["3D dinosaur", "10 cats"]);
    }

    #[test]
    fn test_empty_response_yields_nothing() {
        let parsed = parse_variations("   \n  ");
        assert_eq!(parsed.source, VariationSource::LineFallback);
        assert!(parsed.variations.is_empty());
    }

    #[test]
    fn test_request_carries_theme_and_count() {
        let backend = CannedText::ok(r#"{"prompts": ["a"]}"#);
        let generator = VariationGenerator::new(&backend, "Pablo Mano");
        let variations = generator.generate_variations("dinosaurs", 3).unwrap();
        assert_eq!(variations, texts(&["a"]));

        let seen = backend.seen.borrow();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].system.contains("\"Pablo Mano\""));
        assert!(seen[0].system.contains("black colour for lines"));
        assert!(seen[0].user.contains("generate 3 different variations"));
        assert!(seen[0].user.contains("\"dinosaurs\""));
        assert!(seen[0].user.contains("\"prompts\""));
    }

    #[test]
    fn test_service_error_propagates() {
        let backend = CannedText { response: Err("down".into()), seen: RefCell::new(vec![]) };
        let generator = VariationGenerator::new(&backend, "sig");
        let err = generator.generate_variations("cats", 2).unwrap_err();
        assert!(err.to_string().contains("down"));
    }
}
