use once_cell::sync::Lazy;
use regex::Regex;

static FENCE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)```[ \t]*(?:sql\b)?").unwrap()
});

/// Remove markdown code fences and surrounding whitespace from model output.
pub fn strip_code_fences(text: &str) -> String {
    FENCE_REGEX.replace_all(text.trim(), "").trim().to_string()
}
