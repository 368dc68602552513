//! User-input validation gate.
//!
//! Every chat query passes through here before it reaches the retrieval
//! engine. Rejections carry a corrective, user-facing message rather than a
//! bare error code.

use std::sync::OnceLock;

use regex::Regex;

const MAX_QUERY_CHARS: usize = 500;

fn injection_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)\b(SELECT|INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|EXEC|EXECUTE)\b",
            r"(--|;|/\*|\*/|xp_|sp_)",
            r"(?i)\bOR\b.*=.*",
            r"(?i)\bUNION\b.*\bSELECT\b",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static pattern"))
        .collect()
    })
}

fn symbol_only_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^a-zA-Z0-9\s]+$").expect("static pattern"))
}

/// Validate and sanitize a chat query.
///
/// Returns the sanitized query, or a corrective message for the caller.
pub fn validate_query(query: &str) -> Result<String, String> {
    let query = query.trim();

    if query.is_empty() {
        return Err(
            "Query cannot be empty. Try: \"Show me properties in Back Bay\"".to_string(),
        );
    }

    if query.chars().count() > MAX_QUERY_CHARS {
        return Err(format!(
            "Query too long (max {} characters)",
            MAX_QUERY_CHARS
        ));
    }

    if injection_patterns().iter().any(|p| p.is_match(query)) {
        tracing::warn!("Rejected query with injection pattern");
        return Err("Invalid query. Please ask about properties naturally.".to_string());
    }

    if symbol_only_pattern().is_match(query) {
        return Err("Please use words to describe what you're looking for!".to_string());
    }

    let collapsed = query.split_whitespace().collect::<Vec<_>>().join(" ");
    let sanitized: String = collapsed
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '{' | '}'))
        .collect();

    Ok(sanitized)
}
