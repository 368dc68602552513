//! Bounded context-window assembly.
//!
//! Every injected fragment is truncated independently — recent turns,
//! property bullets, raw snippets — so the assembled context has a
//! predictable size no matter how many turns or hits are available. The
//! downstream completion call has a fixed token budget, and overshooting
//! it truncates at an arbitrary point.

use crate::core::config::ChatConfig;
use crate::session::{Role, Turn};

use super::parser::ParsedProperty;
use super::store::Hit;

#[derive(Debug, Clone)]
pub struct ContextComposer {
    history_turns: usize,
    turn_char_budget: usize,
    property_limit: usize,
    snippet_limit: usize,
    snippet_char_budget: usize,
}

impl ContextComposer {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            history_turns: config.history_turns,
            turn_char_budget: config.turn_char_budget,
            property_limit: config.property_limit,
            snippet_limit: config.snippet_limit,
            snippet_char_budget: config.snippet_char_budget,
        }
    }

    /// Assemble the context block handed to the completion call:
    /// recent conversation, the current question, then either parsed
    /// property bullets or raw snippets.
    pub fn compose(
        &self,
        query: &str,
        turns: &[Turn],
        hits: &[Hit],
        parsed: &[ParsedProperty],
    ) -> String {
        let mut lines: Vec<String> = Vec::new();

        if !turns.is_empty() {
            lines.push("Previous conversation:".to_string());
            let skip = turns.len().saturating_sub(self.history_turns);
            for turn in &turns[skip..] {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                lines.push(format!(
                    "{}: {}",
                    role,
                    truncate_chars(&turn.content, self.turn_char_budget)
                ));
            }
            lines.push(String::new());
        }

        lines.push(format!("Current question: {}", query));
        lines.push(String::new());

        let properties: Vec<&ParsedProperty> = parsed
            .iter()
            .filter(|record| record.is_property())
            .take(self.property_limit)
            .collect();

        if !properties.is_empty() {
            lines.push("Relevant data found:".to_string());
            for (idx, record) in properties.iter().enumerate() {
                lines.push(format!("{}. {}", idx + 1, render_property(record)));
            }
        } else if !hits.is_empty() {
            lines.push("Relevant information:".to_string());
            for (idx, hit) in hits.iter().take(self.snippet_limit).enumerate() {
                lines.push(format!(
                    "{}. {}",
                    idx + 1,
                    truncate_chars(&hit.document, self.snippet_char_budget)
                ));
            }
        } else {
            lines.push("No matching data was found in the indexed datasets.".to_string());
        }

        lines.join("\n")
    }
}

/// Render one parsed record as a single bullet, omitting null subfields:
/// "address - $price - bedsBR/bathsBA (type)".
fn render_property(record: &ParsedProperty) -> String {
    let mut out = String::new();

    if let Some(address) = &record.address {
        out.push_str(address);
        if let Some(city) = &record.city {
            if !address.contains(city.as_str()) {
                out.push_str(", ");
                out.push_str(city);
            }
        }
    }

    if let Some(price) = record.price {
        if !out.is_empty() {
            out.push_str(" - ");
        }
        out.push('$');
        out.push_str(&format_thousands(price));
    }

    match (record.beds, record.baths) {
        (Some(beds), Some(baths)) => out.push_str(&format!(" - {}BR/{}BA", beds, baths)),
        (Some(beds), None) => out.push_str(&format!(" - {}BR", beds)),
        (None, Some(baths)) => out.push_str(&format!(" - {}BA", baths)),
        (None, None) => {}
    }

    if let Some(sqft) = record.sqft {
        out.push_str(&format!(" - {} sqft", sqft));
    }

    if let Some(property_type) = &record.property_type {
        out.push_str(&format!(" ({})", property_type));
    }

    out
}

/// Truncate to at most `max` characters, respecting UTF-8 boundaries.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max).collect();
        out.push_str("...");
        out
    }
}

fn format_thousands(value: f64) -> String {
    let raw = format!("{:.0}", value.max(0.0));
    let mut out = String::with_capacity(raw.len() + raw.len() / 3);
    let digits: Vec<char> = raw.chars().collect();
    for (idx, c) in digits.iter().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(*c);
    }
    out
}
