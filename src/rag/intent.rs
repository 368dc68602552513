//! Query intent classification.
//!
//! Greeting detection, structured-filter extraction and one-step relative
//! context resolution ("cheaper", "same area"). Property-intent keywords
//! veto the greeting branch, so "hi, show me 3BR in Back Bay" routes to
//! retrieval rather than the canned reply.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentKind {
    General,
    Rental,
    Buy,
    Compare,
    Greeting,
}

/// Structured filters pulled from the query text.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchFilters {
    pub bedrooms: Option<u32>,
    pub max_price: Option<f64>,
    pub neighborhood: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.bedrooms.is_none() && self.max_price.is_none() && self.neighborhood.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct Intent {
    pub kind: IntentKind,
    pub filters: SearchFilters,
    /// True when a prior turn's filters or neighborhood were carried
    /// forward into this one.
    pub context_used: bool,
    /// Display name extracted from an introduction, for greeting
    /// personalization only. Never persisted.
    pub greeting_name: Option<String>,
}

const GREETING_WORDS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "hii",
    "hiii",
    "sup",
    "yo",
    "greetings",
    "good morning",
    "good afternoon",
    "good evening",
];

const PROPERTY_KEYWORDS: &[&str] = &[
    "property",
    "properties",
    "home",
    "house",
    "apartment",
    "condo",
    "bedroom",
    "bathroom",
    "rent",
    "rental",
    "lease",
    "buy",
    "purchase",
    "price",
    "neighborhood",
    "area",
    "location",
    "show",
    "find",
    "search",
    "looking",
    "near",
];

const NEIGHBORHOODS: &[&str] = &[
    "back bay",
    "beacon hill",
    "south end",
    "north end",
    "dorchester",
    "roxbury",
    "jamaica plain",
    "charlestown",
    "east boston",
    "allston",
    "brighton",
    "fenway",
    "south boston",
    "seaport",
    "west end",
];

const CHEAPER_CUES: &[&str] = &["cheaper", "more affordable", "less expensive", "affordable"];
const SIMILAR_CUES: &[&str] = &["similar", "same area", "same neighborhood"];

const RENTAL_WORDS: &[&str] = &["rent", "rental", "renting", "lease"];
const BUY_WORDS: &[&str] = &["buy", "buying", "purchase", "for sale"];
const COMPARE_WORDS: &[&str] = &["compare", "comparison", "versus", " vs ", "difference between"];

const GREETING_WORD_LIMIT: usize = 20;
const CHEAPER_PRICE_FACTOR: f64 = 0.8;
const MAX_BEDROOMS: u32 = 10;
const MAX_PRICE: f64 = 50_000_000.0;

fn intro_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:my name is|i am|i'm|i’m|this is|im)\s+([a-zA-Z0-9]+)")
            .expect("static pattern")
    })
}

fn bedrooms_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s*(?:br\b|bed(?:room)?s?\b)").expect("static pattern"))
}

fn price_k_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\$?(\d+(?:\.\d+)?)k\b").expect("static pattern"))
}

fn price_full_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\s?(\d[\d,]{3,})").expect("static pattern"))
}

/// Classify a query, resolving relative references against the prior
/// turn's memory when one exists.
pub fn classify(
    query: &str,
    prior_filters: Option<&SearchFilters>,
    prior_neighborhood: Option<&str>,
) -> Intent {
    let query_lower = query.to_lowercase();
    let word_count = query.split_whitespace().count();

    let has_property_intent = PROPERTY_KEYWORDS.iter().any(|kw| query_lower.contains(kw));
    let is_greeting = GREETING_WORDS
        .iter()
        .any(|g| starts_with_word(&query_lower, g));
    let intro = intro_re().captures(&query_lower);

    if (is_greeting || intro.is_some())
        && !has_property_intent
        && word_count <= GREETING_WORD_LIMIT
    {
        let greeting_name = intro.map(|cap| capitalize(&cap[1]));
        return Intent {
            kind: IntentKind::Greeting,
            filters: SearchFilters::default(),
            context_used: false,
            greeting_name,
        };
    }

    let mut filters = extract_filters(&query_lower);
    let mut context_used = false;

    if CHEAPER_CUES.iter().any(|cue| query_lower.contains(cue)) {
        if let Some(prior) = prior_filters.filter(|p| !p.is_empty()) {
            if filters.bedrooms.is_none() && prior.bedrooms.is_some() {
                filters.bedrooms = prior.bedrooms;
                context_used = true;
            }
            if filters.max_price.is_none() {
                if let Some(prior_price) = prior.max_price {
                    filters.max_price = Some(prior_price * CHEAPER_PRICE_FACTOR);
                    context_used = true;
                }
            }
            if filters.neighborhood.is_none() && prior.neighborhood.is_some() {
                filters.neighborhood = prior.neighborhood.clone();
                context_used = true;
            }
        }
    }

    if SIMILAR_CUES.iter().any(|cue| query_lower.contains(cue))
        && filters.neighborhood.is_none()
    {
        if let Some(prior) = prior_neighborhood {
            filters.neighborhood = Some(prior.to_string());
            context_used = true;
        }
    }

    let kind = if COMPARE_WORDS.iter().any(|w| query_lower.contains(w)) {
        IntentKind::Compare
    } else if RENTAL_WORDS.iter().any(|w| query_lower.contains(w)) {
        IntentKind::Rental
    } else if BUY_WORDS.iter().any(|w| query_lower.contains(w)) {
        IntentKind::Buy
    } else {
        IntentKind::General
    };

    Intent {
        kind,
        filters,
        context_used,
        greeting_name: None,
    }
}

/// Pull structured filters out of a lowercased query, dropping values
/// outside plausible bounds.
fn extract_filters(query_lower: &str) -> SearchFilters {
    let mut filters = SearchFilters::default();

    if let Some(cap) = bedrooms_re().captures(query_lower) {
        filters.bedrooms = cap[1]
            .parse::<u32>()
            .ok()
            .filter(|b| *b <= MAX_BEDROOMS);
    }

    if let Some(cap) = price_k_re().captures(query_lower) {
        filters.max_price = cap[1].parse::<f64>().ok().map(|v| v * 1000.0);
    } else if let Some(cap) = price_full_re().captures(query_lower) {
        filters.max_price = cap[1].replace(',', "").parse::<f64>().ok();
    }
    filters.max_price = filters
        .max_price
        .filter(|p| *p > 0.0 && *p <= MAX_PRICE);

    filters.neighborhood = NEIGHBORHOODS
        .iter()
        .find(|n| query_lower.contains(*n))
        .map(|n| title_case(n));

    filters
}

/// True when `text` starts with `word` followed by a word boundary.
fn starts_with_word(text: &str, word: &str) -> bool {
    match text.strip_prefix(word) {
        Some(rest) => rest.chars().next().map_or(true, |c| !c.is_alphanumeric()),
        None => false,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn title_case(words: &str) -> String {
    words
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_fresh(query: &str) -> Intent {
        classify(query, None, None)
    }

    #[test]
    fn bare_greeting_is_greeting() {
        let intent = classify_fresh("hi");
        assert_eq!(intent.kind, IntentKind::Greeting);
        assert_eq!(intent.greeting_name, None);
    }

    #[test]
    fn introduction_extracts_display_name() {
        let intent = classify_fresh("hey there, i'm dana!");
        assert_eq!(intent.kind, IntentKind::Greeting);
        assert_eq!(intent.greeting_name.as_deref(), Some("Dana"));
    }

    #[test]
    fn property_keywords_veto_greeting() {
        let intent = classify_fresh("hi, I am Dana, show me 3 bedroom properties in Back Bay");
        assert_ne!(intent.kind, IntentKind::Greeting);
        assert_eq!(intent.filters.bedrooms, Some(3));
        assert_eq!(intent.filters.neighborhood.as_deref(), Some("Back Bay"));
    }

    #[test]
    fn long_message_is_not_a_greeting() {
        let long = format!("hello {}", "word ".repeat(25));
        assert_ne!(classify_fresh(&long).kind, IntentKind::Greeting);
    }

    #[test]
    fn greeting_prefix_requires_word_boundary() {
        // "hill" starts with "hi" but is not a greeting word.
        let intent = classify_fresh("hill views");
        assert_ne!(intent.kind, IntentKind::Greeting);
    }

    #[test]
    fn extracts_bedrooms_and_price_ceiling() {
        let intent = classify_fresh("find a 2br under $500k");
        assert_eq!(intent.filters.bedrooms, Some(2));
        assert_eq!(intent.filters.max_price, Some(500_000.0));
    }

    #[test]
    fn extracts_full_dollar_amount() {
        let intent = classify_fresh("homes below $1,200,000 please");
        assert_eq!(intent.filters.max_price, Some(1_200_000.0));
    }

    #[test]
    fn out_of_bounds_filters_are_dropped() {
        let intent = classify_fresh("show me a 99 bedroom palace for $90,000,000");
        assert_eq!(intent.filters.bedrooms, None);
        assert_eq!(intent.filters.max_price, None);
    }

    #[test]
    fn cheaper_carries_prior_filters_with_reduced_ceiling() {
        let prior = SearchFilters {
            bedrooms: None,
            max_price: Some(1_000_000.0),
            neighborhood: Some("Back Bay".to_string()),
        };
        let intent = classify("what about cheaper options?", Some(&prior), None);
        assert_eq!(intent.filters.max_price, Some(800_000.0));
        assert_eq!(intent.filters.neighborhood.as_deref(), Some("Back Bay"));
        assert!(intent.context_used);
    }

    #[test]
    fn cheaper_without_prior_session_carries_nothing() {
        let intent = classify_fresh("anything cheaper?");
        assert_eq!(intent.filters, SearchFilters::default());
        assert!(!intent.context_used);
    }

    #[test]
    fn similar_carries_prior_neighborhood() {
        let intent = classify("show me similar homes", None, Some("Fenway"));
        assert_eq!(intent.filters.neighborhood.as_deref(), Some("Fenway"));
        assert!(intent.context_used);
    }

    #[test]
    fn rental_and_buy_intents() {
        assert_eq!(
            classify_fresh("apartments to rent in fenway").kind,
            IntentKind::Rental
        );
        assert_eq!(
            classify_fresh("condos to buy near seaport").kind,
            IntentKind::Buy
        );
        assert_eq!(
            classify_fresh("compare back bay and south end prices").kind,
            IntentKind::Compare
        );
    }
}
