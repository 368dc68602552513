//! Collection routing and metric-aware relevance.
//!
//! Keyword routing is cheap and interpretable, and keeps a query from
//! fanning out to every collection in the store. Unknown vocabulary
//! degrades to the property collections, never to an empty set.

use std::collections::HashMap;

use serde::Deserialize;

/// Distance metric a collection was indexed under. Determines how a raw
/// distance is normalized into a presentation-layer relevance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionMetric {
    Cosine,
    L2,
}

/// Per-collection metric registry, populated from configuration at
/// startup. Collections not listed use cosine, the ingestion default.
#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    metrics: HashMap<String, CollectionMetric>,
}

impl MetricRegistry {
    pub fn new(metrics: HashMap<String, CollectionMetric>) -> Self {
        Self { metrics }
    }

    pub fn metric_for(&self, collection: &str) -> CollectionMetric {
        self.metrics
            .get(collection)
            .copied()
            .unwrap_or(CollectionMetric::Cosine)
    }

    /// Normalize a non-negative distance into a 0–100 relevance score.
    pub fn relevance(&self, collection: &str, distance: f64) -> f64 {
        relevance_percent(self.metric_for(collection), distance)
    }
}

/// Distance → relevance, per metric. Always within [0, 100] for any
/// non-negative distance.
pub fn relevance_percent(metric: CollectionMetric, distance: f64) -> f64 {
    let raw = match metric {
        CollectionMetric::Cosine => (2.0 - distance) / 2.0 * 100.0,
        CollectionMetric::L2 => 100.0 - distance * 10.0,
    };
    raw.clamp(0.0, 100.0)
}

/// Keyword-category routing table. First-match order is meaningful: it
/// becomes the tie-break priority when merged distances are equal.
const ROUTING_RULES: &[(&[&str], &[&str])] = &[
    (
        &["crime", "safety", "safe", "dangerous"],
        &["boston_crime", "crime"],
    ),
    (
        &["neighborhood", "area", "community", "best place", "demographic"],
        &["neighborhoods", "demographics"],
    ),
    (&["school", "education"], &["schools"]),
    (
        &["restaurant", "shop", "park", "gym", "cafe"],
        &["amenities", "parks", "yelp_businesses"],
    ),
    (
        &["transit", "subway", "train", "bus", "mbta", "commute"],
        &["transit"],
    ),
    (
        &[
            "property", "home", "house", "condo", "apartment", "rent", "buy", "bedroom", "price",
        ],
        &[
            "properties",
            "boston_properties",
            "zillow_listings",
            "zillow_rentals",
        ],
    ),
];

const DEFAULT_COLLECTIONS: &[&str] = &["properties", "boston_properties"];

#[derive(Debug, Clone)]
pub struct CollectionSelector {
    max_collections: usize,
}

impl CollectionSelector {
    pub fn new(max_collections: usize) -> Self {
        Self { max_collections }
    }

    /// Map a query to an ordered list of collections to search.
    ///
    /// When `available` is known, candidates are filtered to it; if the
    /// filter would leave nothing, the available collections themselves
    /// are used so a non-empty store always yields a non-empty plan.
    pub fn select(&self, query: &str, available: Option<&[String]>) -> Vec<String> {
        let query_lower = query.to_lowercase();

        let mut candidates: Vec<&str> = Vec::new();
        for (keywords, collections) in ROUTING_RULES {
            if keywords.iter().any(|kw| query_lower.contains(kw)) {
                candidates.extend(collections.iter());
            }
        }

        if candidates.is_empty() {
            candidates.extend(DEFAULT_COLLECTIONS.iter());
        }

        let mut seen = Vec::new();
        for name in candidates {
            if !seen.iter().any(|s: &String| s == name) {
                seen.push(name.to_string());
            }
        }

        let mut selected: Vec<String> = match available {
            Some(names) => {
                let filtered: Vec<String> = seen
                    .iter()
                    .filter(|name| names.contains(*name))
                    .cloned()
                    .collect();
                if filtered.is_empty() {
                    names.to_vec()
                } else {
                    filtered
                }
            }
            None => seen,
        };

        selected.truncate(self.max_collections);
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn available(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn crime_query_routes_to_crime_collections() {
        let selector = CollectionSelector::new(6);
        let avail = available(&["boston_crime", "properties", "schools"]);
        let selected = selector.select("is Dorchester safe at night?", Some(&avail));
        assert_eq!(selected, vec!["boston_crime".to_string()]);
    }

    #[test]
    fn property_query_selects_property_collections_in_order() {
        let selector = CollectionSelector::new(6);
        let avail = available(&["properties", "boston_properties", "transit"]);
        let selected = selector.select("show me a 3 bedroom home", Some(&avail));
        assert_eq!(
            selected,
            vec!["properties".to_string(), "boston_properties".to_string()]
        );
    }

    #[test]
    fn multi_topic_query_unions_in_first_match_order() {
        let selector = CollectionSelector::new(6);
        let selected = selector.select("crime near schools", None);
        assert_eq!(
            selected,
            vec![
                "boston_crime".to_string(),
                "crime".to_string(),
                "schools".to_string()
            ]
        );
    }

    #[test]
    fn unknown_vocabulary_falls_back_to_defaults() {
        let selector = CollectionSelector::new(6);
        let selected = selector.select("zzz qqq", None);
        assert_eq!(
            selected,
            vec!["properties".to_string(), "boston_properties".to_string()]
        );
    }

    #[test]
    fn never_empty_when_store_is_nonempty() {
        let selector = CollectionSelector::new(6);
        let avail = available(&["some_other_collection"]);
        let selected = selector.select("tell me about crime", Some(&avail));
        assert_eq!(selected, vec!["some_other_collection".to_string()]);
    }

    #[test]
    fn respects_collection_cap() {
        let selector = CollectionSelector::new(2);
        let selected = selector.select("crime near schools and parks", None);
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn relevance_stays_in_range() {
        for metric in [CollectionMetric::Cosine, CollectionMetric::L2] {
            for distance in [0.0, 0.3, 1.0, 2.0, 5.0, 37.5, 1e6] {
                let rel = relevance_percent(metric, distance);
                assert!((0.0..=100.0).contains(&rel), "{:?} d={}", metric, distance);
            }
        }
    }

    #[test]
    fn cosine_and_l2_normalize_differently() {
        assert_eq!(relevance_percent(CollectionMetric::Cosine, 0.5), 75.0);
        assert_eq!(relevance_percent(CollectionMetric::L2, 0.5), 95.0);
        assert_eq!(relevance_percent(CollectionMetric::Cosine, 2.0), 0.0);
        assert_eq!(relevance_percent(CollectionMetric::L2, 12.0), 0.0);
    }

    #[test]
    fn registry_defaults_to_cosine() {
        let mut metrics = HashMap::new();
        metrics.insert("boston_crime".to_string(), CollectionMetric::L2);
        let registry = MetricRegistry::new(metrics);
        assert_eq!(registry.metric_for("boston_crime"), CollectionMetric::L2);
        assert_eq!(registry.metric_for("properties"), CollectionMetric::Cosine);
    }
}
