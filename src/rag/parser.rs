//! Defensive field extraction from loosely-formatted records.
//!
//! The indexed corpus mixes two upstream formats: assessor-style
//! period-delimited sentences ("104 PUTNAM ST, ... . THREE-FAM DWELLING.
//! 6. 3. 719,400") and CSV-dump key-path records ("property.price.value:
//! 719400, property.bedrooms: 3, ..."). No single parser covers both, so
//! extraction cascades through strategies and accepts the first one that
//! produces at least one field.
//!
//! Extraction is total: malformed input yields an all-`None` record, never
//! an error. The period-delimited strategy additionally keeps its legacy
//! default-substitution behavior (see `parse_delimited`).

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Structured fields pulled out of one document. Every field is
/// independently optional; a record with no fields at all is "unparsed"
/// and the caller falls back to the raw snippet.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedProperty {
    pub address: Option<String>,
    pub property_type: Option<String>,
    pub city: Option<String>,
    pub beds: Option<u32>,
    pub baths: Option<f32>,
    pub sqft: Option<u32>,
    pub price: Option<f64>,
}

impl ParsedProperty {
    /// Whether the record carries enough signal to present as a property.
    pub fn is_property(&self) -> bool {
        self.address.is_some() || self.price.is_some()
    }
}

// Legacy defaults of the period-delimited pipeline. That pipeline always
// wants a renderable stub, so missing numerics substitute rather than null.
const DEFAULT_ADDRESS: &str = "Address not available";
const DEFAULT_TYPE: &str = "RESIDENTIAL";
const DEFAULT_BEDS: u32 = 2;
const DEFAULT_BATHS: f32 = 1.0;
const DEFAULT_PRICE: f64 = 650_000.0;

macro_rules! tagged_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("static pattern"))
        }
    };
}

tagged_regex!(price_re, r"property\.price\.value[,:]?\s*(\d+\.?\d*)");
tagged_regex!(bedrooms_re, r"property\.bedrooms[,:]?\s*(\d+\.?\d*)");
tagged_regex!(bathrooms_re, r"property\.bathrooms[,:]?\s*(\d+\.?\d*)");
tagged_regex!(sqft_re, r"property\.livingArea[,:]?\s*(\d+\.?\d*)");
tagged_regex!(street_re, r"property\.address\.streetAddress[,:]?\s*([^,\n]+)");
tagged_regex!(city_re, r"property\.address\.city[,:]?\s*([^,\n]+)");

/// Parse one raw document into a structured record. Total; never fails.
pub fn parse(raw: &str) -> ParsedProperty {
    if let Some(record) = parse_tagged(raw) {
        return record;
    }
    if let Some(record) = parse_piped(raw) {
        return record;
    }
    let field_count = raw.split('.').filter(|p| !p.trim().is_empty()).count();
    if field_count >= 5 {
        return parse_delimited(raw);
    }
    ParsedProperty::default()
}

/// Tagged key-value strategy: dotted `property.*` key paths followed by a
/// value. Missing keys stay `None`. Returns `None` only when no key
/// matched at all.
pub fn parse_tagged(raw: &str) -> Option<ParsedProperty> {
    let mut record = ParsedProperty::default();

    if let Some(cap) = price_re().captures(raw) {
        record.price = cap[1].parse::<f64>().ok();
    }
    if let Some(cap) = bedrooms_re().captures(raw) {
        record.beds = cap[1].parse::<f64>().ok().map(|v| v as u32);
    }
    if let Some(cap) = bathrooms_re().captures(raw) {
        record.baths = cap[1].parse::<f32>().ok();
    }
    if let Some(cap) = sqft_re().captures(raw) {
        record.sqft = cap[1].parse::<f64>().ok().map(|v| v as u32);
    }
    if let Some(cap) = street_re().captures(raw) {
        let addr = clean_value(&cap[1]);
        if addr.len() > 2 {
            record.address = Some(addr);
        }
    }
    if let Some(cap) = city_re().captures(raw) {
        let city = clean_value(&cap[1]);
        if !city.is_empty() {
            record.city = Some(city);
        }
    }

    if record == ParsedProperty::default() {
        None
    } else {
        Some(record)
    }
}

/// Pipe-delimited 3-field fallback: "label | address | city | ...".
fn parse_piped(raw: &str) -> Option<ParsedProperty> {
    let parts: Vec<&str> = raw.split('|').map(str::trim).collect();
    if parts.len() < 3 || parts[1].is_empty() {
        return None;
    }

    Some(ParsedProperty {
        address: Some(parts[1].to_string()),
        city: (!parts[2].is_empty()).then(|| parts[2].to_string()),
        ..ParsedProperty::default()
    })
}

/// Period-delimited positional strategy: address, type, beds, baths, price.
///
/// Total by design: fewer than five fields yields the full stub record,
/// and non-numeric beds/baths/price substitute fixed defaults instead of
/// nulls. Downstream of this pipeline every record must render.
pub fn parse_delimited(raw: &str) -> ParsedProperty {
    let parts: Vec<&str> = raw.split('.').map(str::trim).collect();

    if parts.len() < 5 {
        return ParsedProperty {
            address: Some(DEFAULT_ADDRESS.to_string()),
            property_type: Some(DEFAULT_TYPE.to_string()),
            beds: Some(DEFAULT_BEDS),
            baths: Some(DEFAULT_BATHS),
            price: Some(DEFAULT_PRICE),
            ..ParsedProperty::default()
        };
    }

    let address = if parts[0].is_empty() {
        DEFAULT_ADDRESS.to_string()
    } else {
        parts[0].to_string()
    };
    let property_type = if parts[1].is_empty() {
        DEFAULT_TYPE.to_string()
    } else {
        parts[1].to_string()
    };

    let beds = digits(parts[2])
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(DEFAULT_BEDS);
    let baths = digits(parts[3])
        .and_then(|s| s.parse::<f32>().ok())
        .unwrap_or(DEFAULT_BATHS);
    let price = digits(&parts[4].replace(',', ""))
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(DEFAULT_PRICE);

    ParsedProperty {
        address: Some(address),
        property_type: Some(property_type),
        beds: Some(beds),
        baths: Some(baths),
        price: Some(price),
        ..ParsedProperty::default()
    }
}

/// Render a record in the period-delimited field order, so it can be
/// re-ingested by `parse_delimited`.
#[allow(dead_code)]
pub fn format_delimited(record: &ParsedProperty) -> String {
    format!(
        "{}. {}. {}. {}. {}",
        record.address.as_deref().unwrap_or(""),
        record.property_type.as_deref().unwrap_or(""),
        record.beds.map(|b| b.to_string()).unwrap_or_default(),
        record
            .baths
            .map(|b| format!("{}", b.round() as u32))
            .unwrap_or_default(),
        record.price.map(|p| format!("{:.0}", p)).unwrap_or_default(),
    )
}

fn digits(value: &str) -> Option<&str> {
    (!value.is_empty() && value.chars().all(|c| c.is_ascii_digit())).then_some(value)
}

fn clean_value(value: &str) -> String {
    value.replace(['"', '\''], "").trim().to_string()
}
