//! Core domain types: raw scraped records, units of work, and the canonical
//! payload delivered downstream.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Placeholder substituted with the unit label in source URL templates.
pub const UNIT_PLACEHOLDER: &str = "{param}";

/// Unit label used for sources whose URL has no placeholder.
pub const UNKNOWN_UNIT_LABEL: &str = "unknown_city";

/// Well-known keys in a [`RawRecord`]. Adapters may add any others.
pub mod fields {
    pub const NAME: &str = "name";
    pub const URL: &str = "url";
    pub const ADDRESS: &str = "address";
    pub const CITY: &str = "city";
    pub const TELEPHONE: &str = "telephone";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    pub const WEBSITE: &str = "website";
    pub const SOCIAL_NETWORKS: &str = "social_networks";
    pub const RATING: &str = "rating";
    pub const REVIEW_COUNT: &str = "review_count";
    pub const CUISINE: &str = "cuisine";
    pub const PRICE_RANGE: &str = "price_range";
    pub const SOURCE: &str = "source";

    /// Fields an enricher may never change.
    pub const IDENTITY: [&str; 2] = [NAME, URL];

    /// French key names found in older raw captures, paired with the current key.
    pub const LEGACY_ALIASES: [(&str, &str); 2] =
        [("site_web", WEBSITE), ("reseaux_sociaux", SOCIAL_NETWORKS)];
}

// ---------------------------------------------------------------------------
// RawValue / RawRecord
// ---------------------------------------------------------------------------

/// A single value in a raw record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Text(String),
    Number(serde_json::Number),
    List(Vec<String>),
}

impl RawValue {
    /// Non-blank text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric interpretation of a number or a numeric string.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for RawValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<f64> for RawValue {
    /// Non-finite floats have no JSON representation and become `Null`.
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n)
            .map(Self::Number)
            .unwrap_or(Self::Null)
    }
}

impl From<Vec<String>> for RawValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// An unstructured scraped item, keyed by source-defined field names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(BTreeMap<String, RawValue>);

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.0.get(key)
    }

    /// Non-blank text stored under `key`.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(RawValue::as_text)
    }

    /// Number (or numeric text) stored under `key`.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(RawValue::as_f64)
    }

    /// List stored under `key`; empty when absent or not a list.
    pub fn list(&self, key: &str) -> &[String] {
        match self.0.get(key) {
            Some(RawValue::List(items)) => items,
            _ => &[],
        }
    }

    /// The identifying name of the record, when present.
    pub fn name(&self) -> Option<&str> {
        self.text(fields::NAME)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<RawValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// A key is absent when missing, `null`, or blank text.
    pub fn is_absent(&self, key: &str) -> bool {
        match self.0.get(key) {
            None | Some(RawValue::Null) => true,
            Some(RawValue::Text(s)) => s.trim().is_empty(),
            Some(_) => false,
        }
    }

    /// Insert `value` under `key` only when the key is absent. Returns whether it was set.
    pub fn set_if_absent(&mut self, key: &str, value: impl Into<RawValue>) -> bool {
        if self.is_absent(key) {
            self.insert(key, value);
            true
        } else {
            false
        }
    }

    /// Move values stored under [`fields::LEGACY_ALIASES`] to their current
    /// keys. An existing value under the current key wins.
    pub fn adopt_legacy_keys(&mut self) {
        for (alias, key) in fields::LEGACY_ALIASES {
            if let Some(value) = self.0.remove(alias) {
                self.set_if_absent(key, value);
            }
        }
    }

    /// Mark the record as "enrichment attempted, nothing found".
    pub fn blank_enrichment(&mut self) {
        self.insert(fields::TELEPHONE, RawValue::Null);
        self.insert(fields::WEBSITE, RawValue::Null);
        self.insert(fields::SOCIAL_NETWORKS, RawValue::List(Vec::new()));
    }

    /// Copy the identity fields of `original` over this record.
    pub fn restore_identity(&mut self, original: &RawRecord) {
        for key in fields::IDENTITY {
            match original.0.get(key) {
                Some(value) => {
                    self.0.insert(key.to_string(), value.clone());
                }
                None => {
                    self.0.remove(key);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RawValue)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<RawValue>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// UnitOfWork
// ---------------------------------------------------------------------------

/// One (source, city) pairing processed end to end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOfWork {
    /// Scraper identifier, resolved through the source registry.
    pub source_name: String,
    /// Source URL, possibly containing [`UNIT_PLACEHOLDER`].
    pub url_template: String,
    /// City name, or [`UNKNOWN_UNIT_LABEL`].
    pub unit_label: String,
}

impl UnitOfWork {
    pub fn new(
        source_name: impl Into<String>,
        url_template: impl Into<String>,
        unit_label: impl Into<String>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            url_template: url_template.into(),
            unit_label: unit_label.into(),
        }
    }

    /// Whether a URL template expands per city.
    pub fn is_templated(url_template: &str) -> bool {
        url_template.contains(UNIT_PLACEHOLDER)
    }

    /// The query handed to the adapter: the template with the label substituted,
    /// or the template unchanged when it has no placeholder.
    pub fn query(&self) -> String {
        if Self::is_templated(&self.url_template) {
            self.url_template.replace(UNIT_PLACEHOLDER, &self.unit_label)
        } else {
            self.url_template.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// CanonicalPayload
// ---------------------------------------------------------------------------

/// Structured postal address of a canonical payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub address_line: String,
    pub address_line2: String,
    pub city: String,
    pub country: String,
    pub zip: String,
}

/// Geographic coordinates. Longitude is emitted under the `lang` key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    #[serde(rename = "lang")]
    pub lng: f64,
}

/// The fixed-schema record delivered to the broker and written to snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPayload {
    pub company_name: String,
    #[serde(rename = "company_RC")]
    pub company_rc: String,
    pub address: Address,
    pub email: String,
    pub phone_number: String,
    pub language: String,
    pub coordinates: Coordinates,
    pub website: Option<String>,
    #[serde(default)]
    pub social_networks: Vec<String>,
    pub rating: Option<RawValue>,
    pub review_count: Option<RawValue>,
    pub cuisine: Option<RawValue>,
    pub price_range: Option<RawValue>,
}

// ---------------------------------------------------------------------------
// DeliveryAck
// ---------------------------------------------------------------------------

/// Broker acknowledgement for one published payload. Diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAck {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl std::fmt::Display for DeliveryAck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]@{}", self.topic, self.partition, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_record_parses_mixed_values() {
        let json = r#"{
            "name": "Dar Naji",
            "rating": "4.5",
            "review_count": 120,
            "latitude": null,
            "social_networks": ["https://facebook.com/darnaji"]
        }"#;
        let record: RawRecord = serde_json::from_str(json).expect("parse record");

        assert_eq!(record.name(), Some("Dar Naji"));
        assert_eq!(record.number("rating"), Some(4.5));
        assert_eq!(record.number("review_count"), Some(120.0));
        assert!(record.get("latitude").is_some_and(RawValue::is_null));
        assert_eq!(record.list("social_networks").len(), 1);
    }

    #[test]
    fn absent_covers_missing_null_and_blank() {
        let record = RawRecord::new()
            .with("city", RawValue::Null)
            .with("address", "   ")
            .with("name", "Le Cabestan");

        assert!(record.is_absent("city"));
        assert!(record.is_absent("address"));
        assert!(record.is_absent("telephone"));
        assert!(!record.is_absent("name"));
    }

    #[test]
    fn set_if_absent_keeps_existing_value() {
        let mut record = RawRecord::new().with("city", "Tanger");
        assert!(!record.set_if_absent("city", "Rabat"));
        assert_eq!(record.text("city"), Some("Tanger"));

        let mut empty = RawRecord::new();
        assert!(empty.set_if_absent("city", "Rabat"));
        assert_eq!(empty.text("city"), Some("Rabat"));
    }

    #[test]
    fn blank_enrichment_sets_explicit_empties() {
        let mut record = RawRecord::new().with("name", "Café Clock");
        record.blank_enrichment();

        assert_eq!(record.get(fields::TELEPHONE), Some(&RawValue::Null));
        assert_eq!(record.get(fields::WEBSITE), Some(&RawValue::Null));
        assert_eq!(
            record.get(fields::SOCIAL_NETWORKS),
            Some(&RawValue::List(vec![]))
        );
    }

    #[test]
    fn legacy_keys_never_overwrite_current_ones() {
        let mut record = RawRecord::new()
            .with(fields::WEBSITE, "https://current.ma")
            .with("site_web", "https://old.ma")
            .with("reseaux_sociaux", vec!["https://instagram.com/old".to_string()]);
        record.adopt_legacy_keys();

        assert_eq!(record.text(fields::WEBSITE), Some("https://current.ma"));
        assert_eq!(record.list(fields::SOCIAL_NETWORKS).len(), 1);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn restore_identity_reverts_name_and_url() {
        let original = RawRecord::new().with("name", "Nomad").with("url", "https://a");
        let mut enriched = RawRecord::new()
            .with("name", "NOMAD (changed)")
            .with("url", "https://b")
            .with("telephone", "0522 12 34 56");

        enriched.restore_identity(&original);

        assert_eq!(enriched.name(), Some("Nomad"));
        assert_eq!(enriched.text("url"), Some("https://a"));
        assert_eq!(enriched.text("telephone"), Some("0522 12 34 56"));
    }

    #[test]
    fn unit_query_substitutes_placeholder() {
        let unit = UnitOfWork::new(
            "googlemaps",
            "https://www.google.com/maps/search/restaurants+{param}",
            "Fes",
        );
        assert_eq!(
            unit.query(),
            "https://www.google.com/maps/search/restaurants+Fes"
        );

        let plain = UnitOfWork::new("json", "data/raw.json", UNKNOWN_UNIT_LABEL);
        assert_eq!(plain.query(), "data/raw.json");
    }

    #[test]
    fn payload_uses_wire_key_names() {
        let payload = CanonicalPayload {
            company_name: "Unknown".into(),
            company_rc: "000001".into(),
            address: Address {
                address_line: "test address".into(),
                address_line2: "test address_line2".into(),
                city: "Rabat".into(),
                country: "Maroc".into(),
                zip: "54000".into(),
            },
            email: "test@test.com".into(),
            phone_number: "12345676543".into(),
            language: "fr".into(),
            coordinates: Coordinates { lat: 0.0, lng: -6.8 },
            website: None,
            social_networks: vec![],
            rating: None,
            review_count: None,
            cuisine: None,
            price_range: None,
        };

        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(value["company_RC"], "000001");
        assert_eq!(value["coordinates"]["lang"], -6.8);
        assert!(value["coordinates"].get("lng").is_none());
        assert!(value["website"].is_null());
    }
}
