//! Raw record → canonical payload mapping.

use restoscout_shared::{
    Address, CanonicalPayload, Coordinates, RawRecord, RawValue, Result, fields,
};
use restoscout_storage::IdAllocator;

pub const DEFAULT_COMPANY_NAME: &str = "Unknown";
pub const DEFAULT_ADDRESS_LINE: &str = "test address";
pub const ADDRESS_LINE2: &str = "test address_line2";
pub const COUNTRY: &str = "Maroc";
pub const ZIP: &str = "54000";
pub const EMAIL: &str = "test@test.com";
pub const DEFAULT_PHONE: &str = "12345676543";
pub const LANGUAGE: &str = "fr";

/// Build the canonical payload for one record, allocating its `company_RC`.
///
/// Never fails on missing or malformed fields; defaults are filled instead.
/// The only error is an allocator failure, which is fatal for the unit.
pub fn build_payload(
    record: &RawRecord,
    unit_label: &str,
    allocator: &dyn IdAllocator,
) -> Result<CanonicalPayload> {
    let company_rc = allocator.next_id()?;

    Ok(CanonicalPayload {
        company_name: text_or(record, fields::NAME, DEFAULT_COMPANY_NAME),
        company_rc,
        address: Address {
            address_line: text_or(record, fields::ADDRESS, DEFAULT_ADDRESS_LINE),
            address_line2: ADDRESS_LINE2.to_string(),
            city: text_or(record, fields::CITY, unit_label),
            country: COUNTRY.to_string(),
            zip: ZIP.to_string(),
        },
        email: EMAIL.to_string(),
        phone_number: text_or(record, fields::TELEPHONE, DEFAULT_PHONE),
        language: LANGUAGE.to_string(),
        coordinates: Coordinates {
            lat: coordinate(record, fields::LATITUDE),
            lng: coordinate(record, fields::LONGITUDE),
        },
        website: record.text(fields::WEBSITE).map(str::to_string),
        social_networks: dedup(record.list(fields::SOCIAL_NETWORKS)),
        rating: passthrough(record, fields::RATING),
        review_count: passthrough(record, fields::REVIEW_COUNT),
        cuisine: passthrough(record, fields::CUISINE),
        price_range: passthrough(record, fields::PRICE_RANGE),
    })
}

fn text_or(record: &RawRecord, key: &str, default: &str) -> String {
    record.text(key).unwrap_or(default).to_string()
}

// Non-finite values would serialize as JSON null.
fn coordinate(record: &RawRecord, key: &str) -> f64 {
    record
        .number(key)
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

fn passthrough(record: &RawRecord, key: &str) -> Option<RawValue> {
    record.get(key).filter(|value| !value.is_null()).cloned()
}

/// Drop repeated URLs, keeping the first occurrence of each.
fn dedup(items: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}
