//! Google Maps restaurant search adapter.
//!
//! `fetch_batch` loads a Maps search results page, extracts one record per
//! result card, and reverse-geocodes card coordinates into an address.
//! The enricher searches each restaurant by name and pulls a phone number,
//! the official website, and social network links out of the results page.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use restoscout_shared::{GoogleMapsConfig, RawRecord, RawValue, RestoscoutError, Result, fields};
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use url::Url;

use super::{Enricher, SourceAdapter};
use crate::fetch::PageFetcher;

/// Origin prepended to relative card links.
const MAPS_ORIGIN: &str = "https://www.google.com";

/// Below this many cards the results page probably did not finish loading.
const MIN_EXPECTED_CARDS: usize = 5;

/// Hosts that are never the restaurant's own website.
const NON_WEBSITE_HOSTS: [&str; 4] = ["instagram.com", "facebook.com", "tripadvisor.com", "google.com"];

/// Hosts collected as social network profiles.
const SOCIAL_HOSTS: [&str; 5] = [
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "linkedin.com",
    "youtube.com",
];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

static CARD: LazyLock<Selector> = LazyLock::new(|| selector("div.Nv2PK"));
static CARD_NAME: LazyLock<Selector> = LazyLock::new(|| selector("div.qBF1Pd"));
static CARD_LINK: LazyLock<Selector> = LazyLock::new(|| selector("a.hfpxzc"));
static CARD_RATING: LazyLock<Selector> = LazyLock::new(|| selector("span.MW4etd"));
static CARD_REVIEWS: LazyLock<Selector> = LazyLock::new(|| selector("span.UY7F9"));
static CARD_CUISINE: LazyLock<Selector> =
    LazyLock::new(|| selector("div.W4Efsd > div.W4Efsd span span"));
static SPAN: LazyLock<Selector> = LazyLock::new(|| selector("span"));
static RESULT_LINK: LazyLock<Selector> = LazyLock::new(|| selector("div.yuRUbf a[href]"));
static ANY_LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));

static COORDINATES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!3d([-\d.]+)!4d([-\d.]+)").expect("static regex"));
static MOROCCAN_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(0[567](?:[\s.-]?\d{2}){4})").expect("static regex"));

// ---------------------------------------------------------------------------
// Page parsing
// ---------------------------------------------------------------------------

/// One result card of a Maps search page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapsCard {
    pub name: Option<String>,
    pub url: Option<String>,
    pub rating: Option<String>,
    pub review_count: Option<String>,
    pub cuisine: Option<String>,
    pub price_range: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

fn first_text(el: &ElementRef<'_>, sel: &Selector) -> Option<String> {
    el.select(sel)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extract result cards from a Maps search results page.
pub fn parse_cards(html: &str) -> Vec<MapsCard> {
    let doc = Html::parse_document(html);

    doc.select(&CARD)
        .map(|card| {
            let url = card
                .select(&CARD_LINK)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(|href| {
                    if href.starts_with("http") {
                        href.to_string()
                    } else {
                        format!("{MAPS_ORIGIN}{href}")
                    }
                });

            let (latitude, longitude) = url
                .as_deref()
                .and_then(|u| COORDINATES.captures(u))
                .map(|c| (Some(c[1].to_string()), Some(c[2].to_string())))
                .unwrap_or((None, None));

            let price_range = card
                .select(&SPAN)
                .map(|s| s.text().collect::<String>().trim().to_string())
                .find(|t| t.starts_with("MAD"));

            MapsCard {
                name: first_text(&card, &CARD_NAME),
                url,
                rating: first_text(&card, &CARD_RATING),
                review_count: first_text(&card, &CARD_REVIEWS)
                    .map(|s| s.trim_matches(|c| c == '(' || c == ')').to_string()),
                cuisine: first_text(&card, &CARD_CUISINE),
                price_range,
                latitude,
                longitude,
            }
        })
        .collect()
}

/// What a per-restaurant search turned up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFindings {
    pub telephone: Option<String>,
    pub website: Option<String>,
    pub social_networks: Vec<String>,
}

/// Extract phone, website, and social links from a search results page.
pub fn parse_search_page(html: &str) -> SearchFindings {
    let doc = Html::parse_document(html);

    let text = doc.root_element().text().collect::<Vec<_>>().join(" ");
    let telephone = MOROCCAN_PHONE
        .captures(&text)
        .map(|c| c[1].to_string());

    let website = doc
        .select(&RESULT_LINK)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| !NON_WEBSITE_HOSTS.iter().any(|host| href.contains(host)))
        .map(String::from);

    let mut social_networks: Vec<String> = Vec::new();
    for href in doc.select(&ANY_LINK).filter_map(|a| a.value().attr("href")) {
        if SOCIAL_HOSTS.iter().any(|host| href.contains(host))
            && !social_networks.iter().any(|s| s == href)
        {
            social_networks.push(href.to_string());
        }
    }

    SearchFindings {
        telephone,
        website,
        social_networks,
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ReverseGeocode {
    display_name: Option<String>,
}

/// Google Maps listing source with search-based enrichment.
pub struct GoogleMapsAdapter {
    fetcher: Arc<PageFetcher>,
    geocode_url: String,
    enricher: Arc<GoogleSearchEnricher>,
}

impl GoogleMapsAdapter {
    pub fn new(config: &GoogleMapsConfig) -> Result<Self> {
        let fetcher = Arc::new(PageFetcher::new(config)?);
        let enricher = Arc::new(GoogleSearchEnricher {
            fetcher: Arc::clone(&fetcher),
            search_base_url: config.search_base_url.clone(),
        });

        Ok(Self {
            fetcher,
            geocode_url: config.geocode_url.clone(),
            enricher,
        })
    }

    /// Full address for a coordinate pair; `None` on any failure.
    async fn reverse_geocode(&self, lat: &str, lon: &str) -> Option<String> {
        let response = self
            .fetcher
            .client()
            .get(&self.geocode_url)
            .query(&[
                ("format", "json"),
                ("lat", lat),
                ("lon", lon),
                ("zoom", "16"),
                ("addressdetails", "1"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let body = match response {
            Ok(r) => r.json::<ReverseGeocode>().await,
            Err(e) => Err(e),
        };

        match body {
            Ok(geo) => geo.display_name,
            Err(e) => {
                warn!(lat, lon, error = %e, "reverse geocoding failed");
                None
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for GoogleMapsAdapter {
    fn name(&self) -> &str {
        "googlemaps"
    }

    #[instrument(skip_all, fields(query = %query))]
    async fn fetch_batch(&self, query: &str) -> Result<Vec<RawRecord>> {
        info!("fetching maps results");
        let html = self.fetcher.fetch(query).await?;
        let cards = parse_cards(&html);

        if cards.len() < MIN_EXPECTED_CARDS {
            warn!(cards = cards.len(), "few result cards found");
        }

        let mut records = Vec::with_capacity(cards.len());
        for card in cards {
            let address = match (&card.latitude, &card.longitude) {
                (Some(lat), Some(lon)) => self.reverse_geocode(lat, lon).await,
                _ => None,
            };

            records.push(
                RawRecord::new()
                    .with(fields::NAME, card.name)
                    .with(fields::URL, card.url)
                    .with(fields::RATING, card.rating)
                    .with(fields::REVIEW_COUNT, card.review_count)
                    .with(fields::CUISINE, card.cuisine)
                    .with(fields::PRICE_RANGE, card.price_range)
                    .with(fields::ADDRESS, address)
                    .with(fields::LATITUDE, card.latitude)
                    .with(fields::LONGITUDE, card.longitude)
                    .with(fields::SOURCE, "googlemaps"),
            );
        }

        info!(records = records.len(), "maps results extracted");
        Ok(records)
    }

    fn enricher(&self) -> Option<Arc<dyn Enricher>> {
        Some(self.enricher.clone() as Arc<dyn Enricher>)
    }
}

// ---------------------------------------------------------------------------
// Enricher
// ---------------------------------------------------------------------------

/// Looks a restaurant up by name on a search engine results page.
pub struct GoogleSearchEnricher {
    fetcher: Arc<PageFetcher>,
    search_base_url: String,
}

#[async_trait]
impl Enricher for GoogleSearchEnricher {
    async fn enrich(&self, record: &RawRecord) -> Result<RawRecord> {
        let Some(name) = record.name() else {
            return Ok(record.clone());
        };

        info!(name, "enriching record");
        let url = Url::parse_with_params(&self.search_base_url, &[("q", name)])
            .map_err(|e| RestoscoutError::config(format!("invalid search URL: {e}")))?;

        let html = self
            .fetcher
            .fetch(url.as_str())
            .await
            .map_err(|e| RestoscoutError::Enrichment(format!("{name}: {e}")))?;
        let findings = parse_search_page(&html);

        let mut enriched = record.clone();
        enriched.insert(fields::TELEPHONE, findings.telephone);
        enriched.insert(fields::WEBSITE, findings.website);
        enriched.insert(
            fields::SOCIAL_NETWORKS,
            RawValue::List(findings.social_networks),
        );
        Ok(enriched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RESULTS_PAGE: &str = r#"<html><body><div role="feed">
        <div class="Nv2PK THOPZb CpccDe">
            <a class="hfpxzc" href="/maps/place/Dar+Roumana/data=!4m7!3m6!1s0x0:0x0!8m2!3d34.0651!4d-4.9786"></a>
            <div class="qBF1Pd"> Dar Roumana </div>
            <span class="MW4etd">4,7</span><span class="UY7F9">(312)</span>
            <div class="W4Efsd"><div class="W4Efsd"><span><span>Marocain</span></span></div></div>
            <span>MAD 200–300</span>
        </div>
        <div class="Nv2PK THOPZb CpccDe">
            <a class="hfpxzc" href="https://www.google.com/maps/place/Cafe+Clock"></a>
            <div class="qBF1Pd">Café Clock</div>
        </div>
    </div></body></html>"#;

    const SEARCH_PAGE: &str = r#"<html><body>
        <div class="yuRUbf"><a href="https://www.tripadvisor.com/dar-roumana">Tripadvisor</a></div>
        <div class="yuRUbf"><a href="https://darroumana.com/">Dar Roumana</a></div>
        <span>Téléphone : 05 35 74 16 37</span>
        <a href="https://www.facebook.com/darroumana">fb</a>
        <a href="https://www.instagram.com/darroumana">ig</a>
        <a href="https://www.facebook.com/darroumana">fb again</a>
    </body></html>"#;

    #[test]
    fn parses_cards() {
        let cards = parse_cards(RESULTS_PAGE);
        assert_eq!(cards.len(), 2);

        let first = &cards[0];
        assert_eq!(first.name.as_deref(), Some("Dar Roumana"));
        assert_eq!(first.rating.as_deref(), Some("4,7"));
        assert_eq!(first.review_count.as_deref(), Some("312"));
        assert_eq!(first.cuisine.as_deref(), Some("Marocain"));
        assert_eq!(first.price_range.as_deref(), Some("MAD 200–300"));
        assert_eq!(first.latitude.as_deref(), Some("34.0651"));
        assert_eq!(first.longitude.as_deref(), Some("-4.9786"));
        assert!(first
            .url
            .as_deref()
            .is_some_and(|u| u.starts_with("https://www.google.com/maps/place/")));

        let second = &cards[1];
        assert_eq!(second.name.as_deref(), Some("Café Clock"));
        assert!(second.latitude.is_none());
        assert!(second.price_range.is_none());
    }

    #[test]
    fn parses_search_findings() {
        let findings = parse_search_page(SEARCH_PAGE);
        assert_eq!(findings.telephone.as_deref(), Some("05 35 74 16 37"));
        assert_eq!(findings.website.as_deref(), Some("https://darroumana.com/"));
        assert_eq!(
            findings.social_networks,
            vec![
                "https://www.facebook.com/darroumana".to_string(),
                "https://www.instagram.com/darroumana".to_string(),
            ]
        );
    }

    #[test]
    fn empty_search_page_finds_nothing() {
        let findings = parse_search_page("<html><body><p>No results</p></body></html>");
        assert_eq!(findings, SearchFindings::default());
    }

    fn test_config(server: &MockServer) -> GoogleMapsConfig {
        GoogleMapsConfig {
            search_base_url: format!("{}/search", server.uri()),
            geocode_url: format!("{}/reverse", server.uri()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn fetch_batch_builds_records_with_geocoded_address() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/maps"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("lat", "34.0651"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "display_name": "Derb Roumana, Fès, Maroc"
            })))
            .mount(&server)
            .await;

        let adapter = GoogleMapsAdapter::new(&test_config(&server)).unwrap();
        let records = adapter
            .fetch_batch(&format!("{}/maps", server.uri()))
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text(fields::ADDRESS), Some("Derb Roumana, Fès, Maroc"));
        assert_eq!(records[0].text(fields::SOURCE), Some("googlemaps"));
        assert!(records[1].is_absent(fields::ADDRESS));
        assert!(adapter.enricher().is_some());
    }

    #[tokio::test]
    async fn geocoding_failure_leaves_address_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/maps"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let adapter = GoogleMapsAdapter::new(&test_config(&server)).unwrap();
        let records = adapter
            .fetch_batch(&format!("{}/maps", server.uri()))
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert!(records[0].is_absent(fields::ADDRESS));
    }

    #[tokio::test]
    async fn fetch_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let adapter = GoogleMapsAdapter::new(&test_config(&server)).unwrap();
        assert!(adapter.fetch_batch(&server.uri()).await.is_err());
    }

    #[tokio::test]
    async fn enricher_adds_contact_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "Dar Roumana Fès"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_PAGE))
            .mount(&server)
            .await;

        let adapter = GoogleMapsAdapter::new(&test_config(&server)).unwrap();
        let enricher = adapter.enricher().unwrap();

        let record = RawRecord::new()
            .with(fields::NAME, "Dar Roumana Fès")
            .with(fields::URL, "https://maps/x");
        let enriched = enricher.enrich(&record).await.unwrap();

        assert_eq!(enriched.text(fields::TELEPHONE), Some("05 35 74 16 37"));
        assert_eq!(enriched.text(fields::WEBSITE), Some("https://darroumana.com/"));
        assert_eq!(enriched.list(fields::SOCIAL_NETWORKS).len(), 2);
        assert_eq!(enriched.name(), Some("Dar Roumana Fès"));
        assert_eq!(enriched.text(fields::URL), Some("https://maps/x"));
    }

    #[tokio::test]
    async fn enricher_skips_nameless_records() {
        let server = MockServer::start().await;
        let adapter = GoogleMapsAdapter::new(&test_config(&server)).unwrap();
        let enricher = adapter.enricher().unwrap();

        let record = RawRecord::new().with(fields::RATING, "4.0");
        let enriched = enricher.enrich(&record).await.unwrap();
        assert_eq!(enriched, record);
    }

    #[tokio::test]
    async fn enricher_reports_fetch_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let adapter = GoogleMapsAdapter::new(&test_config(&server)).unwrap();
        let record = RawRecord::new().with(fields::NAME, "Nomad");
        let err = adapter
            .enricher()
            .unwrap()
            .enrich(&record)
            .await
            .unwrap_err();
        assert!(matches!(err, RestoscoutError::Enrichment(_)));
    }
}
