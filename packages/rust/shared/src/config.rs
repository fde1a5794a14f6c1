//! Application configuration for restoscout.
//!
//! Settings live in `restoscout.toml` (working directory by default).
//! CLI flags override config file values, which override defaults.
//! The source and city lists are separate JSON files referenced from `[inputs]`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RestoscoutError, Result};

/// Default configuration file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "restoscout.toml";

// ---------------------------------------------------------------------------
// Config structs (matching restoscout.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Source and city list locations.
    #[serde(default)]
    pub inputs: InputsConfig,

    /// Message broker settings.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Google Maps adapter settings.
    #[serde(default)]
    pub googlemaps: GoogleMapsConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory receiving snapshot files.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Plain-text file holding the next identifier to issue.
    #[serde(default = "default_counter_file")]
    pub counter_file: String,

    /// Enrich records concurrently.
    #[serde(default)]
    pub parallel: bool,

    /// Worker count for parallel enrichment (values <= 0 mean one worker).
    #[serde(default = "default_workers")]
    pub workers: i64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            counter_file: default_counter_file(),
            parallel: false,
            workers: default_workers(),
        }
    }
}

fn default_output_dir() -> String {
    "output".into()
}
fn default_counter_file() -> String {
    "output/counter.txt".into()
}
fn default_workers() -> i64 {
    5
}

/// `[inputs]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputsConfig {
    /// JSON array of `{ "scraper", "url" }` source descriptors.
    #[serde(default = "default_sources_file")]
    pub sources_file: String,

    /// JSON array of `{ "city" }` entries.
    #[serde(default = "default_cities_file")]
    pub cities_file: String,
}

impl Default for InputsConfig {
    fn default() -> Self {
        Self {
            sources_file: default_sources_file(),
            cities_file: default_cities_file(),
        }
    }
}

fn default_sources_file() -> String {
    "config/sources.json".into()
}
fn default_cities_file() -> String {
    "config/villes_maroc.json".into()
}

/// `[broker]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Comma-separated bootstrap endpoints.
    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: String,

    /// Destination topic.
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Seconds to wait for a broker acknowledgement per message.
    #[serde(default = "default_ack_timeout")]
    pub ack_timeout_secs: u64,

    /// Client-level retries before a publish is reported as failed.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: default_bootstrap_servers(),
            topic: default_topic(),
            ack_timeout_secs: default_ack_timeout(),
            retries: default_retries(),
        }
    }
}

fn default_bootstrap_servers() -> String {
    "kafka:9092".into()
}
fn default_topic() -> String {
    "scraper-data".into()
}
fn default_ack_timeout() -> u64 {
    10
}
fn default_retries() -> u32 {
    3
}

/// `[googlemaps]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleMapsConfig {
    /// Base URL for per-restaurant enrichment searches.
    #[serde(default = "default_search_base_url")]
    pub search_base_url: String,

    /// Nominatim-compatible reverse geocoding endpoint.
    #[serde(default = "default_geocode_url")]
    pub geocode_url: String,

    /// Optional rendering service (`POST {endpoint}/content`) for JS-heavy pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_endpoint: Option<String>,

    /// Token for the rendering service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_token: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// User-Agent sent to upstream services.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for GoogleMapsConfig {
    fn default() -> Self {
        Self {
            search_base_url: default_search_base_url(),
            geocode_url: default_geocode_url(),
            render_endpoint: None,
            render_token: None,
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_search_base_url() -> String {
    "https://www.google.com/search".into()
}
fn default_geocode_url() -> String {
    "https://nominatim.openstreetmap.org/reverse".into()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("restoscout/", env!("CARGO_PKG_VERSION")).into()
}

// ---------------------------------------------------------------------------
// Input lists
// ---------------------------------------------------------------------------

/// One entry of the sources file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Registry key of the adapter.
    pub scraper: String,
    /// URL template, optionally containing `{param}`.
    pub url: String,
}

/// One entry of the cities file. Extra keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityEntry {
    pub city: String,
}

/// Load the source descriptors. Entries with a blank scraper or URL are rejected.
pub fn load_sources(path: &Path) -> Result<Vec<SourceDescriptor>> {
    let sources: Vec<SourceDescriptor> = read_json(path)?;
    if let Some(pos) = sources
        .iter()
        .position(|s| s.scraper.trim().is_empty() || s.url.trim().is_empty())
    {
        return Err(RestoscoutError::validation(format!(
            "{}: source #{} needs both a scraper and a url",
            path.display(),
            pos + 1
        )));
    }
    Ok(sources)
}

/// Load the city list, in file order.
pub fn load_cities(path: &Path) -> Result<Vec<String>> {
    let entries: Vec<CityEntry> = read_json(path)?;
    Ok(entries.into_iter().map(|e| e.city).collect())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| RestoscoutError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| {
        RestoscoutError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the application config. An explicit path must exist; otherwise
/// `./restoscout.toml` is used when present, else defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config_from(path);
    }

    let path = PathBuf::from(DEFAULT_CONFIG_FILE);
    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RestoscoutError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        RestoscoutError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Write a default config file at `path`, refusing to overwrite an existing one.
pub fn init_config(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Err(RestoscoutError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| RestoscoutError::io(parent, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| RestoscoutError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| RestoscoutError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("counter_file"));
        assert!(toml_str.contains("scraper-data"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.workers, 5);
        assert_eq!(parsed.broker.ack_timeout_secs, 10);
        assert_eq!(parsed.broker.retries, 3);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
parallel = true

[broker]
topic = "restaurants"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert!(config.defaults.parallel);
        assert_eq!(config.defaults.output_dir, "output");
        assert_eq!(config.broker.topic, "restaurants");
        assert_eq!(config.broker.bootstrap_servers, "kafka:9092");
        assert!(config.googlemaps.render_endpoint.is_none());
    }

    #[test]
    fn loads_sources_and_cities() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sources = dir.path().join("sources.json");
        let cities = dir.path().join("villes.json");
        std::fs::write(
            &sources,
            r#"[{"scraper": "googlemaps", "url": "https://maps.example/{param}"}]"#,
        )
        .unwrap();
        std::fs::write(
            &cities,
            r#"[{"city": "Rabat", "region": "Rabat-Salé-Kénitra"}, {"city": "Fès"}]"#,
        )
        .unwrap();

        let sources = load_sources(&sources).expect("sources");
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].scraper, "googlemaps");

        let cities = load_cities(&cities).expect("cities");
        assert_eq!(cities, vec!["Rabat".to_string(), "Fès".to_string()]);
    }

    #[test]
    fn malformed_sources_is_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sources.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = load_sources(&path).unwrap_err();
        assert!(matches!(err, RestoscoutError::Config { .. }));
    }

    #[test]
    fn blank_source_url_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sources.json");
        std::fs::write(&path, r#"[{"scraper": "googlemaps", "url": "  "}]"#).unwrap();

        let err = load_sources(&path).unwrap_err();
        assert!(matches!(err, RestoscoutError::Validation { .. }));
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(DEFAULT_CONFIG_FILE);

        init_config(&path).expect("first init");
        let parsed = load_config_from(&path).expect("load written config");
        assert_eq!(parsed.inputs.sources_file, "config/sources.json");

        assert!(init_config(&path).is_err());
    }
}
