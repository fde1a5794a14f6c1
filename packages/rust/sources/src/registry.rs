//! Maps scraper identifiers from the sources file to adapter constructors.

use std::collections::BTreeMap;
use std::sync::Arc;

use restoscout_shared::{AppConfig, RestoscoutError, Result};

use crate::adapters::{GoogleMapsAdapter, JsonFileAdapter, SourceAdapter};

/// Builds an adapter from the application config.
pub type AdapterConstructor =
    Box<dyn Fn(&AppConfig) -> Result<Arc<dyn SourceAdapter>> + Send + Sync>;

/// Registry of known adapters, keyed by scraper identifier.
pub struct SourceRegistry {
    constructors: BTreeMap<String, AdapterConstructor>,
}

impl SourceRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// A registry with the built-in adapters (`googlemaps`, `json`).
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("googlemaps", |config| {
            Ok(Arc::new(GoogleMapsAdapter::new(&config.googlemaps)?) as Arc<dyn SourceAdapter>)
        });
        registry.register("json", |_| Ok(Arc::new(JsonFileAdapter) as Arc<dyn SourceAdapter>));
        registry
    }

    /// Register (or replace) the constructor for `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&AppConfig) -> Result<Arc<dyn SourceAdapter>> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered identifiers, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Construct the adapter registered under `name`.
    pub fn create(&self, name: &str, config: &AppConfig) -> Result<Arc<dyn SourceAdapter>> {
        let constructor = self.constructors.get(name).ok_or_else(|| {
            RestoscoutError::config(format!(
                "unknown scraper '{name}' (known: {})",
                self.names().join(", ")
            ))
        })?;
        constructor(config)
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
