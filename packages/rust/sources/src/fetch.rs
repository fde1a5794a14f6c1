//! Page fetching for HTML-backed adapters.
//!
//! Pages are fetched either directly or through a Browserless-style rendering
//! service (`POST {endpoint}/content` with `{"url": ...}`), which returns the
//! fully rendered HTML of JS-heavy pages.

use std::time::Duration;

use reqwest::Client;
use restoscout_shared::{GoogleMapsConfig, RestoscoutError, Result};
use tracing::debug;

/// HTTP fetcher shared by an adapter and its enricher.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    render: Option<RenderEndpoint>,
}

#[derive(Debug, Clone)]
struct RenderEndpoint {
    base_url: String,
    token: Option<String>,
}

impl PageFetcher {
    /// Build a fetcher from the adapter config.
    pub fn new(config: &GoogleMapsConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RestoscoutError::Network(format!("failed to build HTTP client: {e}")))?;

        let render = config.render_endpoint.as_ref().map(|base| RenderEndpoint {
            base_url: base.trim_end_matches('/').to_string(),
            token: config.render_token.clone(),
        });

        Ok(Self { client, render })
    }

    /// The underlying client, for JSON APIs that never need rendering.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fetch the HTML of `url`, rendered when a render endpoint is configured.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        match &self.render {
            Some(render) => self.fetch_rendered(render, url).await,
            None => self.fetch_direct(url).await,
        }
    }

    async fn fetch_direct(&self, url: &str) -> Result<String> {
        debug!(url, "fetching page");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RestoscoutError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RestoscoutError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| RestoscoutError::Network(format!("{url}: body read failed: {e}")))
    }

    async fn fetch_rendered(&self, render: &RenderEndpoint, url: &str) -> Result<String> {
        debug!(url, endpoint = %render.base_url, "fetching rendered page");

        let mut request = self
            .client
            .post(format!("{}/content", render.base_url))
            .json(&serde_json::json!({ "url": url }));
        if let Some(token) = &render.token {
            request = request.query(&[("token", token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RestoscoutError::Network(format!("render {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RestoscoutError::Network(format!(
                "render {url}: HTTP {status}: {message}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| RestoscoutError::Network(format!("render {url}: body read failed: {e}")))
    }
}
