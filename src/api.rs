//! Backend REST API client
//!
//! URL building for every endpoint of the backend, plus the transport seam
//! (`HttpFetch`) the rest of the crate issues its GET requests through.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error};

use crate::config::AppConfig;
use crate::error::{PvrError, Result};

/// Issue a GET request and return the body.
///
/// Implementations must return `PvrError::EmptyResponse` for an empty body so
/// callers can treat "nothing came back" uniformly.
pub trait HttpFetch {
    fn get(&self, url: &str) -> Result<String>;
}

/// Blocking HTTP transport on a shared ureq agent
pub struct UreqFetcher {
    agent: ureq::Agent,
    user_agent: String,
}

impl UreqFetcher {
    pub fn new(config: &AppConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.read_timeout_secs)))
            .timeout_connect(Some(Duration::from_secs(config.connect_timeout_secs)))
            // Error-shaped bodies ({"error": ...}) still need to reach the parser
            .http_status_as_error(false)
            .max_idle_connections(4)
            .max_idle_connections_per_host(2)
            .build()
            .new_agent();

        Self {
            agent,
            user_agent: config.user_agent.clone(),
        }
    }
}

impl HttpFetch for UreqFetcher {
    fn get(&self, url: &str) -> Result<String> {
        debug!("HTTP GET: {}", url);

        let mut response = self
            .agent
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json")
            .call()
            .map_err(|e| {
                error!("Failed to open URL {}: {}", url, e);
                PvrError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            debug!("HTTP {} from {}", status, url);
        }

        let body = response.body_mut().read_to_string()?;
        if body.is_empty() {
            debug!("Empty response from: {}", url);
            return Err(PvrError::EmptyResponse(url.to_string()));
        }
        Ok(body)
    }
}

/// Parse a JSON document, logging where it broke
pub fn parse_json(body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| {
        error!("JSON parse error: {} (line {}, column {})", e, e.line(), e.column());
        PvrError::Json(e)
    })
}

/// Surface an explicit `{"error": "..."}` document as a backend error
pub fn check_backend_error(doc: &Value) -> Result<()> {
    match doc.get("error").and_then(Value::as_str) {
        Some(message) => Err(PvrError::Backend(message.to_string())),
        None => Ok(()),
    }
}

/// Time window and program reference for catch-up requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

/// URL builder for the backend's REST endpoints
#[derive(Debug, Clone)]
pub struct BackendApi {
    base_url: String,
}

impl BackendApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.base_url())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn channel_url(&self, provider: &str, channel_id: &str, action: &str) -> String {
        self.url(&format!(
            "/api/providers/{}/channels/{}/{}",
            provider, channel_id, action
        ))
    }

    /// Provider listing; also the connectivity probe target
    pub fn providers_url(&self) -> String {
        self.url("/api/providers")
    }

    pub fn channels_url(&self, provider: &str) -> String {
        self.url(&format!("/api/providers/{}/channels", provider))
    }

    pub fn manifest_url(&self, provider: &str, channel_id: &str) -> String {
        self.channel_url(provider, channel_id, "manifest")
    }

    pub fn drm_url(&self, provider: &str, channel_id: &str) -> String {
        self.channel_url(provider, channel_id, "drm")
    }

    pub fn epg_url(
        &self,
        provider: &str,
        channel_id: &str,
        window: TimeWindow,
        country: Option<&str>,
    ) -> String {
        let mut url = format!(
            "{}?start_time={}&end_time={}",
            self.channel_url(provider, channel_id, "epg"),
            window.start,
            window.end
        );
        append_country(&mut url, country);
        url
    }

    pub fn catchup_stream_url(
        &self,
        provider: &str,
        channel_id: &str,
        window: TimeWindow,
        epg_id: u32,
        country: Option<&str>,
    ) -> String {
        let mut url = format!(
            "{}?start_time={}&end_time={}&epg_id={}",
            self.channel_url(provider, channel_id, "stream"),
            window.start,
            window.end,
            epg_id
        );
        append_country(&mut url, country);
        url
    }
}

fn append_country(url: &mut String, country: Option<&str>) {
    if let Some(country) = country.filter(|c| !c.is_empty()) {
        url.push_str("&country=");
        url.push_str(country);
    }
}
