//! DRM configuration
//!
//! The backend serves license parameters in two shapes:
//!
//! * legacy: `{"drm_configs": [ {"<system>": {...}} ]}`
//! * modern: `{"drm_configs": {"<system>": {...}}}`
//!
//! Both are read into one [`DrmConfig`]. What the playback handler gets
//! depends on the [`DrmFormat`] negotiated with the host at startup: a
//! verbatim JSON blob for newer hosts, or a pipe-delimited string for older
//! ones.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::api::{parse_json, BackendApi, HttpFetch};
use crate::models::{lenient_bool, lenient_i64, lenient_string, StreamProperty};

/// Royalty-free key system that works without a license URL
pub const CLEARKEY_SYSTEM: &str = "org.w3.clearkey";

/// First host major version whose playback handler takes the JSON format
pub const MODERN_DRM_HOST_MAJOR: u32 = 22;

pub const PROP_DRM: &str = "inputstream.adaptive.drm";
pub const PROP_DRM_LEGACY: &str = "inputstream.adaptive.drm_legacy";

/// DRM property format understood by the host's playback handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrmFormat {
    /// `system|license_url[|headers]`
    Legacy,
    /// JSON object keyed by key system
    Modern,
}

impl DrmFormat {
    pub fn for_host_major(major: u32) -> Self {
        if major >= MODERN_DRM_HOST_MAJOR {
            DrmFormat::Modern
        } else {
            DrmFormat::Legacy
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DrmLicense {
    #[serde(default, deserialize_with = "lenient_string")]
    pub server_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub server_certificate: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub req_headers: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub req_data: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub req_params: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub use_http_get_request: Option<bool>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub wrapper: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unwrapper: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DrmSystemEntry {
    #[serde(default, deserialize_with = "lenient_i64")]
    priority: Option<i64>,
    #[serde(default)]
    license: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrmConfig {
    /// Key system, e.g. `com.widevine.alpha`
    pub system: String,
    pub priority: i64,
    pub license: DrmLicense,
}

impl DrmConfig {
    fn from_entry(system: &str, data: &Value) -> Self {
        let entry: DrmSystemEntry = serde_json::from_value(data.clone()).unwrap_or_default();
        let license = entry
            .license
            .filter(Value::is_object)
            .and_then(|l| serde_json::from_value(l).ok())
            .unwrap_or_default();

        Self {
            system: system.to_string(),
            priority: entry.priority.unwrap_or(1),
            license,
        }
    }

    pub fn license_url(&self) -> Option<&str> {
        self.license.server_url.as_deref().filter(|u| !u.is_empty())
    }

    /// Pipe-delimited legacy value. A system without license URL is only
    /// usable for ClearKey; anything else yields nothing.
    pub fn to_legacy_value(&self) -> Option<String> {
        if self.system.is_empty() {
            return None;
        }

        match self.license_url() {
            Some(url) => {
                let mut value = format!("{}|{}", self.system, url);
                if let Some(headers) = self.license.req_headers.as_deref().filter(|h| !h.is_empty()) {
                    value.push('|');
                    value.push_str(headers);
                }
                Some(value)
            }
            None => {
                debug!(
                    "DRM system {} configured but no license URL provided",
                    self.system
                );
                (self.system == CLEARKEY_SYSTEM).then(|| self.system.clone())
            }
        }
    }
}

/// The object keyed by key system, whichever shape the backend used
fn systems_object(configs: &Value) -> Option<&Map<String, Value>> {
    match configs {
        Value::Object(map) => Some(map),
        Value::Array(items) => items.iter().find_map(Value::as_object),
        _ => None,
    }
}

/// First DRM system of a `/drm` document. Further systems are ignored.
pub fn parse_drm_config(doc: &Value) -> Option<DrmConfig> {
    let systems = systems_object(doc.get("drm_configs")?)?;
    let (system, data) = systems.iter().next()?;
    Some(DrmConfig::from_entry(system, data))
}

/// Compact JSON of `drm_configs` exactly as received, object or legacy
/// array, or `None` when it carries no system
pub fn modern_drm_value(doc: &Value) -> Option<String> {
    let configs = doc.get("drm_configs")?;
    if systems_object(configs).map_or(true, Map::is_empty) {
        return None;
    }
    serde_json::to_string(configs).ok()
}

/// Build the DRM property for a channel. Missing or unusable DRM data is not
/// an error; the property is simply left out.
pub fn resolve_drm_property<F: HttpFetch + ?Sized>(
    fetch: &F,
    api: &BackendApi,
    provider: &str,
    channel_id: &str,
    format: DrmFormat,
) -> Option<StreamProperty> {
    let doc = match fetch.get(&api.drm_url(provider, channel_id)).and_then(|b| parse_json(&b)) {
        Ok(doc) => doc,
        Err(e) => {
            debug!("No DRM data for {}/{}: {}", provider, channel_id, e);
            return None;
        }
    };

    match format {
        DrmFormat::Modern => match modern_drm_value(&doc) {
            Some(value) => {
                debug!(
                    "Set modern DRM config ({} bytes) for {}/{}",
                    value.len(),
                    provider,
                    channel_id
                );
                Some(StreamProperty::new(PROP_DRM, value))
            }
            None => {
                debug!("No DRM configs returned for {}/{}", provider, channel_id);
                None
            }
        },
        DrmFormat::Legacy => {
            let config = parse_drm_config(&doc)?;
            debug!(
                "Got DRM config: system={}, license_url={}",
                config.system,
                config.license_url().unwrap_or("")
            );
            let value = config.to_legacy_value()?;
            debug!("Set legacy DRM config: {}", value);
            Some(StreamProperty::new(PROP_DRM_LEGACY, value))
        }
    }
}
