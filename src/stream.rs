//! Stream URL resolution
//!
//! Live channels resolve through the per-channel `/manifest` endpoint.
//! Catch-up programs go through `/stream`, which either redirects (JSON with
//! `manifest_url`) or proxies the manifest itself.

use serde_json::Value;
use tracing::{debug, info};

use crate::api::{check_backend_error, parse_json, BackendApi, HttpFetch, TimeWindow};
use crate::error::{PvrError, Result};
use crate::models::StreamProperty;

pub const PROP_INPUTSTREAM: &str = "inputstream";
pub const PROP_STREAMURL: &str = "streamurl";
pub const ADAPTIVE_HANDLER: &str = "inputstream.adaptive";
pub const PROP_PLAY_TIMESHIFT_BUFFER: &str = "inputstream.adaptive.play_timeshift_buffer";
pub const PROP_MANIFEST_UPDATE_PARAMETER: &str = "inputstream.adaptive.manifest_update_parameter";

fn manifest_from_doc(doc: &Value) -> Result<String> {
    check_backend_error(doc)?;

    let url = doc
        .get("manifest_url")
        .and_then(Value::as_str)
        .ok_or_else(|| PvrError::missing("manifest_url", "manifest"))?;

    if let (Some(provider), Some(channel_id)) = (
        doc.get("provider").and_then(Value::as_str),
        doc.get("channel_id").and_then(Value::as_str),
    ) {
        debug!(
            "Manifest API response - provider: {}, channel_id: {}",
            provider, channel_id
        );
    }
    Ok(url.to_string())
}

/// Ask the backend for a live channel's manifest URL
pub fn resolve_manifest_url<F: HttpFetch + ?Sized>(
    fetch: &F,
    api: &BackendApi,
    provider: &str,
    channel_id: &str,
) -> Result<String> {
    let url = api.manifest_url(provider, channel_id);
    debug!("Calling manifest API: {}", url);

    let doc = parse_json(&fetch.get(&url)?)?;
    let manifest = manifest_from_doc(&doc)?;
    info!("Extracted manifest URL: {}", manifest);
    Ok(manifest)
}

/// Manifest for a past program. A body that is not a JSON object is the
/// manifest itself, so the request URL is what the player should open.
pub fn resolve_catchup_manifest<F: HttpFetch + ?Sized>(
    fetch: &F,
    api: &BackendApi,
    provider: &str,
    channel_id: &str,
    window: TimeWindow,
    epg_id: u32,
    country: Option<&str>,
) -> Result<String> {
    let url = api.catchup_stream_url(provider, channel_id, window, epg_id, country);
    debug!("Calling catch-up stream API: {}", url);

    let body = fetch.get(&url)?;
    match serde_json::from_str::<Value>(&body) {
        Ok(doc) if doc.is_object() => manifest_from_doc(&doc),
        _ => {
            debug!("Catch-up endpoint serves the manifest directly");
            Ok(url)
        }
    }
}

/// Handler selector plus stream URL, always the first two properties
pub fn base_properties(manifest_url: &str) -> Vec<StreamProperty> {
    vec![
        StreamProperty::new(PROP_INPUTSTREAM, ADAPTIVE_HANDLER),
        StreamProperty::new(PROP_STREAMURL, manifest_url),
    ]
}

/// Advisory flags for replaying a finished program
pub fn catchup_flags() -> [StreamProperty; 2] {
    [
        StreamProperty::new(PROP_PLAY_TIMESHIFT_BUFFER, "false"),
        StreamProperty::new(PROP_MANIFEST_UPDATE_PARAMETER, "full"),
    ]
}
