//! Data models for the Ultimate PVR client
//!
//! Wire types mirror the backend's JSON; domain types are what the catalog
//! stores and the host sees.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Content type value that marks a radio channel
pub const RADIO_CONTENT_TYPE: &str = "RADIO";

// ---------------------------------------------------------------------------
// Lenient field decoding: a field of the wrong JSON type counts as absent
// ---------------------------------------------------------------------------

pub(crate) fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.and_then(|v| v.as_str().map(str::to_string)))
}

pub(crate) fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.and_then(|v| v.as_i64()))
}

pub(crate) fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.and_then(|v| v.as_bool()))
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Object form of a `/api/providers` entry
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderObject {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub logo: Option<String>,
}

/// A `/api/providers` entry: full object, or the older bare-name string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProviderEntry {
    Object(ProviderObject),
    Name(String),
}

/// One element of `/api/providers/{provider}/channels`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelEntry {
    #[serde(rename = "Name", default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(rename = "Id", default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(rename = "LogoUrl", default, deserialize_with = "lenient_string")]
    pub logo_url: Option<String>,
    #[serde(rename = "ChannelNumber", default, deserialize_with = "lenient_i64")]
    pub channel_number: Option<i64>,
    #[serde(rename = "Mode", default, deserialize_with = "lenient_string")]
    pub mode: Option<String>,
    #[serde(rename = "SessionManifest", default, deserialize_with = "lenient_bool")]
    pub session_manifest: Option<bool>,
    #[serde(rename = "Manifest", default, deserialize_with = "lenient_string")]
    pub manifest: Option<String>,
    #[serde(rename = "ManifestScript", default, deserialize_with = "lenient_string")]
    pub manifest_script: Option<String>,
    #[serde(rename = "UseCdm", default, deserialize_with = "lenient_bool")]
    pub use_cdm: Option<bool>,
    #[serde(rename = "CdmMode", default, deserialize_with = "lenient_string")]
    pub cdm_mode: Option<String>,
    #[serde(rename = "ContentType", default, deserialize_with = "lenient_string")]
    pub content_type: Option<String>,
    #[serde(rename = "Country", default, deserialize_with = "lenient_string")]
    pub country: Option<String>,
    #[serde(rename = "Language", default, deserialize_with = "lenient_string")]
    pub language: Option<String>,
    #[serde(rename = "StreamingFormat", default, deserialize_with = "lenient_string")]
    pub streaming_format: Option<String>,
    #[serde(rename = "IsRadio", default, deserialize_with = "lenient_bool")]
    pub is_radio: Option<bool>,
    #[serde(rename = "CatchupHours", default, deserialize_with = "lenient_i64")]
    pub catchup_hours: Option<i64>,
}

impl ChannelEntry {
    /// Radio if flagged explicitly, else if the content type says so
    pub fn is_radio(&self) -> bool {
        match self.is_radio {
            Some(flag) => flag,
            None => self.content_type.as_deref() == Some(RADIO_CONTENT_TYPE),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog types
// ---------------------------------------------------------------------------

/// Content provider as loaded from the backend
#[derive(Debug, Clone, PartialEq)]
pub struct Provider {
    /// Backend key, used in every per-provider URL
    pub name: String,
    /// Display label, defaults to `name`
    pub label: String,
    pub country: Option<String>,
    pub logo: Option<String>,
    pub enabled: bool,
    pub unique_id: i32,
}

/// Channel record
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    /// `provider:channel_id`
    pub unique_id: String,
    /// Display number, also the UID the host uses for this channel
    pub number: i32,
    pub name: String,
    pub icon: String,
    pub provider: String,
    pub channel_id: String,
    pub is_radio: bool,

    // Stream properties
    pub mode: String,
    pub session_manifest: bool,
    pub manifest: Option<String>,
    pub manifest_script: Option<String>,
    pub use_cdm: bool,
    pub cdm_mode: String,
    pub content_type: String,
    pub country: String,
    pub language: String,
    pub streaming_format: String,
}

impl Channel {
    /// Build a channel from its wire entry, applying the backend defaults
    pub fn from_entry(provider: &str, entry: &ChannelEntry, number: i32) -> Self {
        let channel_id = entry.id.clone().unwrap_or_default();
        Self {
            unique_id: format!("{}:{}", provider, channel_id),
            number,
            name: entry.name.clone().unwrap_or_default(),
            icon: entry.logo_url.clone().unwrap_or_default(),
            provider: provider.to_string(),
            channel_id,
            is_radio: entry.is_radio(),
            mode: entry.mode.clone().unwrap_or_else(|| "live".to_string()),
            session_manifest: entry.session_manifest.unwrap_or(false),
            manifest: entry.manifest.clone(),
            manifest_script: entry.manifest_script.clone(),
            use_cdm: entry.use_cdm.unwrap_or(true),
            cdm_mode: entry.cdm_mode.clone().unwrap_or_else(|| "external".to_string()),
            content_type: entry.content_type.clone().unwrap_or_else(|| "LIVE".to_string()),
            country: entry.country.clone().unwrap_or_default(),
            language: entry.language.clone().unwrap_or_else(|| "de".to_string()),
            streaming_format: entry.streaming_format.clone().unwrap_or_default(),
        }
    }
}

/// Lookup entry keyed by display number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLookup {
    pub provider: String,
    pub channel_id: String,
    /// Replay window in hours, 0 = no catch-up
    pub catchup_hours: i64,
}

// ---------------------------------------------------------------------------
// Host-facing types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Capabilities {
    pub supports_epg: bool,
    pub supports_tv: bool,
    pub supports_radio: bool,
    pub supports_recordings: bool,
    pub supports_timers: bool,
    pub supports_channel_groups: bool,
    pub supports_channel_scan: bool,
    pub handles_input_stream: bool,
    pub handles_demuxing: bool,
    pub supports_providers: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProviderType {
    Iptv,
}

/// Provider as handed to the host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostProvider {
    pub unique_id: i32,
    pub name: String,
    pub provider_type: ProviderType,
    pub icon_path: String,
    pub countries: Vec<String>,
}

/// Channel as handed to the host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostChannel {
    pub unique_id: i32,
    pub is_radio: bool,
    pub channel_number: i32,
    pub channel_name: String,
    pub icon_path: String,
    pub is_hidden: bool,
    pub has_archive: bool,
    pub client_provider_uid: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelGroup {
    pub group_name: String,
    pub is_radio: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelGroupMember {
    pub group_name: String,
    pub channel_unique_id: i32,
    pub channel_number: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalStatus {
    pub adapter_name: String,
    pub adapter_status: String,
}

/// Key/value pair for the host's playback layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamProperty {
    pub name: String,
    pub value: String,
}

impl StreamProperty {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}
