//! PVR client adapter
//!
//! `PvrClient` owns the catalog and answers every callback the host issues.
//! All calls are synchronous on the host's thread; loads replace the catalog
//! snapshot wholesale.

use tracing::{debug, error, info, warn};

use crate::api::{BackendApi, HttpFetch, TimeWindow, UreqFetcher};
use crate::catalog::{
    load_channel_set, parse_providers, AllProvidersEnabled, Catalog, EnablementPolicy,
};
use crate::config::{AppConfig, SettingStatus, SettingValue};
use crate::drm::{resolve_drm_property, DrmFormat};
use crate::epg::{self, EpgEntry};
use crate::error::{PvrError, Result};
use crate::gate::{ConnectivityGate, RetryPolicy};
use crate::models::{
    Capabilities, Channel, ChannelGroup, ChannelGroupMember, HostChannel, HostProvider,
    ProviderType, SignalStatus, StreamProperty,
};
use crate::stream::{base_properties, catchup_flags, resolve_catchup_manifest, resolve_manifest_url};

pub const BACKEND_NAME: &str = "Ultimate PVR Backend";
pub const BACKEND_VERSION: &str = "1.0.0";
pub const ADAPTER_NAME: &str = "Ultimate PVR";
pub const ALL_CHANNELS_GROUP: &str = "All Channels";

/// Version of the host application, as reported at startup
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostInfo {
    pub major: u32,
    pub minor: u32,
    pub revision: String,
}

pub struct PvrClient<F = UreqFetcher> {
    config: AppConfig,
    api: BackendApi,
    fetch: F,
    gate: ConnectivityGate,
    drm_format: DrmFormat,
    policy: Box<dyn EnablementPolicy>,
    catalog: Catalog,
}

impl PvrClient<UreqFetcher> {
    /// Adapter talking HTTP to the configured backend
    pub fn new(config: AppConfig, host: &HostInfo) -> Self {
        let fetch = UreqFetcher::new(&config);
        Self::with_fetcher(config, host, fetch)
    }
}

impl<F: HttpFetch> PvrClient<F> {
    pub fn with_fetcher(config: AppConfig, host: &HostInfo, fetch: F) -> Self {
        let drm_format = DrmFormat::for_host_major(host.major);
        info!(
            "Host version: {}.{}.{}, modern DRM: {}",
            host.major,
            host.minor,
            host.revision,
            if drm_format == DrmFormat::Modern { "yes" } else { "no" }
        );
        debug!("Backend URL: {}:{}", config.backend_host, config.backend_port);

        Self {
            api: BackendApi::from_config(&config),
            gate: ConnectivityGate::new(RetryPolicy::from_config(&config)),
            config,
            fetch,
            drm_format,
            policy: Box::new(AllProvidersEnabled),
            catalog: Catalog::new(),
        }
    }

    /// Replace the provider enablement policy
    pub fn with_policy(mut self, policy: impl EnablementPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn fetcher(&self) -> &F {
        &self.fetch
    }

    pub fn drm_format(&self) -> DrmFormat {
        self.drm_format
    }

    pub fn is_backend_available(&self) -> bool {
        self.gate.is_available()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Wait for the backend, then load providers and channels
    pub fn start(&mut self) -> bool {
        info!("Ultimate PVR client starting...");
        let ok = self.refresh("initialization");
        info!(
            "Ultimate PVR client loaded {} channels from {} providers",
            self.catalog.channels().len(),
            self.catalog.providers().len()
        );
        ok
    }

    /// Re-probe the backend and rebuild the catalog
    pub fn reload(&mut self) -> bool {
        self.refresh("reload")
    }

    fn refresh(&mut self, operation: &str) -> bool {
        if !self.gate.probe(&self.fetch, &self.api.providers_url(), operation) {
            self.catalog = Catalog::new();
            return false;
        }

        if let Err(e) = self.load_providers() {
            error!("Failed to load providers: {}", e);
        }
        if let Err(e) = self.load_channels() {
            error!("Failed to load channels: {}", e);
        }
        true
    }

    /// Fetch the provider list. On failure the whole catalog is left empty.
    pub fn load_providers(&mut self) -> Result<usize> {
        let result = self
            .fetch
            .get(&self.api.providers_url())
            .and_then(|body| parse_providers(&body, self.policy.as_ref()));

        match result {
            Ok(list) => {
                let count = list.providers.len();
                self.catalog = self.catalog.with_providers(list);
                info!("Loaded {} providers", count);
                Ok(count)
            }
            Err(e) => {
                // Channels reference providers by name; drop them together
                self.catalog = Catalog::new();
                Err(e)
            }
        }
    }

    /// Fetch channels of every enabled provider. Succeeds iff at least one
    /// channel was loaded.
    pub fn load_channels(&mut self) -> Result<usize> {
        let set = load_channel_set(
            &self.fetch,
            &self.api,
            self.catalog.providers(),
            self.config.offset_scheme,
        );
        let count = set.channels.len();
        self.catalog = self.catalog.with_channels(set);

        info!(
            "Final channel load: {} channels with provider offset {}",
            count,
            if self.catalog.enabled_providers().count() > 1 { "applied" } else { "not applied" }
        );

        if count == 0 {
            return Err(PvrError::EmptyCatalog("channels"));
        }
        Ok(count)
    }

    /// Settings changes; connectivity changes need a fresh adapter
    pub fn set_setting(&mut self, name: &str, value: &SettingValue) -> SettingStatus {
        self.config.apply_setting(name, value)
    }

    fn ensure_backend(&mut self, operation: &str) -> Result<()> {
        if self.gate.is_available() {
            return Ok(());
        }
        if self.gate.probe(&self.fetch, &self.api.providers_url(), operation) {
            Ok(())
        } else {
            Err(PvrError::BackendUnavailable(operation.to_string()))
        }
    }

    // ========================================================================
    // Backend identity
    // ========================================================================

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_epg: true,
            supports_tv: true,
            supports_radio: true,
            supports_recordings: false,
            supports_timers: false,
            supports_channel_groups: true,
            supports_channel_scan: false,
            handles_input_stream: true,
            handles_demuxing: false,
            supports_providers: true,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    pub fn backend_version(&self) -> &'static str {
        BACKEND_VERSION
    }

    pub fn connection_string(&self) -> String {
        format!("{}:{}", self.config.backend_host, self.config.backend_port)
    }

    pub fn signal_status(&self) -> SignalStatus {
        let status = if self.gate.is_available() { "Connected" } else { "Disconnected" };
        SignalStatus {
            adapter_name: ADAPTER_NAME.to_string(),
            adapter_status: status.to_string(),
        }
    }

    // ========================================================================
    // Providers and channels
    // ========================================================================

    pub fn providers_amount(&self) -> usize {
        self.catalog.enabled_providers().count()
    }

    pub fn providers(&self) -> Vec<HostProvider> {
        self.catalog
            .enabled_providers()
            .map(|p| {
                debug!(
                    "Added provider to results: {} (label: {}, UID: {})",
                    p.name, p.label, p.unique_id
                );
                HostProvider {
                    unique_id: p.unique_id,
                    name: p.label.clone(),
                    provider_type: ProviderType::Iptv,
                    icon_path: p.logo.clone().unwrap_or_default(),
                    countries: p.country.iter().filter(|c| !c.is_empty()).cloned().collect(),
                }
            })
            .collect()
    }

    pub fn channels_amount(&self) -> usize {
        self.catalog.channels().len()
    }

    pub fn channels(&self, radio: bool) -> Vec<HostChannel> {
        self.catalog
            .channels()
            .iter()
            .filter(|c| c.is_radio == radio)
            .map(|c| {
                let provider_uid = self.catalog.provider_uid(&c.provider);
                if provider_uid.is_none() {
                    warn!("Provider ID not found for: {}", c.provider);
                }
                HostChannel {
                    unique_id: c.number,
                    is_radio: c.is_radio,
                    channel_number: c.number,
                    channel_name: c.name.clone(),
                    icon_path: c.icon.clone(),
                    is_hidden: false,
                    has_archive: self
                        .catalog
                        .lookup(c.number)
                        .is_some_and(|l| l.catchup_hours > 0),
                    client_provider_uid: provider_uid,
                }
            })
            .collect()
    }

    pub fn channel_groups_amount(&self) -> usize {
        1
    }

    /// A single TV group holding every channel
    pub fn channel_groups(&self, radio: bool) -> Vec<ChannelGroup> {
        if radio {
            return Vec::new();
        }
        vec![ChannelGroup {
            group_name: ALL_CHANNELS_GROUP.to_string(),
            is_radio: false,
        }]
    }

    pub fn channel_group_members(&self, group: &ChannelGroup) -> Vec<ChannelGroupMember> {
        if group.group_name != ALL_CHANNELS_GROUP {
            return Vec::new();
        }
        self.catalog
            .channels()
            .iter()
            .map(|c| ChannelGroupMember {
                group_name: group.group_name.clone(),
                channel_unique_id: c.number,
                channel_number: c.number,
            })
            .collect()
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Stream properties for a live channel
    pub fn channel_stream_properties(&mut self, channel_uid: i32) -> Result<Vec<StreamProperty>> {
        let channel = self
            .catalog
            .channel(channel_uid)
            .cloned()
            .ok_or(PvrError::ChannelNotFound(channel_uid))?;

        info!(
            "Getting stream properties for: {} (Provider: {})",
            channel.name, channel.provider
        );

        self.ensure_backend("stream playback")?;

        let manifest =
            resolve_manifest_url(&self.fetch, &self.api, &channel.provider, &channel.channel_id)?;
        let mut properties = base_properties(&manifest);
        self.push_drm(&channel, &mut properties);
        Ok(properties)
    }

    fn push_drm(&self, channel: &Channel, properties: &mut Vec<StreamProperty>) {
        if !channel.use_cdm {
            return;
        }
        if let Some(prop) = resolve_drm_property(
            &self.fetch,
            &self.api,
            &channel.provider,
            &channel.channel_id,
            self.drm_format,
        ) {
            properties.push(prop);
        }
    }

    // ========================================================================
    // EPG
    // ========================================================================

    /// Guide entries of a channel between `start` and `end`. Never cached.
    pub fn epg_for_channel(&self, channel_uid: i32, start: i64, end: i64) -> Result<Vec<EpgEntry>> {
        let channel = self
            .catalog
            .channel(channel_uid)
            .ok_or(PvrError::ChannelNotFound(channel_uid))?;

        let url = self.api.epg_url(
            &channel.provider,
            &channel.channel_id,
            TimeWindow { start, end },
            self.catalog.country_for(channel),
        );
        let entries = epg::parse_guide(&self.fetch.get(&url)?, channel_uid)?;
        debug!("Loaded {} EPG entries for channel {}", entries.len(), channel_uid);
        Ok(entries)
    }

    /// Recordings are not supported
    pub fn is_epg_tag_recordable(&self, _entry: &EpgEntry) -> bool {
        false
    }

    pub fn is_epg_tag_playable(&self, entry: &EpgEntry) -> bool {
        self.is_epg_tag_playable_at(entry, epg::current_timestamp())
    }

    pub fn is_epg_tag_playable_at(&self, entry: &EpgEntry, now: i64) -> bool {
        self.catalog
            .lookup(entry.channel_uid)
            .is_some_and(|l| epg::is_playable_at(entry, l.catchup_hours, now))
    }

    /// Stream properties for replaying a finished program
    pub fn epg_tag_stream_properties(&mut self, entry: &EpgEntry) -> Result<Vec<StreamProperty>> {
        self.epg_tag_stream_properties_at(entry, epg::current_timestamp())
    }

    pub fn epg_tag_stream_properties_at(
        &mut self,
        entry: &EpgEntry,
        now: i64,
    ) -> Result<Vec<StreamProperty>> {
        // A program whose channel left the catalog cannot be replayed
        let channel = self.catalog.channel(entry.channel_uid).cloned().ok_or_else(|| {
            PvrError::NotEligible(format!("channel {} not in catalog", entry.channel_uid))
        })?;
        let catchup_hours = self
            .catalog
            .lookup(entry.channel_uid)
            .map_or(0, |l| l.catchup_hours);

        epg::check_catchup_window(entry, catchup_hours, now)?;
        self.ensure_backend("catch-up playback")?;

        let manifest = resolve_catchup_manifest(
            &self.fetch,
            &self.api,
            &channel.provider,
            &channel.channel_id,
            TimeWindow {
                start: entry.start,
                end: entry.end,
            },
            entry.broadcast_id,
            self.catalog.country_for(&channel),
        )?;
        info!("Catch-up stream for {} ({}): {}", channel.name, entry.title, manifest);

        let mut properties = base_properties(&manifest);
        properties.extend(catchup_flags());
        self.push_drm(&channel, &mut properties);
        Ok(properties)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
