//! Provider and channel catalog
//!
//! Builds the in-memory snapshot the host queries: providers with their
//! stable IDs, channels with display numbers, and the lookup index used by
//! EPG and stream resolution.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{check_backend_error, parse_json, BackendApi, HttpFetch};
use crate::config::OffsetScheme;
use crate::error::{PvrError, Result};
use crate::models::{Channel, ChannelEntry, ChannelLookup, Provider, ProviderEntry};

/// Number added per provider step once more than one provider is enabled
pub const PROVIDER_OFFSET_UNIT: i32 = 1000;

/// Polynomial string hash, base 33, 32-bit wrapping, absolute value.
///
/// Not collision-free; kept for ID stability across versions.
pub fn hash33(s: &str) -> i32 {
    let h = s
        .bytes()
        .fold(0i32, |h, b| h.wrapping_mul(33).wrapping_add(i32::from(b)));
    h.wrapping_abs()
}

/// Stable provider ID derived from the provider's backend name
pub fn provider_unique_id(name: &str) -> i32 {
    hash33(name)
}

/// Decides whether a provider's channels are loaded and shown
pub trait EnablementPolicy {
    fn is_enabled(&self, provider: &str) -> bool;
}

/// Every provider the backend lists is enabled
#[derive(Debug, Clone, Copy, Default)]
pub struct AllProvidersEnabled;

impl EnablementPolicy for AllProvidersEnabled {
    fn is_enabled(&self, _provider: &str) -> bool {
        true
    }
}

/// Offset for the provider at `position` among `enabled_count` enabled ones
pub fn provider_offset(scheme: OffsetScheme, enabled_count: usize, position: usize) -> i32 {
    if enabled_count <= 1 {
        return 0;
    }
    match scheme {
        OffsetScheme::Flat => PROVIDER_OFFSET_UNIT,
        OffsetScheme::PerPosition => {
            i32::try_from(position).map_or(i32::MAX, |p| p.saturating_mul(PROVIDER_OFFSET_UNIT))
        }
    }
}

/// Running display-number allocator for one load pass
#[derive(Debug, Clone)]
pub struct ChannelNumbering {
    next: i32,
}

impl Default for ChannelNumbering {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl ChannelNumbering {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next number the auto-increment would hand out
    #[cfg(test)]
    pub fn peek(&self) -> i32 {
        self.next
    }

    /// Backend number plus offset when supplied, else the next free number.
    /// The counter always ends up past any number handed out.
    pub fn assign(&mut self, backend_number: Option<i64>, offset: i32) -> i32 {
        match backend_number.and_then(|n| i32::try_from(n).ok()) {
            Some(n) => {
                let number = n.saturating_add(offset);
                if number >= self.next {
                    self.next = number.saturating_add(1);
                }
                number
            }
            None => {
                let number = self.next;
                self.next = self.next.saturating_add(1);
                number
            }
        }
    }
}

/// Result of a provider listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderList {
    pub providers: Vec<Provider>,
    pub default_country: Option<String>,
}

/// Parse a `/api/providers` body
pub fn parse_providers(body: &str, policy: &dyn EnablementPolicy) -> Result<ProviderList> {
    let doc = parse_json(body)?;
    check_backend_error(&doc)?;

    let entries = doc
        .get("providers")
        .and_then(Value::as_array)
        .ok_or_else(|| PvrError::missing("providers", "providers"))?;

    let mut providers = Vec::with_capacity(entries.len());
    for raw in entries {
        let provider = match serde_json::from_value::<ProviderEntry>(raw.clone()) {
            Ok(ProviderEntry::Object(obj)) => {
                let label = obj
                    .label
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| obj.name.clone());
                Provider {
                    enabled: policy.is_enabled(&obj.name),
                    unique_id: provider_unique_id(&obj.name),
                    label,
                    country: obj.country,
                    logo: obj.logo,
                    name: obj.name,
                }
            }
            Ok(ProviderEntry::Name(name)) => {
                debug!("Found provider (legacy format): {}", name);
                Provider {
                    enabled: policy.is_enabled(&name),
                    unique_id: provider_unique_id(&name),
                    label: name.clone(),
                    country: None,
                    logo: None,
                    name,
                }
            }
            Err(_) => {
                warn!("Skipping malformed provider entry: {}", raw);
                continue;
            }
        };

        debug!(
            "Found provider: {} (label: {}, country: {}, enabled: {}, UID: {})",
            provider.name,
            provider.label,
            provider.country.as_deref().unwrap_or(""),
            provider.enabled,
            provider.unique_id
        );
        providers.push(provider);
    }

    let default_country = doc
        .get("default_country")
        .and_then(Value::as_str)
        .map(str::to_string);
    if let Some(ref country) = default_country {
        debug!("Default country from backend: {}", country);
    }

    Ok(ProviderList {
        providers,
        default_country,
    })
}

/// Parse a `/api/providers/{p}/channels` body
pub fn parse_channels(body: &str) -> Result<Vec<ChannelEntry>> {
    let doc = parse_json(body)?;
    check_backend_error(&doc)?;

    let entries = doc
        .get("channels")
        .and_then(Value::as_array)
        .ok_or_else(|| PvrError::missing("channels", "channels"))?;

    Ok(entries
        .iter()
        .filter_map(|raw| match serde_json::from_value::<ChannelEntry>(raw.clone()) {
            Ok(entry) => Some(entry),
            Err(_) => {
                warn!("Skipping malformed channel entry: {}", raw);
                None
            }
        })
        .collect())
}

/// Channels plus their lookup index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelSet {
    pub channels: Vec<Channel>,
    pub lookup: BTreeMap<i32, ChannelLookup>,
}

impl ChannelSet {
    /// Number and record every entry of one provider
    pub fn add_provider_channels(
        &mut self,
        provider: &str,
        entries: &[ChannelEntry],
        offset: i32,
        numbering: &mut ChannelNumbering,
    ) {
        for entry in entries {
            let number = numbering.assign(entry.channel_number, offset);
            let channel = Channel::from_entry(provider, entry, number);

            debug!(
                "Loaded channel: {} (Backend#: {}, Display#: {}, Provider: {})",
                channel.name,
                entry.channel_number.unwrap_or(0),
                channel.number,
                channel.provider
            );

            // First channel keeps a colliding number, like the list search does
            self.lookup.entry(number).or_insert_with(|| ChannelLookup {
                provider: provider.to_string(),
                channel_id: channel.channel_id.clone(),
                catchup_hours: entry.catchup_hours.unwrap_or(0),
            });
            self.channels.push(channel);
        }
    }
}

/// Fetch and number the channels of every enabled provider, in list order.
/// A provider that fails is logged and skipped.
pub fn load_channel_set<F: HttpFetch + ?Sized>(
    fetch: &F,
    api: &BackendApi,
    providers: &[Provider],
    scheme: OffsetScheme,
) -> ChannelSet {
    let enabled: Vec<&Provider> = providers.iter().filter(|p| p.enabled).collect();
    let mut set = ChannelSet::default();
    let mut numbering = ChannelNumbering::new();

    for (position, provider) in enabled.iter().enumerate() {
        let offset = provider_offset(scheme, enabled.len(), position);
        debug!("Provider offset for {}: {}", provider.name, offset);

        let entries = fetch
            .get(&api.channels_url(&provider.name))
            .and_then(|body| parse_channels(&body));

        match entries {
            Ok(entries) => {
                set.add_provider_channels(&provider.name, &entries, offset, &mut numbering);
                info!(
                    "Loaded {} channels from provider {} (offset: {})",
                    entries.len(),
                    provider.name,
                    offset
                );
            }
            Err(e) => warn!("Failed to load channels for provider {}: {}", provider.name, e),
        }
    }

    set
}

/// Immutable catalog snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    providers: Vec<Provider>,
    provider_ids: HashMap<String, i32>,
    default_country: Option<String>,
    channels: Vec<Channel>,
    lookup: BTreeMap<i32, ChannelLookup>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same channels, new provider list. The ID map is rebuilt from the
    /// stored IDs, never recomputed.
    pub fn with_providers(&self, list: ProviderList) -> Self {
        let provider_ids = list
            .providers
            .iter()
            .map(|p| (p.name.clone(), p.unique_id))
            .collect();
        Self {
            providers: list.providers,
            provider_ids,
            default_country: list.default_country,
            channels: self.channels.clone(),
            lookup: self.lookup.clone(),
        }
    }

    /// Same providers, new channel set
    pub fn with_channels(&self, set: ChannelSet) -> Self {
        Self {
            providers: self.providers.clone(),
            provider_ids: self.provider_ids.clone(),
            default_country: self.default_country.clone(),
            channels: set.channels,
            lookup: set.lookup,
        }
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn enabled_providers(&self) -> impl Iterator<Item = &Provider> {
        self.providers.iter().filter(|p| p.enabled)
    }

    pub fn provider(&self, name: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.name == name)
    }

    pub fn provider_uid(&self, name: &str) -> Option<i32> {
        self.provider_ids.get(name).copied()
    }

    pub fn default_country(&self) -> Option<&str> {
        self.default_country.as_deref()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, number: i32) -> Option<&Channel> {
        self.channels.iter().find(|c| c.number == number)
    }

    pub fn lookup(&self, number: i32) -> Option<&ChannelLookup> {
        self.lookup.get(&number)
    }

    /// Country to pass with guide and catch-up requests for a channel
    pub fn country_for<'a>(&'a self, channel: &'a Channel) -> Option<&'a str> {
        if !channel.country.is_empty() {
            return Some(&channel.country);
        }
        self.provider(&channel.provider)
            .and_then(|p| p.country.as_deref())
            .filter(|c| !c.is_empty())
            .or_else(|| self.default_country())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFetcher, BASE_URL};

    struct Only(&'static str);

    impl EnablementPolicy for Only {
        fn is_enabled(&self, provider: &str) -> bool {
            provider == self.0
        }
    }

    fn entry(number: Option<i64>) -> ChannelEntry {
        ChannelEntry {
            id: Some(format!("id{}", number.unwrap_or(-1))),
            channel_number: number,
            ..Default::default()
        }
    }

    #[test]
    fn test_hash_literal_names() {
        assert_eq!(provider_unique_id("abc"), 108966);
        assert_eq!(provider_unique_id(""), 0);
        assert_eq!(provider_unique_id("a"), 97);
        assert_eq!(provider_unique_id("zattoo"), provider_unique_id("zattoo"));
    }

    #[test]
    fn test_hash_wraps_and_takes_absolute_value() {
        assert_eq!(provider_unique_id("zattoo"), 598883777);
        // Wrapped to -1336843107 before the absolute value
        assert_eq!(provider_unique_id("magenta"), 1336843107);
        assert_eq!(provider_unique_id("samsung_tv_plus"), 885429526);
    }

    #[test]
    fn test_offset_by_enabled_count() {
        assert_eq!(provider_offset(OffsetScheme::Flat, 1, 0), 0);
        assert_eq!(provider_offset(OffsetScheme::Flat, 2, 0), 1000);
        assert_eq!(provider_offset(OffsetScheme::Flat, 2, 1), 1000);
        assert_eq!(provider_offset(OffsetScheme::Flat, 3, 2), 1000);

        assert_eq!(provider_offset(OffsetScheme::PerPosition, 1, 0), 0);
        assert_eq!(provider_offset(OffsetScheme::PerPosition, 2, 0), 0);
        assert_eq!(provider_offset(OffsetScheme::PerPosition, 2, 1), 1000);
        assert_eq!(provider_offset(OffsetScheme::PerPosition, 3, 2), 2000);
    }

    #[test]
    fn test_auto_numbers_skip_backend_numbers() {
        let mut numbering = ChannelNumbering::new();
        assert_eq!(numbering.assign(None, 0), 1);
        assert_eq!(numbering.assign(Some(5), 0), 5);
        assert_eq!(numbering.assign(None, 0), 6);
        // Lower backend number does not pull the counter back
        assert_eq!(numbering.assign(Some(2), 0), 2);
        assert_eq!(numbering.assign(None, 0), 7);
        assert_eq!(numbering.assign(Some(10), 1000), 1010);
        assert_eq!(numbering.peek(), 1011);
    }

    #[test]
    fn test_auto_numbers_strictly_increase_and_never_collide() {
        let mut numbering = ChannelNumbering::new();
        let inputs = [None, Some(3), None, None, Some(4), Some(1), None, Some(20), None];
        let mut explicit = Vec::new();
        let mut auto = Vec::new();

        for input in inputs {
            let n = numbering.assign(input, 0);
            match input {
                Some(_) => explicit.push(n),
                None => {
                    assert!(!explicit.contains(&n), "auto number {} collided", n);
                    auto.push(n);
                }
            }
        }
        assert!(auto.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(auto, vec![1, 4, 5, 6, 21]);
    }

    #[test]
    fn test_out_of_range_backend_number_falls_back() {
        let mut numbering = ChannelNumbering::new();
        assert_eq!(numbering.assign(Some(i64::MAX), 0), 1);
    }

    #[test]
    fn test_parse_providers_both_shapes() {
        let body = r#"{
            "providers": [
                {"name": "zattoo", "label": "Zattoo DE", "country": "de", "logo": "http://l/z.png"},
                {"name": "joyn", "label": ""},
                "magenta",
                {"label": "no name"},
                17
            ],
            "default_country": "at"
        }"#;

        let list = parse_providers(body, &AllProvidersEnabled).unwrap();
        let names: Vec<_> = list.providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["zattoo", "joyn", "magenta"]);
        assert_eq!(list.providers[0].label, "Zattoo DE");
        assert_eq!(list.providers[0].country.as_deref(), Some("de"));
        assert_eq!(list.providers[1].label, "joyn");
        assert_eq!(list.providers[2].label, "magenta");
        assert_eq!(list.providers[2].unique_id, provider_unique_id("magenta"));
        assert!(list.providers.iter().all(|p| p.enabled));
        assert_eq!(list.default_country.as_deref(), Some("at"));
    }

    #[test]
    fn test_parse_providers_failures() {
        assert!(matches!(
            parse_providers("not json", &AllProvidersEnabled),
            Err(PvrError::Json(_))
        ));
        assert!(matches!(
            parse_providers(r#"{"items": []}"#, &AllProvidersEnabled),
            Err(PvrError::MissingField { field: "providers", .. })
        ));
        assert!(matches!(
            parse_providers(r#"{"providers": "zattoo"}"#, &AllProvidersEnabled),
            Err(PvrError::MissingField { .. })
        ));
    }

    #[test]
    fn test_policy_controls_enablement() {
        let body = r#"{"providers": ["zattoo", "joyn"]}"#;
        let list = parse_providers(body, &Only("joyn")).unwrap();
        assert!(!list.providers[0].enabled);
        assert!(list.providers[1].enabled);
    }

    #[test]
    fn test_lookup_carries_catchup_hours() {
        let entries = parse_channels(
            r#"{"channels": [
                {"Name": "ARD", "Id": "ard", "ChannelNumber": 1, "CatchupHours": 168},
                {"Name": "ZDF", "Id": "zdf"}
            ]}"#,
        )
        .unwrap();

        let mut set = ChannelSet::default();
        let mut numbering = ChannelNumbering::new();
        set.add_provider_channels("zattoo", &entries, 0, &mut numbering);

        assert_eq!(set.lookup[&1].catchup_hours, 168);
        assert_eq!(set.lookup[&2].channel_id, "zdf");
        assert_eq!(set.lookup[&2].catchup_hours, 0);
    }

    #[test]
    fn test_colliding_number_keeps_first_lookup() {
        let entries = vec![entry(Some(3)), entry(Some(3))];
        let mut set = ChannelSet::default();
        set.add_provider_channels("p", &entries, 0, &mut ChannelNumbering::new());
        assert_eq!(set.channels.len(), 2);
        assert_eq!(set.lookup.len(), 1);
        assert_eq!(set.lookup[&3].channel_id, "id3");
    }

    fn providers(names: &[&str]) -> Vec<Provider> {
        names
            .iter()
            .map(|n| Provider {
                name: n.to_string(),
                label: n.to_string(),
                country: None,
                logo: None,
                enabled: true,
                unique_id: provider_unique_id(n),
            })
            .collect()
    }

    fn one_channel(number: i64) -> String {
        format!(r#"{{"channels":[{{"Name":"C","Id":"c","ChannelNumber":{}}}]}}"#, number)
    }

    #[test]
    fn test_offsets_for_one_two_three_providers() {
        let api = BackendApi::new(BASE_URL);
        let fetch = MockFetcher::new()
            .with("/api/providers/a/channels", &one_channel(5))
            .with("/api/providers/b/channels", &one_channel(5))
            .with("/api/providers/c/channels", &one_channel(5));

        let numbers = |names: &[&str], scheme| -> Vec<i32> {
            load_channel_set(&fetch, &api, &providers(names), scheme)
                .channels
                .iter()
                .map(|c| c.number)
                .collect()
        };

        assert_eq!(numbers(&["a"], OffsetScheme::Flat), vec![5]);
        assert_eq!(numbers(&["a", "b"], OffsetScheme::Flat), vec![1005, 1005]);
        assert_eq!(numbers(&["a", "b", "c"], OffsetScheme::Flat), vec![1005, 1005, 1005]);

        assert_eq!(numbers(&["a"], OffsetScheme::PerPosition), vec![5]);
        assert_eq!(numbers(&["a", "b"], OffsetScheme::PerPosition), vec![5, 1005]);
        assert_eq!(
            numbers(&["a", "b", "c"], OffsetScheme::PerPosition),
            vec![5, 1005, 2005]
        );
    }

    #[test]
    fn test_failed_provider_is_skipped() {
        let api = BackendApi::new(BASE_URL);
        let fetch = MockFetcher::new()
            .with("/api/providers/a/channels", r#"{"error":"login failed"}"#)
            .with("/api/providers/b/channels", &one_channel(7));

        let set = load_channel_set(&fetch, &api, &providers(&["a", "x", "b"]), OffsetScheme::Flat);
        assert_eq!(set.channels.len(), 1);
        assert_eq!(set.channels[0].provider, "b");
        assert_eq!(set.channels[0].number, 1007);
    }

    #[test]
    fn test_disabled_providers_are_not_fetched() {
        let api = BackendApi::new(BASE_URL);
        let fetch = MockFetcher::new().with("/api/providers/a/channels", &one_channel(5));
        let mut list = providers(&["a", "b"]);
        list[1].enabled = false;

        let set = load_channel_set(&fetch, &api, &list, OffsetScheme::Flat);
        assert_eq!(set.channels[0].number, 5);
        assert_eq!(fetch.count("/api/providers/b/channels"), 0);
    }

    #[test]
    fn test_country_fallback_chain() {
        let mut list = providers(&["a", "b"]);
        list[0].country = Some("ch".to_string());
        let catalog = Catalog::new().with_providers(ProviderList {
            providers: list,
            default_country: Some("de".to_string()),
        });

        let mut channel = Channel::from_entry("a", &entry(Some(1)), 1);
        assert_eq!(catalog.country_for(&channel), Some("ch"));
        channel.country = "fr".to_string();
        assert_eq!(catalog.country_for(&channel), Some("fr"));

        let other = Channel::from_entry("b", &entry(Some(2)), 2);
        assert_eq!(catalog.country_for(&other), Some("de"));
    }
}
