//! Ultimate PVR - PVR client adapter
//! Exposes an IPTV backend's providers, channels, guide, catch-up and DRM
//! data to a media-center host.

pub mod api;
pub mod catalog;
pub mod client;
pub mod config;
pub mod drm;
pub mod epg;
pub mod error;
pub mod gate;
pub mod models;
pub mod stream;

#[cfg(test)]
mod testing;

pub use api::{BackendApi, HttpFetch, TimeWindow, UreqFetcher};
pub use catalog::{AllProvidersEnabled, Catalog, EnablementPolicy};
pub use client::{HostInfo, PvrClient};
pub use config::{AppConfig, OffsetScheme, SettingStatus, SettingValue};
pub use drm::DrmFormat;
pub use epg::EpgEntry;
pub use error::{HostStatus, PvrError, Result};
pub use models::StreamProperty;
