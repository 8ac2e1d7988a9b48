//! EPG (Electronic Program Guide) module
//!
//! Guide parsing for the backend's per-channel `/epg` endpoint and the
//! catch-up playability rules.

mod catchup;
mod parser;

// Re-export public types
pub use catchup::{check_catchup_window, current_timestamp, is_playable_at};
pub use parser::{broadcast_id, parse_guide, EpgEntry, LIST_SEPARATOR};

/// Default guide span requested when the host does not give one
pub const DEFAULT_GUIDE_HOURS: i64 = 24;

/// Format a Unix timestamp as UTC calendar date YYYY-MM-DD
pub fn format_date(ts: i64) -> Option<String> {
    use chrono::{TimeZone, Utc};

    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
}

/// Format a Unix timestamp as local datetime YYYY-MM-DD HH:MM
pub fn format_datetime(ts: i64) -> String {
    use chrono::{Local, TimeZone};

    match Local.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => ts.to_string(),
    }
}
