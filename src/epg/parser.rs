//! Guide data parser
//! Turns the backend's `/epg` JSON into host-ready entries

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{check_backend_error, parse_json};
use crate::catalog::hash33;
use crate::error::{PvrError, Result};
use crate::models::{lenient_i64, lenient_string};

use super::format_date;

/// Separator for list fields (cast, directors, writers)
pub const LIST_SEPARATOR: &str = ",";

/// A single guide entry
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EpgEntry {
    /// Synthetic ID, hash of channel and time slot
    pub broadcast_id: u32,
    /// Display number of the channel this entry belongs to
    pub channel_uid: i32,
    pub title: String,
    /// Start time as Unix timestamp (UTC)
    pub start: i64,
    /// End time as Unix timestamp (UTC)
    pub end: i64,
    pub plot: Option<String>,
    pub plot_outline: Option<String>,
    pub icon: Option<String>,
    pub genre: Option<String>,
    pub parental_rating: Option<i64>,
    pub episode_number: Option<i64>,
    pub season_number: Option<i64>,
    pub episode_name: Option<String>,
    pub cast: Option<String>,
    pub directors: Option<String>,
    pub writers: Option<String>,
    pub year: Option<i64>,
    /// `YYYY-MM-DD`
    pub first_aired: Option<String>,
}

/// Broadcast ID for a channel's time slot
pub fn broadcast_id(channel_uid: i32, start: i64, end: i64) -> u32 {
    hash33(&format!("{}:{}:{}", channel_uid, start, end)) as u32
}

/// Epoch seconds as a number or a numeric string
fn lenient_timestamp<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<i64>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.and_then(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

/// List of names, or a single name, joined with `LIST_SEPARATOR`
fn lenient_list<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    let joined = match v {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR),
        Some(Value::String(s)) => s,
        _ => return Ok(None),
    };
    Ok(Some(joined).filter(|s| !s.is_empty()))
}

#[derive(Debug, Deserialize)]
struct GuideItem {
    #[serde(default, deserialize_with = "lenient_timestamp")]
    start: Option<i64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    end: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    plot: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    icon: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    genre: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    parental_rating: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    episode_number: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    season_number: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    episode_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    cast: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    directors: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    writers: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    year: Option<i64>,
    #[serde(default)]
    first_aired: Option<Value>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

impl GuideItem {
    fn into_entry(self, channel_uid: i32) -> Option<EpgEntry> {
        let (start, end) = (self.start?, self.end?);

        // `plot` wins; `description` becomes the outline when both are present
        let (plot, plot_outline) = match (non_empty(self.plot), non_empty(self.description)) {
            (Some(plot), description) => (Some(plot), description),
            (None, description) => (description, None),
        };

        let first_aired = match self.first_aired {
            Some(Value::Number(n)) => n.as_i64().and_then(format_date),
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        };

        Some(EpgEntry {
            broadcast_id: broadcast_id(channel_uid, start, end),
            channel_uid,
            title: self.title.unwrap_or_default(),
            start,
            end,
            plot,
            plot_outline,
            icon: non_empty(self.icon),
            genre: non_empty(self.genre),
            parental_rating: self.parental_rating,
            episode_number: self.episode_number,
            season_number: self.season_number,
            episode_name: non_empty(self.episode_name),
            cast: self.cast,
            directors: self.directors,
            writers: self.writers,
            year: self.year.filter(|y| *y > 0),
            first_aired,
        })
    }
}

/// Parse an `/epg` body for the channel with display number `channel_uid`.
/// Entries without a usable start or end are skipped.
pub fn parse_guide(body: &str, channel_uid: i32) -> Result<Vec<EpgEntry>> {
    let doc = parse_json(body)?;
    check_backend_error(&doc)?;

    let items = doc
        .get("epg")
        .and_then(Value::as_array)
        .ok_or_else(|| PvrError::missing("epg", "epg"))?;

    let mut entries = Vec::with_capacity(items.len());
    for raw in items {
        let item: GuideItem = match serde_json::from_value(raw.clone()) {
            Ok(item) => item,
            Err(e) => {
                warn!("Skipping malformed EPG entry: {}", e);
                continue;
            }
        };
        match item.into_entry(channel_uid) {
            Some(entry) => entries.push(entry),
            None => debug!("Skipping EPG entry without start/end for channel {}", channel_uid),
        }
    }

    entries.sort_by_key(|e| e.start);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_entry() {
        let body = r#"{"epg": [{
            "start": 1700000000, "end": 1700003600,
            "title": "Tatort", "plot": "Ein Mord.", "description": "Krimi",
            "icon": "http://i/t.jpg", "genre": "Crime", "parental_rating": 12,
            "episode_number": 5, "season_number": 2, "episode_name": "Folge 5",
            "cast": ["A", "B", ""], "directors": ["D"], "writers": "W",
            "year": 2023, "first_aired": 1699920000
        }]}"#;

        let entries = parse_guide(body, 1005).unwrap();
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.channel_uid, 1005);
        assert_eq!(e.title, "Tatort");
        assert_eq!(e.plot.as_deref(), Some("Ein Mord."));
        assert_eq!(e.plot_outline.as_deref(), Some("Krimi"));
        assert_eq!(e.cast.as_deref(), Some("A,B"));
        assert_eq!(e.directors.as_deref(), Some("D"));
        assert_eq!(e.writers.as_deref(), Some("W"));
        assert_eq!(e.year, Some(2023));
        assert_eq!(e.first_aired.as_deref(), Some("2023-11-14"));
        assert_eq!(e.broadcast_id, broadcast_id(1005, 1700000000, 1700003600));
    }

    #[test]
    fn test_description_becomes_plot_when_alone() {
        let body = r#"{"epg": [{"start": 10, "end": 20, "description": "Nachrichten"}]}"#;
        let e = &parse_guide(body, 1).unwrap()[0];
        assert_eq!(e.plot.as_deref(), Some("Nachrichten"));
        assert_eq!(e.plot_outline, None);
        assert_eq!(e.title, "");
    }

    #[test]
    fn test_entries_without_times_are_skipped_and_sorted() {
        let body = r#"{"epg": [
            {"start": 300, "end": 400, "title": "late"},
            {"title": "no times"},
            {"start": "100", "end": "200", "title": "early"},
            "garbage"
        ]}"#;
        let entries = parse_guide(body, 1).unwrap();
        let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["early", "late"]);
    }

    #[test]
    fn test_error_and_missing_collection() {
        assert!(matches!(
            parse_guide(r#"{"error": "no guide"}"#, 1),
            Err(PvrError::Backend(_))
        ));
        assert!(matches!(
            parse_guide(r#"{"programs": []}"#, 1),
            Err(PvrError::MissingField { field: "epg", .. })
        ));
    }

    #[test]
    fn test_broadcast_id_depends_on_slot() {
        assert_eq!(broadcast_id(1, 100, 200), broadcast_id(1, 100, 200));
        assert_ne!(broadcast_id(1, 100, 200), broadcast_id(2, 100, 200));
        assert_ne!(broadcast_id(1, 100, 200), broadcast_id(1, 100, 300));
    }
}
