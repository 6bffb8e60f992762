//! The normalized metadata value shared by the descriptor loader and the
//! manual create path.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};

/// What a cataloged resource is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResourceKind {
    App,
    Dataset,
    Model,
}

/// Descriptive metadata for a resource, minus identity and audit fields.
///
/// This is a transient value: it is produced by
/// [`crate::descriptor::load_metadata`] or deserialized straight from a
/// manual create request, reconciled into the catalog, and discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub kind: ResourceKind,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Ordered tag list.  A bare string in the source document becomes a
    /// single-element list; absent or null becomes empty.
    #[serde(default, deserialize_with = "tags_from_string_or_seq")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub healthcheck: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Caller-declared content timestamp.  Unparsable values are dropped,
    /// never an error; see [`parse_updated`] for the accepted formats.
    #[serde(default, deserialize_with = "updated_from_string")]
    pub updated: Option<NaiveDateTime>,
}

/// Parse the `updated` field.  Formats are tried in order and the first
/// match wins; date-only values become midnight.  `None` if nothing matches.
pub fn parse_updated(raw: &str) -> Option<NaiveDateTime> {
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    None
}

fn updated_from_string<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_updated))
}

fn tags_from_string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Raw::One(tag)) => vec![tag],
        Some(Raw::Many(tags)) => tags,
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────
