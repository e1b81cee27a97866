//! Incremental collection cursors.
//!
//! One [`CursorRecord`] per rule tag remembers the newest item seen so the next
//! run can ask the endpoint only for items after it. The whole map is kept in a
//! single JSON document:
//!
//! ```text
//! {
//!   "betway_promotions": {
//!     "newest_id": "1745123456789012345",
//!     "created_at": "2024-01-01T00:00:00.000Z",
//!     "collection_datetime": "2024_01_02_06_00_00"
//!   }
//! }
//! ```

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier of a collected item.
///
/// The endpoint sends IDs as decimal strings, older cursor documents may hold
/// plain integers. The original form is kept when written back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(u64),
    Text(String),
}

impl ItemId {
    pub fn as_str(&self) -> Cow<'_, str> {
        match self {
            Self::Number(n) => Cow::Owned(n.to_string()),
            Self::Text(s) => Cow::Borrowed(s),
        }
    }

    fn numeric(&self) -> Option<u128> {
        match self {
            Self::Number(n) => Some(u128::from(*n)),
            Self::Text(s) => s.parse().ok(),
        }
    }
}

impl Ord for ItemId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => {
                let (a, b) = (self.as_str(), other.as_str());
                a.len().cmp(&b.len()).then_with(|| a.cmp(&b))
            }
        }
    }
}

impl PartialOrd for ItemId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ItemId {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ItemId {}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<u64> for ItemId {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

/// Timestamp of a collection run, second precision.
///
/// Rendered as `YYYY_MM_DD_HH_MM_SS`, both in cursor documents and in output
/// file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RunStamp(DateTime<Utc>);

impl RunStamp {
    const FORMAT: &'static str = "%Y_%m_%d_%H_%M_%S";

    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at.trunc_subsecs(0))
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn parse(s: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(s, Self::FORMAT)
            .ok()
            .map(|naive| Self(naive.and_utc()))
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for RunStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

impl Serialize for RunStamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RunStamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid run timestamp '{s}'")))
    }
}

/// `created_at` as the endpoint writes it: `YYYY-MM-DDTHH:MM:SS.000Z`.
pub mod created_at_format {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(at: &DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid created_at '{s}'")))
    }
}

/// Last position seen for one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorRecord {
    /// Newest item ID, sent back as `since_id`
    pub newest_id: ItemId,

    /// When that newest item was posted
    #[serde(with = "created_at_format")]
    pub created_at: DateTime<Utc>,

    /// Start of the run that wrote this record
    pub collection_datetime: RunStamp,
}

impl CursorRecord {
    /// A cursor is usable while its newest item is no older than `window`.
    ///
    /// Exactly `window` old still counts as fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now.signed_duration_since(self.created_at) <= window
    }
}

/// What [`CursorStoreMap::advance`] did with a candidate record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorUpdate {
    /// First record for the tag
    Created,
    /// Replaced an older record
    Advanced,
    /// Same newest ID as stored; left as is
    Unchanged,
    /// Candidate was older than the stored record; refused
    Refused,
}

impl CursorUpdate {
    pub fn changed(self) -> bool {
        matches!(self, Self::Created | Self::Advanced)
    }
}

/// Rule tag to cursor record, persisted as one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CursorStoreMap {
    records: BTreeMap<String, CursorRecord>,
}

impl CursorStoreMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a cursor document.
    ///
    /// Entries without a `newest_id` (empty objects left by earlier tooling)
    /// are read as "no record". Anything else that does not parse is an error.
    pub fn from_slice(bytes: &[u8]) -> std::result::Result<Self, String> {
        let raw: BTreeMap<String, serde_json::Value> =
            serde_json::from_slice(bytes).map_err(|e| e.to_string())?;

        let mut records = BTreeMap::new();
        for (tag, value) in raw {
            let has_id = value
                .as_object()
                .and_then(|obj| obj.get("newest_id"))
                .is_some_and(|id| !id.is_null());
            if !has_id {
                if !value.is_object() {
                    return Err(format!("entry '{tag}' is not an object"));
                }
                continue;
            }
            let record: CursorRecord =
                serde_json::from_value(value).map_err(|e| format!("entry '{tag}': {e}"))?;
            records.insert(tag, record);
        }
        Ok(Self { records })
    }

    pub fn get(&self, tag: &str) -> Option<&CursorRecord> {
        self.records.get(tag)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CursorRecord)> {
        self.records.iter().map(|(tag, record)| (tag.as_str(), record))
    }

    /// Store `record` for `tag` unless it would move `newest_id` backwards.
    pub fn advance(&mut self, tag: &str, record: CursorRecord) -> CursorUpdate {
        let update = match self.records.get(tag) {
            None => CursorUpdate::Created,
            Some(existing) => match record.newest_id.cmp(&existing.newest_id) {
                Ordering::Greater => CursorUpdate::Advanced,
                Ordering::Equal => CursorUpdate::Unchanged,
                Ordering::Less => CursorUpdate::Refused,
            },
        };
        if update.changed() {
            self.records.insert(tag.to_string(), record);
        }
        update
    }
}
