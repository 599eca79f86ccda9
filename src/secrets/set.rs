//! Secret records returned by DSM and the TTL rule that drives refreshes.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::nullable;

/// Refresh interval used when no record advertises a usable TTL.
pub const DEFAULT_TTL_FLOOR_SECS: i64 = 120;

/// TTL values at or below this bound are ignored.
pub const MIN_ACCEPTED_TTL_SECS: i64 = 10;

/// Conventional data key carrying a secret's remaining validity in seconds.
pub const TTL_KEY: &str = "TTL";

/// A single secret as delivered in `application.secrets[]`.
///
/// `identity` names the directory the secret is materialized into and every
/// key in `data` becomes a file name inside it.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
    #[serde(default, deserialize_with = "nullable")]
    pub secret_id: String,

    #[serde(default, deserialize_with = "nullable")]
    pub secret_name: String,

    #[serde(default, deserialize_with = "nullable")]
    pub identity: String,

    #[serde(default, deserialize_with = "nullable")]
    pub version: String,

    #[serde(default, deserialize_with = "nullable")]
    pub expiration_date: String,

    #[serde(default, deserialize_with = "nullable")]
    pub engine: String,

    /// Ordered sequence of filename to content mappings
    #[serde(default, deserialize_with = "nullable")]
    pub data: Vec<BTreeMap<String, String>>,
}

impl SecretRecord {
    /// Iterate every (filename, content) pair across all data entries.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.data.iter().flat_map(|entry| entry.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Lower the running minimum with this record's TTL entries.
    ///
    /// A value is a candidate only if it parses as an integer and lies in the
    /// open interval (`MIN_ACCEPTED_TTL_SECS`, `current`).
    pub fn min_ttl(&self, current: i64) -> i64 {
        self.entries()
            .filter(|(key, value)| *key == TTL_KEY && !value.is_empty())
            .filter_map(|(_, value)| value.trim().parse::<i64>().ok())
            .fold(current, |min, ttl| if ttl > MIN_ACCEPTED_TTL_SECS && ttl < min { ttl } else { min })
    }

    /// Parsed `expiration_date`, if DSM sent one in a recognised format.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.expiration_date.trim();
        if raw.is_empty() {
            return None;
        }

        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok().map(|dt| dt.and_utc())
            })
    }
}

impl fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.entries().map(|(k, _)| k).collect();
        f.debug_struct("SecretRecord")
            .field("secret_id", &self.secret_id)
            .field("secret_name", &self.secret_name)
            .field("identity", &self.identity)
            .field("version", &self.version)
            .field("expiration_date", &self.expiration_date)
            .field("engine", &self.engine)
            .field("data_keys", &keys)
            .finish()
    }
}

/// The secrets of one application, in the order DSM returned them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretSet(Vec<SecretRecord>);

impl SecretSet {
    pub fn new(records: Vec<SecretRecord>) -> Self {
        Self(records)
    }

    pub fn records(&self) -> &[SecretRecord] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SecretRecord> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Minimum valid TTL across all records, in seconds, starting from the
    /// default floor of 120 seconds.
    pub fn min_ttl_secs(&self) -> i64 {
        self.0.iter().fold(DEFAULT_TTL_FLOOR_SECS, |current, record| record.min_ttl(current))
    }

    /// Next refresh interval derived from [`SecretSet::min_ttl_secs`].
    pub fn min_ttl(&self) -> Duration {
        Duration::from_secs(self.min_ttl_secs().max(0) as u64)
    }

    /// Earliest advertised expiration across all records.
    pub fn earliest_expiration(&self) -> Option<DateTime<Utc>> {
        self.0.iter().filter_map(SecretRecord::expires_at).min()
    }

    /// Flatten every data entry of every record into one map. Later entries
    /// win when keys collide.
    pub fn flatten(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .flat_map(|record| record.entries())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

impl From<Vec<SecretRecord>> for SecretSet {
    fn from(records: Vec<SecretRecord>) -> Self {
        Self(records)
    }
}

impl<'a> IntoIterator for &'a SecretSet {
    type Item = &'a SecretRecord;
    type IntoIter = std::slice::Iter<'a, SecretRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
