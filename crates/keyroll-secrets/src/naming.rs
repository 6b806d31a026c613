//! Key id and storage name conventions
//!
//! Key ids produced by rotation look like `ns-<namespace>-<yyyyMMddHHmmssfff>`
//! (UTC). The secret store holds each key under `<prefix><id>` and tags it with
//! the namespace so a namespace can be enumerated.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use keyroll_core::KeyringConfig;
use tracing::warn;

/// Width of the timestamp suffix in a generated key id
const TIMESTAMP_LEN: usize = 17;

/// Naming rules for one namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNaming {
    namespace: String,
    prefix: String,
    tag: String,
    index_key: String,
}

impl KeyNaming {
    pub fn new(
        namespace: impl Into<String>,
        prefix: impl Into<String>,
        tag: impl Into<String>,
        index_key: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            prefix: prefix.into(),
            tag: tag.into(),
            index_key: index_key.into(),
        }
    }

    pub fn from_config(config: &KeyringConfig) -> Self {
        Self::new(
            config.namespace.clone(),
            config.secret_prefix.clone(),
            config.namespace_tag.clone(),
            config.index_key(),
        )
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Tag name carrying the namespace on stored records
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Shared index key for this namespace
    pub fn index_key(&self) -> &str {
        &self.index_key
    }

    /// Storage-level secret name for a key id
    pub fn storage_name(&self, key_id: &str) -> String {
        format!("{}{}", self.prefix, key_id)
    }

    /// Key id for a storage-level secret name
    pub fn key_id_from_storage<'a>(&self, name: &'a str) -> &'a str {
        name.strip_prefix(self.prefix.as_str()).unwrap_or(name)
    }

    /// New key id stamped with the given time
    pub fn new_key_id(&self, now: DateTime<Utc>) -> String {
        format!(
            "ns-{}-{}{:03}",
            self.namespace,
            now.format("%Y%m%d%H%M%S"),
            now.timestamp_subsec_millis()
        )
    }
}

/// Oldest representable timestamp; never wins active-key selection
pub fn oldest_timestamp() -> DateTime<Utc> {
    DateTime::<Utc>::MIN_UTC
}

/// Recover the creation time embedded in a key id
///
/// Only ids with at least three `-`-separated parts whose last part is a
/// 17-digit `yyyyMMddHHmmssfff` stamp are parsed; anything else maps to
/// [`oldest_timestamp`].
pub fn timestamp_from_key_id(key_id: &str) -> DateTime<Utc> {
    let parts: Vec<&str> = key_id.split('-').collect();
    if parts.len() <= 2 {
        return oldest_timestamp();
    }

    let suffix = parts[parts.len() - 1];
    match parse_suffix(suffix) {
        Some(ts) => ts,
        None => {
            warn!("Key id '{}' has no parsable timestamp suffix", key_id);
            oldest_timestamp()
        }
    }
}

fn parse_suffix(suffix: &str) -> Option<DateTime<Utc>> {
    if suffix.len() != TIMESTAMP_LEN || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let field = |range: std::ops::Range<usize>| suffix[range].parse::<u32>().ok();
    let year = suffix[0..4].parse::<i32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(4..6)?, field(6..8)?)?;
    let time: NaiveDateTime =
        date.and_hms_milli_opt(field(8..10)?, field(10..12)?, field(12..14)?, field(14..17)?)?;

    Some(time.and_utc())
}
