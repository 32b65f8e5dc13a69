//! Core data types used by the storage read path
//!
//! # Key Types
//!
//! - **`Tag`**: A single key/value pair attached to a series
//! - **`Tags`**: Ordered, unique-keyed tag set identifying a series
//! - **`SeriesKey`**: Measurement name plus tag set
//! - **`ShardId`**: Identifier for a shard (time-partitioned slice of data)
//!
//! Names, keys and values are byte strings (`Bytes`), so cloning a tag set
//! bumps reference counts instead of copying string data.
//!
//! # Example
//!
//! ```rust
//! use kuba_storage_read::types::{SeriesKey, Tags};
//!
//! let mut tags = Tags::new();
//! tags.set("region", "us-east");
//! tags.set("host", "server01");
//! assert_eq!(tags.get(b"host"), Some(&b"server01"[..]));
//!
//! let key = SeriesKey::new("cpu", tags);
//! assert_eq!(key.to_string(), "cpu,host=server01,region=us-east");
//! ```

use bytes::Bytes;
use std::fmt;

/// Unique identifier for a shard
pub type ShardId = u64;

/// Tag key used to expose the measurement name as a synthetic tag
pub const MEASUREMENT_TAG_KEY: &[u8] = b"_measurement";

/// Tag key used to expose the field key as a synthetic tag
pub const FIELD_TAG_KEY: &[u8] = b"_field";

/// A single tag key/value pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    /// Tag key
    pub key: Bytes,
    /// Tag value
    pub value: Bytes,
}

impl Tag {
    /// Create a new tag
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Tag set sorted by key with no duplicate keys
///
/// Kept as a sorted vector: series carry a handful of tags, and a contiguous
/// buffer can be refilled in place with `clone_from` without reallocating.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tags(Vec<Tag>);

impl Tags {
    /// Create an empty tag set
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Create an empty tag set with room for `capacity` tags
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Build a tag set from pairs; later duplicates replace earlier ones
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Bytes>,
        V: Into<Bytes>,
    {
        let mut tags = Self::new();
        for (k, v) in pairs {
            tags.set(k, v);
        }
        tags
    }

    /// Number of tags
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the tag set is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up the value for `key`
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.0
            .binary_search_by(|t| t.key.as_ref().cmp(key))
            .ok()
            .map(|i| self.0[i].value.as_ref())
    }

    /// Insert or replace the value for `key`, keeping keys sorted
    pub fn set(&mut self, key: impl Into<Bytes>, value: impl Into<Bytes>) {
        let key = key.into();
        let value = value.into();
        match self.0.binary_search_by(|t| t.key.as_ref().cmp(key.as_ref())) {
            Ok(i) => self.0[i].value = value,
            Err(i) => self.0.insert(i, Tag { key, value }),
        }
    }

    /// Iterate tags in key order
    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.0.iter()
    }

    /// Tags as a slice
    pub fn as_slice(&self) -> &[Tag] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a Tags {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, tag) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(
                f,
                "{}={}",
                String::from_utf8_lossy(&tag.key),
                String::from_utf8_lossy(&tag.value)
            )?;
        }
        Ok(())
    }
}

/// A series: measurement name plus tag set
///
/// Ordering is by name, then tags, which is the order the series index
/// yields series in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesKey {
    /// Measurement name
    pub name: Bytes,
    /// Series tags (no synthetic keys)
    pub tags: Tags,
}

impl SeriesKey {
    /// Create a new series key
    pub fn new(name: impl Into<Bytes>, tags: Tags) -> Self {
        Self {
            name: name.into(),
            tags,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.name))?;
        if !self.tags.is_empty() {
            write!(f, ",{}", self.tags)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_sorted_on_insert() {
        let mut tags = Tags::new();
        tags.set("zone", "b");
        tags.set("host", "a");
        tags.set("dc", "c");

        let keys: Vec<&[u8]> = tags.iter().map(|t| t.key.as_ref()).collect();
        assert_eq!(keys, vec![&b"dc"[..], &b"host"[..], &b"zone"[..]]);
    }

    #[test]
    fn test_tags_set_replaces_existing() {
        let mut tags = Tags::from_pairs([("host", "a")]);
        tags.set("host", "b");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get(b"host"), Some(&b"b"[..]));
    }

    #[test]
    fn test_synthetic_keys_sort_with_tags() {
        let mut tags = Tags::from_pairs([("host", "a")]);
        tags.set(MEASUREMENT_TAG_KEY, "cpu");
        tags.set(FIELD_TAG_KEY, "usage_idle");
        assert_eq!(tags.to_string(), "_field=usage_idle,_measurement=cpu,host=a");
    }

    #[test]
    fn test_series_key_ordering() {
        let a = SeriesKey::new("cpu", Tags::from_pairs([("host", "a")]));
        let b = SeriesKey::new("cpu", Tags::from_pairs([("host", "b")]));
        let m = SeriesKey::new("mem", Tags::from_pairs([("host", "a")]));
        assert!(a < b);
        assert!(b < m);
    }

    #[test]
    fn test_missing_tag() {
        let tags = Tags::from_pairs([("host", "a")]);
        assert!(tags.get(b"region").is_none());
    }
}
