//! Field enumeration
//!
//! Builds the measurement -> field key table a series cursor consults for
//! every series. Two sources feed the same normalization:
//!
//! - **metadata**: field keys recorded for a single measurement
//! - **scan**: (measurement, field key) pairs from a field-key scan over all
//!   matching measurements
//!
//! Either way every list ends up sorted ascending by name with no
//! duplicates, and each retained name gets its byte form computed once.

use crate::engine::traits::{KeyIterator, ScanIterator, ShardGroup};
use crate::query::error::{CursorError, CursorResult};
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A field key with its cached byte form
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    name: Arc<str>,
    bytes: Bytes,
}

impl FieldKey {
    /// Create a field key
    pub fn new(name: impl Into<String>) -> Self {
        let name: String = name.into();
        let bytes = Bytes::copy_from_slice(name.as_bytes());
        Self {
            name: Arc::from(name),
            bytes,
        }
    }

    /// Field name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field name as bytes
    #[inline]
    pub fn as_bytes(&self) -> &Bytes {
        &self.bytes
    }
}

impl fmt::Debug for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldKey({})", self.name)
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Sorted, deduplicated field keys per measurement
///
/// Lists are shared (`Arc`) so a cursor can hold the current series' list
/// while still reading the table.
#[derive(Debug, Clone, Default)]
pub struct MeasurementFields {
    fields: HashMap<Bytes, Arc<[FieldKey]>>,
}

impl MeasurementFields {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from unordered (measurement, field name) pairs
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Bytes, String)>) -> Self {
        let mut grouped: HashMap<Bytes, Vec<String>> = HashMap::new();
        for (measurement, name) in pairs {
            grouped.entry(measurement).or_default().push(name);
        }

        let mut table = Self::new();
        for (measurement, names) in grouped {
            table.insert(measurement, names);
        }
        table
    }

    /// Insert the field list for `measurement`; sorts and deduplicates
    /// `names`. An empty list is not recorded.
    pub fn insert(&mut self, measurement: Bytes, names: Vec<String>) {
        let keys = sorted_field_keys(names);
        if !keys.is_empty() {
            self.fields.insert(measurement, keys.into());
        }
    }

    /// Field list for `measurement`
    pub fn get(&self, measurement: &[u8]) -> Option<&Arc<[FieldKey]>> {
        self.fields.get(measurement)
    }

    /// Number of measurements with at least one field
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no measurement has any field
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Total number of (measurement, field) entries
    pub fn field_count(&self) -> usize {
        self.fields.values().map(|f| f.len()).sum()
    }
}

/// Sort `names` ascending, drop adjacent duplicates and cache byte forms
pub fn sorted_field_keys(mut names: Vec<String>) -> Vec<FieldKey> {
    names.sort_unstable();
    names.dedup();
    names.into_iter().map(FieldKey::new).collect()
}

/// Field table for a single measurement from shard metadata
pub fn fields_for_measurement(shards: &dyn ShardGroup, measurement: &str) -> MeasurementFields {
    let mut table = MeasurementFields::new();
    table.insert(
        Bytes::copy_from_slice(measurement.as_bytes()),
        shards.field_keys_by_measurement(measurement.as_bytes()),
    );
    table
}

/// Field table from a field-key scan
///
/// The scan must carry the field-key projection; anything else is an
/// [`IncompatibleProjection`](crate::query::error::CursorErrorKind) error.
/// The scan is closed on every path.
pub fn fields_from_scan(mut scan: ScanIterator) -> CursorResult<MeasurementFields> {
    let result = match &mut scan {
        ScanIterator::FieldKeys(itr) => extract_fields(itr.as_mut()),
        other => Err(CursorError::incompatible_projection(
            "field keys",
            other.projection(),
        )),
    };
    scan.close();
    result
}

fn extract_fields(itr: &mut dyn KeyIterator) -> CursorResult<MeasurementFields> {
    let mut pairs = Vec::new();
    while let Some(point) = itr.next()? {
        pairs.push((point.measurement, point.key));
    }
    Ok(MeasurementFields::from_pairs(pairs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::traits::{KeyPoint, VecKeyIterator};

    fn point(m: &'static str, k: &str) -> KeyPoint {
        KeyPoint {
            measurement: Bytes::from_static(m.as_bytes()),
            key: k.to_string(),
        }
    }

    fn names(list: &[FieldKey]) -> Vec<&str> {
        list.iter().map(|f| f.name()).collect()
    }

    #[test]
    fn test_sorted_field_keys_dedups() {
        let keys = sorted_field_keys(vec![
            "usage_user".to_string(),
            "usage_idle".to_string(),
            "usage_user".to_string(),
        ]);
        assert_eq!(names(&keys), vec!["usage_idle", "usage_user"]);
        assert_eq!(keys[0].as_bytes().as_ref(), b"usage_idle");
    }

    #[test]
    fn test_fields_from_scan_groups_by_measurement() {
        let scan = ScanIterator::FieldKeys(Box::new(VecKeyIterator::new(vec![
            point("cpu", "usage_user"),
            point("mem", "used"),
            point("cpu", "usage_idle"),
            point("cpu", "usage_user"),
        ])));

        let table = fields_from_scan(scan).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(names(table.get(b"cpu").unwrap()), vec!["usage_idle", "usage_user"]);
        assert_eq!(names(table.get(b"mem").unwrap()), vec!["used"]);
        assert_eq!(table.field_count(), 3);
    }

    #[test]
    fn test_fields_from_scan_rejects_other_projection() {
        let scan = ScanIterator::Measurements(Box::new(VecKeyIterator::new(vec![point(
            "cpu", "cpu",
        )])));
        let err = fields_from_scan(scan).unwrap_err();
        assert_eq!(
            err.kind,
            crate::query::error::CursorErrorKind::IncompatibleProjection
        );
    }

    #[test]
    fn test_empty_scan_gives_empty_table() {
        let scan = ScanIterator::FieldKeys(Box::new(VecKeyIterator::default()));
        assert!(fields_from_scan(scan).unwrap().is_empty());
    }

    #[test]
    fn test_insert_skips_empty_list() {
        let mut table = MeasurementFields::new();
        table.insert(Bytes::from_static(b"cpu"), Vec::new());
        assert!(table.is_empty());
        assert!(table.get(b"cpu").is_none());
    }
}
