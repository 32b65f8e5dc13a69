//! In-memory shard implementations.
//!
//! These implementations are intended for:
//! - **Unit testing** the series cursor without an on-disk index
//! - **Integration testing** scan ordering, deduplication and cleanup
//! - **Benchmarking** the cursor's per-row hot path
//!
//! # Available Stubs
//!
//! ## In-Memory Shard ([`InMemoryShard`])
//!
//! Holds a set of series and, per measurement, the field keys written to
//! the shard in insertion order.
//!
//! ## In-Memory Shard Group ([`InMemoryShardGroup`])
//!
//! Implements [`ShardGroup`] over several shards. Series are merged,
//! deduplicated and ordered across shards. Field-key scans run once per
//! shard (in parallel with rayon when enabled) and are concatenated in
//! shard order, so a field present in several shards appears several times.
//! Open/close counters in [`ShardGroupStats`] let tests verify that every
//! series iterator is released exactly once.
//!
//! # Warning
//!
//! Nothing here is persisted; the stubs are not suitable for production.
//!
//! # Example
//!
//! ```rust
//! use kuba_storage_read::engine::stubs::{InMemoryShard, InMemoryShardGroup};
//! use kuba_storage_read::types::Tags;
//!
//! let shard = InMemoryShard::new(1);
//! shard.write("cpu", Tags::from_pairs([("host", "a")]), &["usage_idle"]);
//!
//! let group = InMemoryShardGroup::new(vec![shard]);
//! assert_eq!(group.shard_count(), 1);
//! ```

use crate::config::ScanConfig;
use crate::engine::traits::{
    KeyPoint, QueryPlan, ReadContext, ScanIterator, SeriesIterator, ShardGroup, VecKeyIterator,
};
use crate::query::error::CursorResult;
use crate::query::expr::{eval_bool, Expr, Value, Valuer, MEASUREMENT_REF, NAME_REF};
use crate::types::{SeriesKey, ShardId, Tags};
use bytes::Bytes;
use parking_lot::RwLock;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

// =============================================================================
// In-Memory Shard
// =============================================================================

/// A shard holding series and field keys in memory
pub struct InMemoryShard {
    id: ShardId,
    series: RwLock<BTreeSet<SeriesKey>>,
    /// Field keys per measurement, in first-write order
    fields: RwLock<BTreeMap<Bytes, Vec<String>>>,
}

impl InMemoryShard {
    /// Create an empty shard
    pub fn new(id: ShardId) -> Self {
        Self {
            id,
            series: RwLock::new(BTreeSet::new()),
            fields: RwLock::new(BTreeMap::new()),
        }
    }

    /// Shard identifier
    pub fn id(&self) -> ShardId {
        self.id
    }

    /// Record a series and the fields written to it
    pub fn write(&self, measurement: &str, tags: Tags, fields: &[&str]) {
        let name = Bytes::copy_from_slice(measurement.as_bytes());
        self.series.write().insert(SeriesKey::new(name.clone(), tags));

        let mut table = self.fields.write();
        let known = table.entry(name).or_default();
        for field in fields {
            if !known.iter().any(|f| f == field) {
                known.push(field.to_string());
            }
        }
    }

    /// Number of series in the shard
    pub fn series_count(&self) -> usize {
        self.series.read().len()
    }

    fn matching_series(
        &self,
        measurement: Option<&str>,
        condition: Option<&Expr>,
    ) -> Vec<SeriesKey> {
        self.series
            .read()
            .iter()
            .filter(|key| measurement.map_or(true, |m| key.name.as_ref() == m.as_bytes()))
            .filter(|key| condition.map_or(true, |c| eval_bool(c, &SeriesValuer(*key))))
            .cloned()
            .collect()
    }

    fn field_keys(&self, measurement: &[u8]) -> Vec<String> {
        self.fields
            .read()
            .get(measurement)
            .cloned()
            .unwrap_or_default()
    }

    /// (measurement, field) for every measurement with a series matching
    /// `condition`
    fn scan_field_keys(&self, condition: Option<&Expr>) -> Vec<KeyPoint> {
        let series = self.series.read();
        let fields = self.fields.read();

        let mut points = Vec::new();
        for (measurement, keys) in fields.iter() {
            let matched = series
                .iter()
                .filter(|s| s.name == *measurement)
                .any(|s| condition.map_or(true, |c| eval_bool(c, &SeriesValuer(s))));
            if !matched {
                continue;
            }
            points.extend(keys.iter().map(|key| KeyPoint {
                measurement: measurement.clone(),
                key: key.clone(),
            }));
        }
        points
    }
}

/// Resolves measurement and tag names against one series
struct SeriesValuer<'a>(&'a SeriesKey);

impl Valuer for SeriesValuer<'_> {
    fn value(&self, name: &str) -> Option<Value<'_>> {
        let bytes = match name {
            NAME_REF | MEASUREMENT_REF => Some(self.0.name.as_ref()),
            _ => self.0.tags.get(name.as_bytes()),
        }?;
        Some(Value::Str(String::from_utf8_lossy(bytes)))
    }
}

// =============================================================================
// Shard Group
// =============================================================================

/// Resource counters for an [`InMemoryShardGroup`]
#[derive(Debug, Default)]
pub struct ShardGroupStats {
    series_opened: AtomicU64,
    series_closed: AtomicU64,
    field_scans: AtomicU64,
    metadata_lookups: AtomicU64,
}

impl ShardGroupStats {
    /// Series iterators opened
    pub fn series_opened(&self) -> u64 {
        self.series_opened.load(Ordering::Relaxed)
    }

    /// Series iterators closed
    pub fn series_closed(&self) -> u64 {
        self.series_closed.load(Ordering::Relaxed)
    }

    /// Field-key scans run
    pub fn field_scans(&self) -> u64 {
        self.field_scans.load(Ordering::Relaxed)
    }

    /// Single-measurement field metadata lookups
    pub fn metadata_lookups(&self) -> u64 {
        self.metadata_lookups.load(Ordering::Relaxed)
    }
}

/// Shard group over in-memory shards
pub struct InMemoryShardGroup {
    shards: Vec<Arc<InMemoryShard>>,
    config: ScanConfig,
    stats: Arc<ShardGroupStats>,
}

impl InMemoryShardGroup {
    /// Create a group with the default scan configuration
    pub fn new(shards: Vec<InMemoryShard>) -> Self {
        Self::with_config(shards, ScanConfig::default())
    }

    /// Create a group with an explicit scan configuration
    pub fn with_config(shards: Vec<InMemoryShard>, config: ScanConfig) -> Self {
        Self {
            shards: shards.into_iter().map(Arc::new).collect(),
            config,
            stats: Arc::new(ShardGroupStats::default()),
        }
    }

    /// Number of shards
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shared resource counters
    pub fn stats(&self) -> Arc<ShardGroupStats> {
        Arc::clone(&self.stats)
    }

    fn use_parallel_scan(&self) -> bool {
        self.config.parallel_shard_scan && self.shards.len() >= self.config.parallel_threshold
    }
}

impl ShardGroup for InMemoryShardGroup {
    fn create_cursor_iterators(&self, ctx: &ReadContext) -> CursorResult<Option<QueryPlan>> {
        ctx.check()?;
        if self.shards.is_empty() {
            return Ok(None);
        }
        Ok(Some(QueryPlan {
            shard_ids: self.shards.iter().map(|s| s.id()).collect(),
        }))
    }

    fn create_series_iterator(
        &self,
        ctx: &ReadContext,
        measurement: Option<&str>,
        condition: Option<&Expr>,
    ) -> CursorResult<Option<Box<dyn SeriesIterator>>> {
        ctx.check()?;

        let mut merged = BTreeSet::new();
        for shard in &self.shards {
            merged.extend(shard.matching_series(measurement, condition));
        }
        debug!(
            shards = self.shards.len(),
            series = merged.len(),
            measurement = measurement.unwrap_or("*"),
            "Opened in-memory series iterator"
        );

        self.stats.series_opened.fetch_add(1, Ordering::Relaxed);
        Ok(Some(Box::new(InMemorySeriesIterator {
            keys: merged.into_iter().collect(),
            pos: 0,
            ctx: ctx.clone(),
            stats: Arc::clone(&self.stats),
            closed: false,
        })))
    }

    fn field_keys_by_measurement(&self, measurement: &[u8]) -> Vec<String> {
        self.stats.metadata_lookups.fetch_add(1, Ordering::Relaxed);
        self.shards
            .iter()
            .flat_map(|shard| shard.field_keys(measurement))
            .collect()
    }

    fn create_field_key_scan(
        &self,
        ctx: &ReadContext,
        condition: Option<&Expr>,
    ) -> CursorResult<Option<ScanIterator>> {
        ctx.check()?;
        self.stats.field_scans.fetch_add(1, Ordering::Relaxed);

        let per_shard: Vec<Vec<KeyPoint>> = if self.use_parallel_scan() {
            self.shards
                .par_iter()
                .map(|shard| -> CursorResult<Vec<KeyPoint>> {
                    ctx.check()?;
                    Ok(shard.scan_field_keys(condition))
                })
                .collect::<CursorResult<Vec<_>>>()?
        } else {
            self.shards
                .iter()
                .map(|shard| shard.scan_field_keys(condition))
                .collect()
        };

        let points: Vec<KeyPoint> = per_shard.into_iter().flatten().collect();
        Ok(Some(ScanIterator::FieldKeys(Box::new(VecKeyIterator::new(points)))))
    }
}

/// Ordered, deduplicated series from several in-memory shards
struct InMemorySeriesIterator {
    keys: Vec<SeriesKey>,
    pos: usize,
    ctx: ReadContext,
    stats: Arc<ShardGroupStats>,
    closed: bool,
}

impl SeriesIterator for InMemorySeriesIterator {
    fn next(&mut self) -> CursorResult<Option<&SeriesKey>> {
        if self.closed {
            return Ok(None);
        }
        self.ctx.check()?;

        let idx = self.pos;
        self.pos += 1;
        Ok(self.keys.get(idx))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.keys.clear();
            self.stats.series_closed.fetch_add(1, Ordering::Relaxed);
        }
    }
}
