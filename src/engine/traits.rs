//! Collaborator traits for the storage read path
//!
//! The series cursor depends on a shard group for three things: an ordered
//! stream of series matching a tag condition, field-key metadata for a
//! single measurement, and a scan producing (measurement, field key) pairs
//! across every matching measurement.

use crate::query::error::{CursorError, CursorResult};
use crate::query::expr::Expr;
use crate::types::{SeriesKey, ShardId};
use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// =============================================================================
// Read Context
// =============================================================================

/// Per-request context shared with every collaborator
///
/// Carries the cancellation signal. The cursor itself never polls it;
/// collaborators check it and fail promptly once it is set, which the cursor
/// surfaces as a scan or construction error.
#[derive(Debug, Clone, Default)]
pub struct ReadContext {
    cancelled: Arc<AtomicBool>,
}

impl ReadContext {
    /// Create a new, uncancelled context
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to everything holding a clone of this context
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Check whether the request was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Fail with a cancellation error if the request was cancelled
    pub fn check(&self) -> CursorResult<()> {
        if self.is_cancelled() {
            Err(CursorError::cancelled("read request cancelled"))
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// Query Plan
// =============================================================================

/// Handle on the shards a read touches
///
/// Attached to every row so the data reader can open per-shard value
/// iterators for that row's series and field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    /// Shards participating in the read, in scan order
    pub shard_ids: Vec<ShardId>,
}

// =============================================================================
// Series Iteration
// =============================================================================

/// Ordered stream of series produced by the series index
///
/// Owns shard-level resources until `close` is called.
pub trait SeriesIterator: Send {
    /// Next series, `Ok(None)` at the end
    ///
    /// The returned key borrows the iterator's internal state and must be
    /// copied before the next call.
    fn next(&mut self) -> CursorResult<Option<&SeriesKey>>;

    /// Release shard-level resources
    fn close(&mut self);
}

// =============================================================================
// Key Scans
// =============================================================================

/// One output point of a key scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPoint {
    /// Measurement the key belongs to
    pub measurement: Bytes,
    /// Key name (field key, tag key or measurement name)
    pub key: String,
}

/// Iterator over key scan output
pub trait KeyIterator: Send {
    /// Next point, `Ok(None)` at the end
    fn next(&mut self) -> CursorResult<Option<KeyPoint>>;

    /// Release the iterator
    fn close(&mut self);
}

/// Output of a key scan, discriminated by the projection it carries
pub enum ScanIterator {
    /// (measurement, field key) pairs
    FieldKeys(Box<dyn KeyIterator>),
    /// (measurement, tag key) pairs
    TagKeys(Box<dyn KeyIterator>),
    /// (measurement, measurement) pairs
    Measurements(Box<dyn KeyIterator>),
}

impl ScanIterator {
    /// Name of the projection this scan produced
    pub fn projection(&self) -> &'static str {
        match self {
            ScanIterator::FieldKeys(_) => "field keys",
            ScanIterator::TagKeys(_) => "tag keys",
            ScanIterator::Measurements(_) => "measurements",
        }
    }

    /// Close the underlying iterator whatever its projection
    pub fn close(&mut self) {
        match self {
            ScanIterator::FieldKeys(itr)
            | ScanIterator::TagKeys(itr)
            | ScanIterator::Measurements(itr) => itr.close(),
        }
    }
}

impl fmt::Debug for ScanIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScanIterator").field(&self.projection()).finish()
    }
}

// =============================================================================
// Shard Group
// =============================================================================

/// The set of shards a read runs against
pub trait ShardGroup: Send + Sync {
    /// Plan the read; `Ok(None)` when there is nothing to read at all
    fn create_cursor_iterators(&self, ctx: &ReadContext) -> CursorResult<Option<QueryPlan>>;

    /// Open an ordered series stream filtered by `condition`, optionally
    /// restricted to one measurement
    fn create_series_iterator(
        &self,
        ctx: &ReadContext,
        measurement: Option<&str>,
        condition: Option<&Expr>,
    ) -> CursorResult<Option<Box<dyn SeriesIterator>>>;

    /// Field keys recorded for `measurement` across all shards
    ///
    /// May contain duplicates and need not be sorted.
    fn field_keys_by_measurement(&self, measurement: &[u8]) -> Vec<String>;

    /// Run a field-key scan over every measurement with a series matching
    /// `condition`
    fn create_field_key_scan(
        &self,
        ctx: &ReadContext,
        condition: Option<&Expr>,
    ) -> CursorResult<Option<ScanIterator>>;
}

/// Key iterator over a pre-computed vector of points
#[derive(Debug, Default)]
pub struct VecKeyIterator {
    points: std::vec::IntoIter<KeyPoint>,
}

impl VecKeyIterator {
    /// Create an iterator yielding `points` in order
    pub fn new(points: Vec<KeyPoint>) -> Self {
        Self {
            points: points.into_iter(),
        }
    }
}

impl KeyIterator for VecKeyIterator {
    fn next(&mut self) -> CursorResult<Option<KeyPoint>> {
        Ok(self.points.next())
    }

    fn close(&mut self) {
        self.points = Vec::new().into_iter();
    }
}
