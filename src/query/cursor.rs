//! Series cursor
//!
//! Turns a read predicate into an ordered stream of rows, one per
//! (series, field) pair that can satisfy the predicate. Each row names the
//! series, the field, the shards to read from and whatever part of the
//! predicate still depends on the stored values.
//!
//! # Row lifetime
//!
//! [`SeriesCursor::next`] returns a reference into the cursor's own row
//! buffer, which is refilled in place on the following call. The borrow
//! checker rejects holding a row across `next`; use [`SeriesRow::snapshot`]
//! to keep one.
//!
//! # Resources
//!
//! An [`IndexSeriesCursor`] owns the series iterator it was built over. The
//! iterator is released exactly once: on exhaustion, on a scan error, on
//! [`SeriesCursor::close`] or when the cursor is dropped, whichever comes
//! first.

use crate::config::ReadConfig;
use crate::engine::traits::{QueryPlan, ReadContext, SeriesIterator, ShardGroup};
use crate::metrics::{self, FieldPath};
use crate::query::error::{CursorError, CursorResult};
use crate::query::expr::{
    eval_bool, reduce, Expr, Value, Valuer, FIELD_REF, MEASUREMENT_REF, NAME_REF, VALUE_REF,
};
use crate::query::fields::{fields_for_measurement, fields_from_scan, FieldKey, MeasurementFields};
use crate::query::rewrite::{Predicate, PredicatePlan};
use crate::types::{Tags, FIELD_TAG_KEY, MEASUREMENT_TAG_KEY};
use bytes::Bytes;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, debug_span, warn};

/// A pull-based stream of series rows
pub trait SeriesCursor: Send {
    /// Advance to the next row
    ///
    /// Returns `None` at the end of the stream, after [`close`](Self::close)
    /// and after a scan error (check [`err`](Self::err)).
    fn next(&mut self) -> Option<&SeriesRow>;

    /// First error observed while scanning, if any
    fn err(&self) -> Option<&CursorError>;

    /// Release the cursor's resources. Idempotent.
    fn close(&mut self);
}

impl<C: SeriesCursor + ?Sized> SeriesCursor for Box<C> {
    fn next(&mut self) -> Option<&SeriesRow> {
        (**self).next()
    }

    fn err(&self) -> Option<&CursorError> {
        (**self).err()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

impl<C: SeriesCursor + ?Sized> SeriesCursor for &mut C {
    fn next(&mut self) -> Option<&SeriesRow> {
        (**self).next()
    }

    fn err(&self) -> Option<&CursorError> {
        (**self).err()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// One output row of a series cursor
#[derive(Debug, Clone)]
pub struct SeriesRow {
    /// Measurement name
    pub name: Bytes,
    /// Tags of the series as stored
    pub series_tags: Tags,
    /// Series tags plus the synthetic `_measurement` and `_field` tags
    pub tags: Tags,
    /// Field this row reads
    pub field: FieldKey,
    /// Shards the data reader opens value iterators on
    pub query: Arc<QueryPlan>,
    /// Condition on the field value still to be checked per point
    ///
    /// `None` when the predicate is fully resolved by the series and field.
    pub value_cond: Option<Expr>,
}

impl SeriesRow {
    fn empty(query: Arc<QueryPlan>, tag_capacity: usize) -> Self {
        Self {
            name: Bytes::new(),
            series_tags: Tags::with_capacity(tag_capacity),
            tags: Tags::with_capacity(tag_capacity),
            field: FieldKey::new(String::new()),
            query,
            value_cond: None,
        }
    }

    /// Owned copy of this row that outlives the next cursor advance
    pub fn snapshot(&self) -> SeriesRow {
        self.clone()
    }
}

/// Resolves names against the row currently being built
struct RowValuer<'a> {
    name: &'a [u8],
    field: &'a FieldKey,
    tags: &'a Tags,
}

impl Valuer for RowValuer<'_> {
    fn value(&self, name: &str) -> Option<Value<'_>> {
        let bytes = match name {
            NAME_REF | MEASUREMENT_REF => self.name,
            FIELD_REF => return Some(Value::Str(Cow::Borrowed(self.field.name()))),
            // Only known once points are read
            VALUE_REF => return None,
            _ => self.tags.get(name.as_bytes())?,
        };
        Some(Value::Str(String::from_utf8_lossy(bytes)))
    }
}

/// Series cursor driven by the series index
///
/// Walks the series matching the tag-only part of the predicate and, for
/// each, the sorted field keys of its measurement. Candidates failing the
/// tag and field-key part of the predicate are skipped.
pub struct IndexSeriesCursor {
    sqry: Option<Box<dyn SeriesIterator>>,
    fields: MeasurementFields,
    plan: PredicatePlan,

    /// Field list of the current series and the next position in it
    pending: Option<Arc<[FieldKey]>>,
    pos: usize,

    /// Working tag set for the current candidate
    tags: Tags,
    row: SeriesRow,

    err: Option<CursorError>,
    eof: bool,
    emitted: u64,
}

impl IndexSeriesCursor {
    /// Build a cursor with the default read configuration
    ///
    /// Returns `Ok(None)` when nothing can match: no shards, no series, or
    /// no field keys for the matching measurements.
    pub fn new(
        ctx: &ReadContext,
        predicate: &Predicate,
        shards: &dyn ShardGroup,
    ) -> CursorResult<Option<Self>> {
        Self::with_config(ctx, predicate, shards, &ReadConfig::default())
    }

    /// Build a cursor with an explicit read configuration
    pub fn with_config(
        ctx: &ReadContext,
        predicate: &Predicate,
        shards: &dyn ShardGroup,
        config: &ReadConfig,
    ) -> CursorResult<Option<Self>> {
        let span = debug_span!("index_cursor.create");
        let _enter = span.enter();

        let query = match shards.create_cursor_iterators(ctx) {
            Ok(Some(query)) => Arc::new(query),
            Ok(None) => {
                debug!("No shards to read");
                metrics::record_cursor_created(FieldPath::Empty);
                return Ok(None);
            }
            Err(e) => return Err(construction_error("failed to plan read", e)),
        };

        let plan = PredicatePlan::new(predicate);
        let measurement = plan.single_measurement();

        let mut sqry = match shards.create_series_iterator(
            ctx,
            measurement.as_deref(),
            plan.tag_cond.as_ref(),
        ) {
            Ok(Some(sqry)) => sqry,
            Ok(None) => {
                debug!("Series index returned no iterator");
                metrics::record_cursor_created(FieldPath::Empty);
                return Ok(None);
            }
            Err(e) => return Err(construction_error("failed to open series iterator", e)),
        };

        match acquire_fields(ctx, shards, &plan, measurement.as_deref()) {
            Ok((fields, path)) if !fields.is_empty() => {
                debug!(
                    path = ?path,
                    measurements = fields.len(),
                    fields = fields.field_count(),
                    has_field_key = plan.has_field_key,
                    has_field_value = plan.has_field_value,
                    "Created index series cursor"
                );
                metrics::record_cursor_created(path);
                Ok(Some(Self {
                    sqry: Some(sqry),
                    fields,
                    plan,
                    pending: None,
                    pos: 0,
                    tags: Tags::with_capacity(config.tag_capacity),
                    row: SeriesRow::empty(query, config.tag_capacity),
                    err: None,
                    eof: false,
                    emitted: 0,
                }))
            }
            outcome => {
                sqry.close();
                match outcome {
                    Ok(_) => {
                        debug!(
                            measurement = ?measurement,
                            "No field keys for matching measurements"
                        );
                        metrics::record_cursor_created(FieldPath::Empty);
                        Ok(None)
                    }
                    Err(e) => {
                        let e = construction_error("failed to enumerate field keys", e);
                        warn!(error = %e, "Series cursor construction failed");
                        Err(e)
                    }
                }
            }
        }
    }

    /// Pull the next series into the row buffer and load its field list.
    /// Returns false at the end of the stream or on error.
    fn next_series(&mut self) -> bool {
        let outcome = match self.sqry.as_mut() {
            Some(sqry) => match sqry.next() {
                Ok(Some(key)) => {
                    self.row.name.clone_from(&key.name);
                    self.row.series_tags.clone_from(&key.tags);
                    Ok(true)
                }
                Ok(None) => Ok(false),
                Err(e) => Err(e),
            },
            None => Ok(false),
        };

        match outcome {
            Ok(true) => {}
            Ok(false) => {
                SeriesCursor::close(self);
                return false;
            }
            Err(e) => {
                warn!(error = %e, rows = self.emitted, "Series scan failed");
                metrics::record_error("scan");
                if self.err.is_none() {
                    self.err = Some(e);
                }
                SeriesCursor::close(self);
                return false;
            }
        }

        self.tags.clone_from(&self.row.series_tags);
        self.tags
            .set(Bytes::from_static(MEASUREMENT_TAG_KEY), self.row.name.clone());
        self.pending = self.fields.get(&self.row.name).cloned();
        self.pos = 0;
        true
    }

    fn residual(&self) -> Option<Expr> {
        if !self.plan.has_field_value {
            return None;
        }
        let valuer = RowValuer {
            name: &self.row.name,
            field: &self.row.field,
            tags: &self.tags,
        };
        self.plan
            .full
            .as_ref()
            .map(|full| reduce(full, Some(&valuer)))
            .filter(|expr| !expr.is_true_literal())
    }
}

impl SeriesCursor for IndexSeriesCursor {
    fn next(&mut self) -> Option<&SeriesRow> {
        if self.eof {
            return None;
        }

        loop {
            let candidate = self
                .pending
                .as_ref()
                .and_then(|list| list.get(self.pos))
                .cloned();
            let field = match candidate {
                Some(field) => field,
                None => {
                    if !self.next_series() {
                        return None;
                    }
                    continue;
                }
            };
            self.pos += 1;

            self.tags
                .set(Bytes::from_static(FIELD_TAG_KEY), field.as_bytes().clone());
            self.row.field = field;

            let keep = match &self.plan.measurement_cond {
                Some(cond) => eval_bool(
                    cond,
                    &RowValuer {
                        name: &self.row.name,
                        field: &self.row.field,
                        tags: &self.tags,
                    },
                ),
                None => true,
            };
            if keep {
                break;
            }
        }

        self.row.value_cond = self.residual();
        self.row.tags.clone_from(&self.tags);
        self.emitted += 1;
        Some(&self.row)
    }

    fn err(&self) -> Option<&CursorError> {
        self.err.as_ref()
    }

    fn close(&mut self) {
        if self.eof {
            return;
        }
        self.eof = true;
        if let Some(mut sqry) = self.sqry.take() {
            sqry.close();
        }
        self.pending = None;
        metrics::record_rows(self.emitted);
        debug!(rows = self.emitted, "Closed index series cursor");
    }
}

impl Drop for IndexSeriesCursor {
    fn drop(&mut self) {
        SeriesCursor::close(self);
    }
}

/// Build the field table for the read
///
/// A single-measurement predicate consults that measurement's metadata;
/// anything else runs a field-key scan filtered by the tag-only condition.
fn acquire_fields(
    ctx: &ReadContext,
    shards: &dyn ShardGroup,
    plan: &PredicatePlan,
    measurement: Option<&str>,
) -> CursorResult<(MeasurementFields, FieldPath)> {
    if let Some(name) = measurement {
        return Ok((fields_for_measurement(shards, name), FieldPath::Metadata));
    }

    let fields = match shards.create_field_key_scan(ctx, plan.tag_cond.as_ref())? {
        Some(scan) => fields_from_scan(scan)?,
        None => MeasurementFields::new(),
    };
    Ok((fields, FieldPath::Scan))
}

fn construction_error(context: &str, e: CursorError) -> CursorError {
    metrics::record_error("construction");
    if e.is_construction() {
        e
    } else {
        CursorError::construction(format!("{}: {}", context, e)).with_source(e)
    }
}
