//! Metrics for the storage read path
//!
//! Prometheus counters for cursor construction, row output and errors.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_int_counter, CounterVec, Encoder, IntCounter, TextEncoder,
};

lazy_static! {
    /// Series cursors created, by field discovery path
    pub static ref CURSORS_CREATED: CounterVec = register_counter_vec!(
        "tsdb_series_cursors_created_total",
        "Series cursors created by field discovery path",
        &["path"]
    ).unwrap();

    /// Rows emitted by series cursors
    pub static ref ROWS_EMITTED: IntCounter = register_int_counter!(
        "tsdb_series_cursor_rows_total",
        "Rows emitted by series cursors"
    ).unwrap();

    /// Cursor errors by stage
    pub static ref CURSOR_ERRORS: CounterVec = register_counter_vec!(
        "tsdb_series_cursor_errors_total",
        "Series cursor errors by stage",
        &["stage"]
    ).unwrap();
}

/// Field discovery path taken by a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPath {
    /// Single-measurement metadata lookup
    Metadata,
    /// Field-key scan across shards
    Scan,
    /// Construction found nothing to read
    Empty,
}

impl FieldPath {
    fn label(&self) -> &'static str {
        match self {
            FieldPath::Metadata => "metadata",
            FieldPath::Scan => "scan",
            FieldPath::Empty => "empty",
        }
    }
}

/// Get metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    encoder.encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer)
        .map_err(|e| format!("Metrics contain invalid UTF-8: {}", e))
}

/// Record a cursor construction outcome
#[inline]
pub fn record_cursor_created(path: FieldPath) {
    CURSORS_CREATED
        .with_label_values(&[path.label()])
        .inc();
}

/// Record rows emitted by a cursor
#[inline]
pub fn record_rows(count: u64) {
    ROWS_EMITTED.inc_by(count);
}

/// Record a cursor error
#[inline]
pub fn record_error(stage: &str) {
    CURSOR_ERRORS
        .with_label_values(&[stage])
        .inc();
}
