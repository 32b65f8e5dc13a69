//! Kuba storage read path - series cursors over a sharded time-series store
//!
//! This library turns a read predicate into the ordered stream of
//! (series, field) rows a storage reader iterates:
//! - Predicate splitting into tag-only, tag+field-key and full conditions
//! - Field-key discovery from metadata or a parallel shard scan
//! - Zero-allocation row cursor with exactly-once resource release
//! - Limit/offset paging

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod types;

/// Prometheus metrics and telemetry
pub mod metrics;

/// Configuration management with TOML support
pub mod config;

/// Series cursors, predicate rewriting and field enumeration
pub mod query;

// Re-export main types
pub use config::Config;
pub use error::{Error, Result};
pub use query::{create_series_cursor, Predicate, ReadRequest, SeriesCursor, SeriesRow};
pub use types::{SeriesKey, Tag, Tags};
