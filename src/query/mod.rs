//! Storage read path
//!
//! Turns a read predicate into the stream of (series, field) rows that the
//! data reader opens value iterators for.
//!
//! # Architecture
//!
//! ```text
//! Predicate
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Rewrite   │  full / tag+field-key / tag-only conditions
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Fields    │  metadata lookup or field-key scan
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Cursor    │  series × fields, filtered per row
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │    Limit    │  offset / limit
//! └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use kuba_storage_read::config::Config;
//! use kuba_storage_read::engine::stubs::{InMemoryShard, InMemoryShardGroup};
//! use kuba_storage_read::engine::traits::ReadContext;
//! use kuba_storage_read::query::{create_series_cursor, Expr, ReadRequest, SeriesCursor};
//! use kuba_storage_read::types::Tags;
//!
//! let shard = InMemoryShard::new(1);
//! shard.write("cpu", Tags::from_pairs([("host", "a")]), &["usage_user", "usage_idle"]);
//! let shards = InMemoryShardGroup::new(vec![shard]);
//!
//! let request = ReadRequest::new(Expr::measurement().equal(Expr::string("cpu")));
//! let ctx = ReadContext::new();
//! let mut cursor = create_series_cursor(&ctx, &request, &shards, &Config::default())
//!     .unwrap()
//!     .unwrap();
//!
//! let mut fields = Vec::new();
//! while let Some(row) = cursor.next() {
//!     fields.push(row.field.name().to_string());
//! }
//! assert_eq!(fields, vec!["usage_idle", "usage_user"]);
//! ```

pub mod cursor;
pub mod error;
pub mod expr;
pub mod fields;
pub mod limit;
pub mod rewrite;
pub mod store;

// Re-export main types
pub use cursor::{IndexSeriesCursor, SeriesCursor, SeriesRow};
pub use error::{CursorError, CursorErrorKind, CursorResult};
pub use expr::{eval_bool, reduce, BinaryOp, Expr, Literal, MapValuer, Value, Valuer};
pub use fields::{FieldKey, MeasurementFields};
pub use limit::LimitSeriesCursor;
pub use rewrite::{Predicate, PredicatePlan};
pub use store::{create_series_cursor, ReadRequest};
