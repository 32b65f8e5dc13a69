//! Read entry point
//!
//! Builds the series cursor for a read request: the index-driven cursor,
//! wrapped in a limit/offset cursor when the request pages its results.

use crate::config::Config;
use crate::engine::traits::{ReadContext, ShardGroup};
use crate::query::cursor::{IndexSeriesCursor, SeriesCursor};
use crate::query::error::{CursorError, CursorResult};
use crate::query::limit::LimitSeriesCursor;
use crate::query::rewrite::Predicate;
use tracing::debug;

/// A request for the series matching a predicate
#[derive(Debug, Clone, Default)]
pub struct ReadRequest {
    /// Filter over measurement, tags, field key and field value
    pub predicate: Predicate,
    /// Maximum number of rows to return
    ///
    /// 0 means no limit, also when `series_offset` is set: the offset rows
    /// are skipped and every remaining row is returned.
    pub series_limit: u64,
    /// Number of rows to skip
    pub series_offset: u64,
}

impl ReadRequest {
    /// Request every row matching `predicate`
    pub fn new(predicate: impl Into<Predicate>) -> Self {
        Self {
            predicate: predicate.into(),
            ..Default::default()
        }
    }

    /// Set the row limit
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.series_limit = limit;
        self
    }

    /// Set the row offset
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.series_offset = offset;
        self
    }

    /// Effective row limit after applying the configured cap
    ///
    /// `None` when neither a limit nor an offset applies.
    pub fn effective_limit(&self, max_series_limit: u64) -> Option<u64> {
        let requested = match (self.series_limit, self.series_offset) {
            (0, 0) if max_series_limit == 0 => return None,
            (0, _) => u64::MAX,
            (n, _) => n,
        };
        if max_series_limit > 0 {
            Some(requested.min(max_series_limit))
        } else {
            Some(requested)
        }
    }
}

/// Create the series cursor for `request`
///
/// Returns `Ok(None)` when no row can match. An invalid `config` fails
/// with a construction error before any shard is touched.
pub fn create_series_cursor(
    ctx: &ReadContext,
    request: &ReadRequest,
    shards: &dyn ShardGroup,
    config: &Config,
) -> CursorResult<Option<Box<dyn SeriesCursor>>> {
    config
        .validate()
        .map_err(|e| CursorError::construction(e.to_string()))?;

    let cursor =
        match IndexSeriesCursor::with_config(ctx, &request.predicate, shards, &config.read)? {
            Some(cursor) => cursor,
            None => return Ok(None),
        };

    match request.effective_limit(config.read.max_series_limit) {
        Some(limit) => {
            debug!(
                limit,
                offset = request.series_offset,
                "Applying series limit"
            );
            Ok(Some(Box::new(LimitSeriesCursor::new(
                cursor,
                limit,
                request.series_offset,
            ))))
        }
        None => Ok(Some(Box::new(cursor))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::stubs::{InMemoryShard, InMemoryShardGroup};
    use crate::query::expr::Expr;
    use crate::types::Tags;

    fn group() -> InMemoryShardGroup {
        let shard = InMemoryShard::new(7);
        for host in ["a", "b", "c"] {
            shard.write("cpu", Tags::from_pairs([("host", host)]), &["usage_idle", "usage_user"]);
        }
        InMemoryShardGroup::new(vec![shard])
    }

    fn count(cursor: &mut dyn SeriesCursor) -> usize {
        let mut n = 0;
        while cursor.next().is_some() {
            n += 1;
        }
        n
    }

    #[test]
    fn test_effective_limit() {
        let req = ReadRequest::default();
        assert_eq!(req.effective_limit(0), None);
        assert_eq!(req.effective_limit(10), Some(10));

        let req = ReadRequest::default().with_offset(3);
        assert_eq!(req.effective_limit(0), Some(u64::MAX));

        let req = ReadRequest::default().with_limit(50);
        assert_eq!(req.effective_limit(20), Some(20));
        assert_eq!(req.effective_limit(0), Some(50));
    }

    #[test]
    fn test_unlimited_request() {
        let group = group();
        let req = ReadRequest::new(Expr::measurement().equal(Expr::string("cpu")));
        let mut cursor = create_series_cursor(&ReadContext::new(), &req, &group, &Config::default())
            .unwrap()
            .unwrap();
        assert_eq!(count(cursor.as_mut()), 6);
    }

    #[test]
    fn test_limit_and_offset() {
        let group = group();
        let req = ReadRequest::new(Expr::measurement().equal(Expr::string("cpu")))
            .with_limit(2)
            .with_offset(3);
        let mut cursor = create_series_cursor(&ReadContext::new(), &req, &group, &Config::default())
            .unwrap()
            .unwrap();

        let row = cursor.next().unwrap();
        assert_eq!(row.series_tags.get(b"host"), Some(&b"b"[..]));
        assert_eq!(row.field.name(), "usage_user");
        assert_eq!(count(cursor.as_mut()), 1);
    }

    #[test]
    fn test_configured_cap() {
        let group = group();
        let mut config = Config::default();
        config.read.max_series_limit = 4;

        let req = ReadRequest::new(Predicate::all());
        let mut cursor = create_series_cursor(&ReadContext::new(), &req, &group, &config)
            .unwrap()
            .unwrap();
        assert_eq!(count(cursor.as_mut()), 4);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let group = group();
        let mut config = Config::default();
        config.read.tag_capacity = 5000;

        let req = ReadRequest::new(Predicate::all());
        let err = match create_series_cursor(&ReadContext::new(), &req, &group, &config) {
            Err(err) => err,
            Ok(_) => panic!("invalid config accepted"),
        };
        assert!(err.is_construction());
        assert!(err.to_string().contains("Tag capacity"));
        assert_eq!(group.stats().series_opened(), 0);
    }

    #[test]
    fn test_zero_limit_with_offset_returns_rest() {
        let group = group();
        let req = ReadRequest::new(Predicate::all()).with_offset(4);
        let mut cursor = create_series_cursor(&ReadContext::new(), &req, &group, &Config::default())
            .unwrap()
            .unwrap();
        assert_eq!(count(cursor.as_mut()), 2);
    }

    #[test]
    fn test_no_match_is_none() {
        let group = group();
        let req = ReadRequest::new(Expr::measurement().equal(Expr::string("mem")));
        let cursor =
            create_series_cursor(&ReadContext::new(), &req, &group, &Config::default()).unwrap();
        assert!(cursor.is_none());
    }
}
