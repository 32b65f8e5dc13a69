//! Limit and offset for series cursors
//!
//! # Example
//!
//! ```rust,ignore
//! use kuba_storage_read::query::limit::LimitSeriesCursor;
//!
//! // Skip the first 50 rows and return at most 100
//! let limited = LimitSeriesCursor::new(cursor, 100, 50);
//! ```

use super::cursor::{SeriesCursor, SeriesRow};
use super::error::CursorError;

/// Cursor returning at most `limit` rows after skipping `offset` rows
///
/// The offset is consumed on the first call to `next`. If the wrapped
/// cursor runs out while skipping, the stream is simply empty.
///
/// Holds no resource of its own: `err` and `close` go straight to the
/// wrapped cursor.
pub struct LimitSeriesCursor<C: SeriesCursor> {
    /// Wrapped cursor
    inner: C,
    /// Maximum number of rows to return
    limit: u64,
    /// Rows still to skip
    offset: u64,
    /// Rows returned so far
    returned: u64,
}

impl<C: SeriesCursor> LimitSeriesCursor<C> {
    /// Wrap `inner` with a limit and an offset
    pub fn new(inner: C, limit: u64, offset: u64) -> Self {
        Self {
            inner,
            limit,
            offset,
            returned: 0,
        }
    }

    /// Rows that can still be returned
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.returned)
    }

    /// Unwrap the inner cursor
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: SeriesCursor> SeriesCursor for LimitSeriesCursor<C> {
    fn next(&mut self) -> Option<&SeriesRow> {
        while self.offset > 0 {
            self.offset -= 1;
            if self.inner.next().is_none() {
                self.offset = 0;
                break;
            }
        }

        if self.returned >= self.limit {
            return None;
        }
        self.returned += 1;
        self.inner.next()
    }

    fn err(&self) -> Option<&CursorError> {
        self.inner.err()
    }

    fn close(&mut self) {
        self.inner.close()
    }
}
