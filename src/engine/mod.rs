//! Shard-facing seams of the read path and their in-memory implementations

pub mod stubs;
pub mod traits;

pub use traits::{
    KeyIterator, KeyPoint, QueryPlan, ReadContext, ScanIterator, SeriesIterator, ShardGroup,
};
