//! Key-value storage of [`SummonerRow`]s.
//!
//! The table has one primary key (`n`) and two secondary indexes, both sorted by the availability
//! date (`ad`):
//! * [`Index::Region`], partitioned by region (`r`).
//! * [`Index::NameLength`], partitioned by region and name length (`nl`).

use crate::db::SummonerRow;
use crate::Result;

pub mod d1;
pub mod memory;

/// Raw stored row, as returned by [`KeyValueStore::query`].
pub type Row = serde_json::Value;

/// Secondary index to query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Index {
    /// Partitioned by `r`.
    Region,
    /// Partitioned by `nl`.
    NameLength,
}
impl Index {
    /// Name of the partition attribute.
    pub fn partition_attribute(self) -> &'static str {
        match self {
            Index::Region => "r",
            Index::NameLength => "nl",
        }
    }
}

/// Condition on the availability date sort key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Range {
    /// `start <= ad <= end`.
    Between(i64, i64),
    /// `ad > cursor`.
    After(i64),
    /// `ad < cursor`.
    Before(i64),
}
impl Range {
    /// If `ad` satisfies this condition.
    pub fn contains(self, ad: i64) -> bool {
        match self {
            Range::Between(start, end) => start <= ad && ad <= end,
            Range::After(cursor) => cursor < ad,
            Range::Before(cursor) => ad < cursor,
        }
    }
}

/// Sort order of the results, by availability date.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Order {
    /// Oldest first.
    #[default]
    Ascending,
    /// Newest first.
    Descending,
}

/// A range query over one partition of an index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    /// Which index.
    pub index: Index,
    /// Partition value, e.g. `"NA"` or `"NA#5"`.
    pub partition: String,
    /// Sort key condition.
    pub range: Range,
    /// Result order.
    pub order: Order,
    /// Max number of rows returned.
    pub limit: u32,
}

/// Storage backend. Each operation is a single atomic call with no retries.
#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    /// Inserts or replaces the row with the same primary key.
    async fn put(&self, row: &SummonerRow) -> Result<()>;
    /// Deletes the row with primary key `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;
    /// Runs a range query.
    async fn query(&self, query: &Query) -> Result<Vec<Row>>;
}
