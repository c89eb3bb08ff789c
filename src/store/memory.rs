//! In-memory [`KeyValueStore`], for tests and local development.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::cmp::Reverse;

use itertools::Itertools;

use super::{Index, KeyValueStore, Order, Query, Row};
use crate::db::{name_length_key, SummonerRow};
use crate::{Error, Result};

/// Rows keyed by primary key. Single-threaded, like a worker isolate.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RefCell<BTreeMap<String, SummonerRow>>,
}
impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the row with primary key `key`.
    pub fn get(&self, key: &str) -> Option<SummonerRow> {
        self.rows.borrow().get(key).cloned()
    }

    /// Number of rows stored.
    pub fn len(&self) -> usize {
        self.rows.borrow().len()
    }

    /// If no rows are stored.
    pub fn is_empty(&self) -> bool {
        self.rows.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    async fn put(&self, row: &SummonerRow) -> Result<()> {
        self.rows
            .borrow_mut()
            .insert(row.primary_key(), row.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.rows.borrow_mut().remove(key);
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Row>> {
        let rows = self.rows.borrow();
        let matching = rows
            .values()
            .filter(|row| match query.index {
                Index::Region => row.region == query.partition,
                Index::NameLength => {
                    name_length_key(&row.name_length_key.0, row.name_length_key.1)
                        == query.partition
                }
            })
            .filter(|row| query.range.contains(row.availability_date));
        let sorted = match query.order {
            Order::Ascending => matching.sorted_by_key(|row| row.availability_date),
            Order::Descending => matching.sorted_by_key(|row| Reverse(row.availability_date)),
        };
        sorted
            .take(query.limit as usize)
            .map(|row| serde_json::to_value(row).map_err(|e| Error::persistence("query", e)))
            .collect()
    }
}
