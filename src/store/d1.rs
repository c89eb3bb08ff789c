//! [`KeyValueStore`] over a Cloudflare D1 table. Schema in `migrations/`.

use worker::{query, D1Database};

use super::{Index, KeyValueStore, Order, Query, Range, Row};
use crate::db::SummonerRow;
use crate::{Error, Result};

/// D1-backed summoner table.
pub struct D1Store {
    db: D1Database,
    table: String,
}
impl D1Store {
    /// Wraps `db`. `table` is interpolated into SQL so must be a plain identifier.
    pub fn new(db: D1Database, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        check_identifier(&table)?;
        Ok(Self { db, table })
    }
}

impl KeyValueStore for D1Store {
    async fn put(&self, row: &SummonerRow) -> Result<()> {
        let sql = upsert_sql(&self.table);
        let statement = query!(
            &self.db,
            &sql,
            row.primary_key(),
            row.region,
            row.availability_date,
            row.account_id,
            row.revision_date,
            row.level,
            crate::db::name_length_key(&row.name_length_key.0, row.name_length_key.1),
            row.last_updated,
            row.summoner_icon,
        )
        .map_err(|e| Error::persistence("put", e))?;
        statement
            .run()
            .await
            .map_err(|e| Error::persistence("put", e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE n = ?1", self.table);
        let statement =
            query!(&self.db, &sql, key).map_err(|e| Error::persistence("delete", e))?;
        statement
            .run()
            .await
            .map_err(|e| Error::persistence("delete", e))?;
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Row>> {
        let sql = select_sql(&self.table, query);
        log::debug!("D1 query: {} ({:?})", sql, query);
        let statement = match query.range {
            Range::Between(start, end) => {
                query!(&self.db, &sql, query.partition, start, end, query.limit)
            }
            Range::After(cursor) | Range::Before(cursor) => {
                query!(&self.db, &sql, query.partition, cursor, query.limit)
            }
        }
        .map_err(|e| Error::persistence("query", e))?;
        let rows = statement
            .all()
            .await
            .and_then(|result| result.results::<Row>())
            .map_err(|e| Error::persistence("query", e))?;
        Ok(rows)
    }
}

fn upsert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table} (n, r, ad, aid, rd, l, nl, ld, si)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT (n) DO UPDATE SET
            r = excluded.r,
            ad = excluded.ad,
            aid = excluded.aid,
            rd = excluded.rd,
            l = excluded.l,
            nl = excluded.nl,
            ld = excluded.ld,
            si = excluded.si"
    )
}

fn select_sql(table: &str, query: &Query) -> String {
    let partition = query.index.partition_attribute();
    let (range, limit_param) = match query.range {
        Range::Between(..) => ("ad BETWEEN ?2 AND ?3", "?4"),
        Range::After(_) => ("ad > ?2", "?3"),
        Range::Before(_) => ("ad < ?2", "?3"),
    };
    let order = match query.order {
        Order::Ascending => "ASC",
        Order::Descending => "DESC",
    };
    format!(
        "SELECT * FROM {table} WHERE {partition} = ?1 AND {range} ORDER BY ad {order} LIMIT {limit_param}"
    )
}

fn check_identifier(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid
        .then_some(())
        .ok_or_else(|| Error::Config(format!("Invalid table name: {:?}", table)))
}
