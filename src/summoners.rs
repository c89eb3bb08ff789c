//! Summoner records: fetching from Riot, persistence and range queries.

use std::ops::RangeInclusive;

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use http::StatusCode;
use web_time::SystemTime;

use crate::db::{name_length_key, primary_key, to_lower, SummonerRecord, SummonerRow};
use crate::regions::Regions;
use crate::riot::{RiotSummoner, SummonerLookup};
use crate::store::{Index, KeyValueStore, Order, Query, Range, Row};
use crate::{Error, Result};

/// Availability is at least this many months after the revision date.
pub const MIN_MONTHS: i64 = 6;
/// Availability is at most this many months after the revision date.
pub const MAX_MONTHS: i64 = 30;
/// Name lengths which can be queried by [`Summoners::get_by_name_length`].
pub const NAME_LENGTHS: RangeInclusive<usize> = 3..=16;

/// Reads summoners from Riot and reads/writes them in the store.
pub struct Summoners<S, L> {
    store: S,
    lookup: L,
    regions: Regions,
}

impl<S, L> Summoners<S, L>
where
    S: KeyValueStore,
    L: SummonerLookup,
{
    /// Create from the given backends.
    pub fn new(store: S, lookup: L, regions: Regions) -> Self {
        Self {
            store,
            lookup,
            regions,
        }
    }

    /// The supported regions.
    pub fn regions(&self) -> &Regions {
        &self.regions
    }

    /// The storage backend.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The Riot API client.
    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Fetches the summoner `name` in `region` from Riot.
    ///
    /// Fails with [`Error::InvalidRegion`] before any request if `region` is unknown, and with
    /// [`Error::NotFound`] if Riot has no such summoner.
    pub async fn fetch(&self, region: &str, name: &str) -> Result<SummonerRecord> {
        let route = self.regions.translate(region)?;
        let response = self.lookup.get_by_name(route, name).await?;

        if StatusCode::NOT_FOUND == response.status {
            return Err(Error::NotFound {
                region: region.to_owned(),
                name: name.to_owned(),
            });
        }
        if !response.status.is_success() {
            return Err(Error::ExternalService {
                status: Some(response.status.as_u16()),
                message: response.body,
            });
        }

        let riot_summoner: RiotSummoner =
            serde_json::from_str(&response.body).map_err(|e| Error::ExternalService {
                status: Some(response.status.as_u16()),
                message: format!("Failed to parse summoner: {}", e),
            })?;
        record_from_riot(riot_summoner, region, now_millis())
    }

    /// Inserts or replaces the stored record.
    pub async fn save(&self, record: &SummonerRecord) -> Result<()> {
        self.store.put(&SummonerRow::from_record(record)).await
    }

    /// Deletes the stored record, if any.
    pub async fn delete(&self, region: &str, name: &str) -> Result<()> {
        self.store.delete(&primary_key(region, name)).await
    }

    /// Up to `limit` records in `region` with an availability date within `start..=end`,
    /// soonest first.
    pub async fn get_between_date(
        &self,
        region: &str,
        limit: u32,
        start: i64,
        end: i64,
    ) -> Result<Vec<SummonerRecord>> {
        self.check_region(region)?;
        if end < start {
            return Err(Error::InvalidQuery(format!(
                "start ({}) is after end ({})",
                start, end
            )));
        }
        self.run_query(Query {
            index: Index::Region,
            partition: region.to_owned(),
            range: Range::Between(start, end),
            order: Order::Ascending,
            limit,
        })
        .await
    }

    /// Page of up to `limit` records in `region` with an availability date after `after`
    /// (ascending), or before `after` (descending) if `backwards`.
    pub async fn get_after(
        &self,
        region: &str,
        limit: u32,
        after: i64,
        backwards: bool,
    ) -> Result<Vec<SummonerRecord>> {
        self.check_region(region)?;
        self.run_query(page_query(Index::Region, region.to_owned(), limit, after, backwards))
            .await
    }

    /// Same as [`Self::get_after`], restricted to names of `name_length` characters.
    pub async fn get_by_name_length(
        &self,
        region: &str,
        limit: u32,
        name_length: usize,
        after: i64,
        backwards: bool,
    ) -> Result<Vec<SummonerRecord>> {
        self.check_region(region)?;
        if !NAME_LENGTHS.contains(&name_length) {
            return Err(Error::InvalidQuery(format!(
                "name length {} not within {:?}",
                name_length, NAME_LENGTHS
            )));
        }
        let partition = name_length_key(region, name_length);
        self.run_query(page_query(Index::NameLength, partition, limit, after, backwards))
            .await
    }

    fn check_region(&self, region: &str) -> Result<()> {
        self.regions
            .validate(region)
            .then_some(())
            .ok_or_else(|| Error::InvalidRegion(region.to_owned()))
    }

    async fn run_query(&self, query: Query) -> Result<Vec<SummonerRecord>> {
        if 0 == query.limit {
            return Ok(Vec::new());
        }
        let rows = self.store.query(&query).await?;
        let mut records = from_rows(rows)?;
        records.truncate(query.limit as usize);
        Ok(records)
    }
}

fn page_query(index: Index, partition: String, limit: u32, after: i64, backwards: bool) -> Query {
    let (range, order) = if backwards {
        (Range::Before(after), Order::Descending)
    } else {
        (Range::After(after), Order::Ascending)
    };
    Query {
        index,
        partition,
        range,
        order,
        limit,
    }
}

/// Parses stored rows, preserving order. The first bad row fails the whole batch.
pub fn from_rows(rows: Vec<Row>) -> Result<Vec<SummonerRecord>> {
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            let key = row.get("n").and_then(Row::as_str).map(str::to_owned);
            let malformed = |reason: String| Error::MalformedRecord {
                index,
                key: key.clone(),
                reason,
            };
            let row = serde_json::from_value::<SummonerRow>(row)
                .map_err(|e| malformed(e.to_string()))?;
            if row.region != row.key.0 {
                return Err(malformed(format!(
                    "region `{}` does not match key region `{}`",
                    row.region, row.key.0
                )));
            }
            Ok(row.into_record())
        })
        .collect()
}

/// Builds the record for a Riot response, last updated at `now` (epoch millis).
pub fn record_from_riot(
    riot_summoner: RiotSummoner,
    region: &str,
    now: i64,
) -> Result<SummonerRecord> {
    let availability_date =
        availability_date(riot_summoner.revision_date, riot_summoner.summoner_level).ok_or_else(
            || Error::ExternalService {
                status: None,
                message: format!(
                    "Revision date out of range: {}",
                    riot_summoner.revision_date
                ),
            },
        )?;
    Ok(SummonerRecord {
        name: to_lower(&riot_summoner.name),
        region: region.to_owned(),
        account_id: riot_summoner.account_id,
        revision_date: riot_summoner.revision_date,
        availability_date,
        level: riot_summoner.summoner_level,
        last_updated: now,
        summoner_icon: riot_summoner.profile_icon_id,
    })
}

/// `revision_date` (epoch millis) plus `clamp(level, 6, 30)` calendar months.
///
/// Months are added in UTC. A day-of-month past the end of the target month rolls over into the
/// next month, e.g. Aug 31 plus 6 months is Mar 2 (leap year). Returns `None` if the result is
/// not representable.
pub fn availability_date(revision_date: i64, level: i64) -> Option<i64> {
    let months = level.clamp(MIN_MONTHS, MAX_MONTHS) as u32;
    let revision = DateTime::<Utc>::from_timestamp_millis(revision_date)?;
    add_months(revision, months).map(|datetime| datetime.timestamp_millis())
}

fn add_months(datetime: DateTime<Utc>, months: u32) -> Option<DateTime<Utc>> {
    let date = datetime.date_naive();
    let month0 = date.month0() + months;
    let year = date.year().checked_add((month0 / 12) as i32)?;
    let first = NaiveDate::from_ymd_opt(year, month0 % 12 + 1, 1)?;
    let date = first.checked_add_days(Days::new(date.day0().into()))?;
    Some(date.and_time(datetime.time()).and_utc())
}

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::UNIX_EPOCH
        .elapsed()
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;
    use futures::executor::block_on;
    use riven::consts::PlatformRoute;

    use super::*;
    use crate::riot::stub::{riot_summoner, Stub, StubLookup};
    use crate::store::memory::MemoryStore;

    fn utc_millis(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> i64 {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .unwrap()
            .timestamp_millis()
    }

    struct FailingStore;
    impl KeyValueStore for FailingStore {
        async fn put(&self, _row: &SummonerRow) -> Result<()> {
            Err(Error::persistence("put", "D1_ERROR"))
        }
        async fn delete(&self, _key: &str) -> Result<()> {
            Err(Error::persistence("delete", "D1_ERROR"))
        }
        async fn query(&self, _query: &Query) -> Result<Vec<Row>> {
            Err(Error::persistence("query", "D1_ERROR"))
        }
    }

    fn summoners(stub: Stub) -> Summoners<MemoryStore, StubLookup> {
        Summoners::new(MemoryStore::new(), StubLookup::new(stub), Regions::default())
    }

    fn record(region: &str, name: &str, availability_date: i64) -> SummonerRecord {
        SummonerRecord {
            name: name.to_owned(),
            region: region.to_owned(),
            account_id: format!("{}-aid", name),
            revision_date: availability_date - 1000,
            availability_date,
            level: 10,
            last_updated: 123456,
            summoner_icon: 7,
        }
    }

    fn seeded() -> Summoners<MemoryStore, StubLookup> {
        let summoners = summoners(Stub::Fail);
        for (region, name, ad) in [
            ("NA", "abc", 100),
            ("NA", "abcd", 200),
            ("NA", "xyz", 300),
            ("NA", "abcde", 400),
            ("NA", "qrs", 500),
            ("EUW", "abc", 250),
        ] {
            block_on(summoners.save(&record(region, name, ad))).unwrap();
        }
        summoners
    }

    fn names(records: &[SummonerRecord]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_availability_date_min() {
        let revision_date = utc_millis(2024, 2, 12, 8, 21, 30);
        assert_eq!(
            Some(utc_millis(2024, 8, 12, 8, 21, 30)),
            availability_date(revision_date, 3)
        );
    }

    #[test]
    fn test_availability_date_level() {
        let revision_date = utc_millis(2024, 2, 12, 8, 21, 30);
        assert_eq!(
            Some(utc_millis(2025, 2, 12, 8, 21, 30)),
            availability_date(revision_date, 12)
        );
    }

    #[test]
    fn test_availability_date_max() {
        let revision_date = utc_millis(2024, 2, 12, 8, 21, 30);
        assert_eq!(
            Some(utc_millis(2026, 8, 12, 8, 21, 30)),
            availability_date(revision_date, 35)
        );
    }

    #[test]
    fn test_availability_date_month_overflow() {
        let revision_date = utc_millis(2023, 8, 31, 12, 0, 0);
        assert_eq!(
            Some(utc_millis(2024, 3, 2, 12, 0, 0)),
            availability_date(revision_date, 6)
        );
    }

    #[test]
    fn test_availability_date_bounds() {
        let revision_date = utc_millis(2021, 1, 31, 23, 59, 59);
        let min = availability_date(revision_date, MIN_MONTHS).unwrap();
        let max = availability_date(revision_date, MAX_MONTHS).unwrap();
        for level in -5..=100 {
            let date = availability_date(revision_date, level).unwrap();
            assert!(min <= date && date <= max, "level {}", level);
        }
        assert_eq!(None, availability_date(i64::MAX, 10));
    }

    #[test]
    fn test_fetch_invalid_region() {
        let summoners = summoners(Stub::Ok(riot_summoner()));
        let err = block_on(summoners.fetch("invalid", "test")).unwrap_err();
        assert!(matches!(err, Error::InvalidRegion(_)), "{:?}", err);
        assert!(summoners.lookup.calls.borrow().is_empty());
    }

    #[test]
    fn test_fetch_not_found() {
        let summoners = summoners(Stub::Status(StatusCode::NOT_FOUND, ""));
        let err = block_on(summoners.fetch("NA", "test")).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }), "{:?}", err);
    }

    #[test]
    fn test_fetch_server_error() {
        let summoners = summoners(Stub::Status(
            StatusCode::INTERNAL_SERVER_ERROR,
            "an error occurred",
        ));
        let err = block_on(summoners.fetch("NA", "test")).unwrap_err();
        match err {
            Error::ExternalService { status, message } => {
                assert_eq!(Some(500), status);
                assert_eq!("an error occurred", message);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_fetch_transport_error() {
        let summoners = summoners(Stub::Fail);
        let err = block_on(summoners.fetch("NA", "test")).unwrap_err();
        assert!(
            matches!(err, Error::ExternalService { status: None, .. }),
            "{:?}",
            err
        );
    }

    #[test]
    fn test_fetch_bad_body() {
        let summoners = summoners(Stub::Status(StatusCode::OK, "{\"accountId\":"));
        let err = block_on(summoners.fetch("NA", "test")).unwrap_err();
        assert!(
            matches!(err, Error::ExternalService { status: Some(200), .. }),
            "{:?}",
            err
        );
    }

    #[test]
    fn test_fetch() {
        let summoners = summoners(Stub::Ok(riot_summoner()));
        let before = now_millis();
        let record = block_on(summoners.fetch("NA", "TeSt")).unwrap();

        assert_eq!(
            vec![(PlatformRoute::NA1, "TeSt".to_owned())],
            *summoners.lookup.calls.borrow()
        );
        assert_eq!("test", record.name);
        assert_eq!("NA", record.region);
        assert_eq!("test-aid", record.account_id);
        assert_eq!(utc_millis(2024, 2, 12, 8, 21, 30), record.revision_date);
        assert_eq!(utc_millis(2026, 8, 12, 8, 21, 30), record.availability_date);
        assert_eq!(32, record.level);
        assert_eq!(1, record.summoner_icon);
        assert!(before <= record.last_updated);
    }

    #[test]
    fn test_save_key() {
        let summoners = summoners(Stub::Fail);
        block_on(summoners.save(&record("NA", "Test", 1234))).unwrap();
        let row = summoners.store().get("NA#TEST").unwrap();
        assert_eq!(("NA".to_owned(), 4), row.name_length_key);
        assert_eq!(1234, row.availability_date);
    }

    #[test]
    fn test_save_overwrites() {
        let summoners = summoners(Stub::Fail);
        block_on(summoners.save(&record("NA", "test", 1))).unwrap();
        block_on(summoners.save(&record("NA", "TEST", 2))).unwrap();
        assert_eq!(1, summoners.store().len());
        assert_eq!(2, summoners.store().get("NA#TEST").unwrap().availability_date);
    }

    #[test]
    fn test_save_round_trip() {
        let summoners = summoners(Stub::Ok(riot_summoner()));
        let fetched = block_on(summoners.fetch("NA", "Test")).unwrap();
        block_on(summoners.save(&fetched)).unwrap();
        let found = block_on(summoners.get_between_date(
            "NA",
            10,
            fetched.availability_date,
            fetched.availability_date,
        ))
        .unwrap();
        assert_eq!(vec![fetched], found);
    }

    #[test]
    fn test_persistence_errors() {
        let summoners = Summoners::new(FailingStore, StubLookup::new(Stub::Fail), Regions::default());
        let err = block_on(summoners.save(&record("NA", "test", 1))).unwrap_err();
        assert!(matches!(err, Error::Persistence { operation: "put", .. }), "{:?}", err);
        let err = block_on(summoners.delete("NA", "test")).unwrap_err();
        assert!(matches!(err, Error::Persistence { operation: "delete", .. }), "{:?}", err);
        let err = block_on(summoners.get_after("NA", 10, 0, false)).unwrap_err();
        assert!(matches!(err, Error::Persistence { operation: "query", .. }), "{:?}", err);
    }

    #[test]
    fn test_delete() {
        let summoners = seeded();
        block_on(summoners.delete("NA", "Abc")).unwrap();
        assert!(summoners.store().get("NA#ABC").is_none());
        assert!(summoners.store().get("EUW#ABC").is_some());
        // Missing key.
        block_on(summoners.delete("NA", "Abc")).unwrap();
    }

    #[test]
    fn test_get_between_date() {
        let summoners = seeded();
        let records = block_on(summoners.get_between_date("NA", 10, 200, 400)).unwrap();
        assert_eq!(vec!["abcd", "xyz", "abcde"], names(&records));
        assert!(records.iter().all(|r| "NA" == r.region));

        let records = block_on(summoners.get_between_date("NA", 2, 0, 1000)).unwrap();
        assert_eq!(vec!["abc", "abcd"], names(&records));

        let records = block_on(summoners.get_between_date("NA", 0, 0, 1000)).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_get_between_date_invalid() {
        let summoners = seeded();
        let err = block_on(summoners.get_between_date("na", 10, 0, 1000)).unwrap_err();
        assert!(matches!(err, Error::InvalidRegion(_)), "{:?}", err);
        let err = block_on(summoners.get_between_date("NA", 10, 1000, 0)).unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)), "{:?}", err);
    }

    #[test]
    fn test_get_after() {
        let summoners = seeded();
        let records = block_on(summoners.get_after("NA", 2, 200, false)).unwrap();
        assert_eq!(vec!["xyz", "abcde"], names(&records));

        let records = block_on(summoners.get_after("NA", 2, 400, true)).unwrap();
        assert_eq!(vec!["xyz", "abcd"], names(&records));

        let records = block_on(summoners.get_after("EUW", 35, 0, false)).unwrap();
        assert_eq!(vec!["abc"], names(&records));
        assert_eq!("EUW", records[0].region);
    }

    #[test]
    fn test_get_by_name_length() {
        let summoners = seeded();
        let records = block_on(summoners.get_by_name_length("NA", 35, 3, 0, false)).unwrap();
        assert_eq!(vec!["abc", "xyz", "qrs"], names(&records));

        let records = block_on(summoners.get_by_name_length("NA", 1, 3, 500, true)).unwrap();
        assert_eq!(vec!["xyz"], names(&records));

        for name_length in [2, 17] {
            let err = block_on(summoners.get_by_name_length("NA", 35, name_length, 0, false))
                .unwrap_err();
            assert!(matches!(err, Error::InvalidQuery(_)), "{:?}", err);
        }
    }

    #[test]
    fn test_from_rows() {
        let rows = vec![
            serde_json::json!({
                "n": "NA#TEST", "r": "NA", "aid": "123",
                "ad": 123, "rd": 456, "l": 30, "ld": 789, "si": 12,
            }),
            serde_json::json!({
                "n": "EUW#SOME NAME", "r": "EUW", "aid": "abc",
                "ad": "1", "rd": "2", "l": "3", "ld": "4", "si": "5", "nl": "EUW#9",
            }),
        ];
        let records = from_rows(rows).unwrap();
        assert_eq!(
            vec![
                SummonerRecord {
                    name: "test".to_owned(),
                    region: "NA".to_owned(),
                    account_id: "123".to_owned(),
                    revision_date: 456,
                    availability_date: 123,
                    level: 30,
                    last_updated: 789,
                    summoner_icon: 12,
                },
                SummonerRecord {
                    name: "some name".to_owned(),
                    region: "EUW".to_owned(),
                    account_id: "abc".to_owned(),
                    revision_date: 2,
                    availability_date: 1,
                    level: 3,
                    last_updated: 4,
                    summoner_icon: 5,
                },
            ],
            records
        );
    }

    #[test]
    fn test_from_rows_malformed() {
        let good = serde_json::json!({
            "n": "NA#A", "r": "NA", "aid": "1", "ad": 1, "rd": 1, "l": 1, "ld": 1, "si": 1,
        });
        let missing = serde_json::json!({
            "n": "NA#B", "r": "NA", "aid": "1", "ad": 1, "rd": 1, "l": 1, "si": 1,
        });
        let err = from_rows(vec![good.clone(), missing]).unwrap_err();
        match err {
            Error::MalformedRecord { index, key, reason } => {
                assert_eq!(1, index);
                assert_eq!(Some("NA#B".to_owned()), key);
                assert!(reason.contains("ld"), "{}", reason);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let mut not_numeric = good.clone();
        not_numeric["ad"] = serde_json::json!("soon");
        let err = from_rows(vec![not_numeric]).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { index: 0, .. }), "{:?}", err);

        let mut no_separator = good.clone();
        no_separator["n"] = serde_json::json!("NATEST");
        let err = from_rows(vec![no_separator]).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { index: 0, .. }), "{:?}", err);

        let mut wrong_region = good;
        wrong_region["r"] = serde_json::json!("EUW");
        let err = from_rows(vec![wrong_region]).unwrap_err();
        match err {
            Error::MalformedRecord { index, key, reason } => {
                assert_eq!(0, index);
                assert_eq!(Some("NA#A".to_owned()), key);
                assert!(reason.contains("EUW"), "{}", reason);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_save_distinct_unicode_names() {
        let summoners = summoners(Stub::Fail);
        let strasse_eszett = record("EUW", "straße", 100);
        let strasse = record("EUW", "strasse", 200);
        let dotted = record("EUW", "İstanbul", 300);
        for record in [&strasse_eszett, &strasse, &dotted] {
            block_on(summoners.save(record)).unwrap();
        }
        assert_eq!(3, summoners.store().len());

        let records = block_on(summoners.get_after("EUW", 35, 0, false)).unwrap();
        assert_eq!(vec![strasse_eszett.clone(), strasse.clone(), dotted.clone()], records);

        let records = block_on(summoners.get_by_name_length("EUW", 35, 6, 0, false)).unwrap();
        assert_eq!(vec![strasse_eszett], records);
        let records = block_on(summoners.get_by_name_length("EUW", 35, 7, 0, false)).unwrap();
        assert_eq!(vec![strasse], records);
        let records = block_on(summoners.get_by_name_length("EUW", 35, 8, 0, false)).unwrap();
        assert_eq!(vec![dotted], records);
    }

    #[test]
    fn test_fetch_keeps_unmappable_case() {
        let riot = RiotSummoner {
            name: "Straße".to_owned(),
            ..riot_summoner()
        };
        let summoners = summoners(Stub::Ok(riot));
        let fetched = block_on(summoners.fetch("EUW", "Straße")).unwrap();
        assert_eq!("straße", fetched.name);
        block_on(summoners.save(&fetched)).unwrap();
        assert!(summoners.store().get("EUW#STRAßE").is_some());
    }
}
