//! Model structs for the API and for the storage table. Rows must be kept in sync with migrations.

use serde_with::{serde_as, DisplayFromStr, PickFirst};

use crate::with::{CompositeKey, SEPARATOR};

/// A LoL summoner, as returned by the HTTP API.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummonerRecord {
    /// Summoner name, lower-cased.
    pub name: String,
    /// Region code, e.g. `"NA"`.
    pub region: String,
    /// Encrypted Riot account ID.
    pub account_id: String,
    /// Last time Riot updated the summoner (unix epoch milliseconds).
    pub revision_date: i64,
    /// When the name is expected to become available (unix epoch milliseconds).
    pub availability_date: i64,
    /// Summoner level.
    pub level: i64,
    /// Last time this record was refreshed from Riot (unix epoch milliseconds).
    pub last_updated: i64,
    /// Profile icon ID.
    pub summoner_icon: i64,
}

/// A row in the summoner table.
///
/// Numeric attributes are read from either JSON numbers or numeric strings.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SummonerRow {
    /// PK `REGION#NAME`, name upper-cased.
    #[serde(rename = "n")]
    #[serde_as(as = "CompositeKey")]
    pub key: (String, String),
    /// Partition of the availability date index.
    #[serde(rename = "r")]
    pub region: String,
    /// Sort key of both indexes.
    #[serde(rename = "ad")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub availability_date: i64,
    /// Encrypted Riot account ID.
    #[serde(rename = "aid")]
    pub account_id: String,
    /// Revision date (unix epoch milliseconds).
    #[serde(rename = "rd")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub revision_date: i64,
    /// Summoner level.
    #[serde(rename = "l")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub level: i64,
    /// Partition of the name length index, `REGION#LEN`. Write-only.
    #[serde(rename = "nl", skip_deserializing)]
    #[serde_as(serialize_as = "CompositeKey")]
    pub name_length_key: (String, usize),
    /// Last refresh (unix epoch milliseconds).
    #[serde(rename = "ld")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub last_updated: i64,
    /// Profile icon ID.
    #[serde(rename = "si")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub summoner_icon: i64,
}

impl SummonerRow {
    /// Builds the row stored for `record`.
    pub fn from_record(record: &SummonerRecord) -> Self {
        Self {
            key: (record.region.clone(), to_upper(&record.name)),
            region: record.region.clone(),
            availability_date: record.availability_date,
            account_id: record.account_id.clone(),
            revision_date: record.revision_date,
            level: record.level,
            name_length_key: (record.region.clone(), name_length(&record.name)),
            last_updated: record.last_updated,
            summoner_icon: record.summoner_icon,
        }
    }

    /// The primary key string.
    pub fn primary_key(&self) -> String {
        format!("{}{}{}", self.key.0, SEPARATOR, self.key.1)
    }

    /// Converts back into the API model. Region and name come from the primary key, the name
    /// lower-cased.
    pub fn into_record(self) -> SummonerRecord {
        let (region, name) = self.key;
        SummonerRecord {
            name: to_lower(&name),
            region,
            account_id: self.account_id,
            revision_date: self.revision_date,
            availability_date: self.availability_date,
            level: self.level,
            last_updated: self.last_updated,
            summoner_icon: self.summoner_icon,
        }
    }
}

/// PK for a summoner: `REGION#NAME`.
pub fn primary_key(region: &str, name: &str) -> String {
    format!("{}{}{}", region, SEPARATOR, to_upper(name))
}

/// Upper-cases each `char` which has a single-`char` upper case, leaving others (e.g. `ß`) as-is,
/// so that [`to_lower`] reverses it and distinct names keep distinct keys.
pub fn to_upper(name: &str) -> String {
    name.chars().map(|c| single_char(c.to_uppercase(), c)).collect()
}

/// Lower-cases each `char` which has a single-`char` lower case, leaving others (e.g. `İ`) as-is.
pub fn to_lower(name: &str) -> String {
    name.chars().map(|c| single_char(c.to_lowercase(), c)).collect()
}

fn single_char(mut mapped: impl Iterator<Item = char>, c: char) -> char {
    match (mapped.next(), mapped.next()) {
        (Some(m), None) => m,
        _ => c,
    }
}

/// Partition value of the name length index: `REGION#LEN`.
pub fn name_length_key(region: &str, name_length: usize) -> String {
    format!("{}{}{}", region, SEPARATOR, name_length)
}

/// Name length in characters (not bytes).
pub fn name_length(name: &str) -> usize {
    name.chars().count()
}
