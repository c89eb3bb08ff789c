//! HTTP API handlers.

use std::collections::HashMap;

use http::StatusCode;
use worker::{Request, Response, RouteContext};

use crate::db::{name_length, SummonerRecord};
use crate::init::AppState;
use crate::regions::Regions;
use crate::riot::SummonerLookup;
use crate::store::KeyValueStore;
use crate::summoners::{Summoners, NAME_LENGTHS};
use crate::{Error, Result};

/// Page size of `GET /summoners`.
pub const PAGE_SIZE: u32 = 35;

/// Query string parameters, by name. Repeated parameters keep the last value.
pub type Params = HashMap<String, String>;

/// `GET /summoner` parameters.
#[derive(Debug, PartialEq, Eq)]
pub struct SummonerParams {
    /// Region code, upper-cased.
    pub region: String,
    /// Summoner name as given.
    pub name: String,
}
impl SummonerParams {
    /// Validates `?name=&region=`.
    pub fn parse(params: &Params, regions: &Regions) -> Result<Self> {
        let name = params.get("name").map(String::as_str).unwrap_or_default();
        let len = name_length(name);
        if len < *NAME_LENGTHS.start() {
            return Err(Error::InvalidQuery(format!(
                "Query parameter 'name' must be at least {} characters",
                NAME_LENGTHS.start()
            )));
        }
        if len > *NAME_LENGTHS.end() {
            return Err(Error::InvalidQuery(format!(
                "Query parameter 'name' must be at most {} characters",
                NAME_LENGTHS.end()
            )));
        }
        let region = parse_region(params, regions)?;
        Ok(Self {
            region,
            name: name.to_owned(),
        })
    }
}

/// `GET /summoners` parameters.
#[derive(Debug, PartialEq, Eq)]
pub struct SummonersParams {
    /// Region code, upper-cased.
    pub region: String,
    /// Pagination cursor (availability date, epoch millis).
    pub timestamp: i64,
    /// Only names of this length, if set.
    pub name_length: Option<usize>,
    /// Page towards earlier availability dates.
    pub backwards: bool,
}
impl SummonersParams {
    /// Validates `?region=&timestamp=&nameLength=&backwards=`.
    pub fn parse(params: &Params, regions: &Regions) -> Result<Self> {
        let region = parse_region(params, regions)?;
        let invalid = |name: &str| Error::InvalidQuery(format!("Invalid '{}' query parameter", name));

        let timestamp = params
            .get("timestamp")
            .and_then(|t| t.parse::<i64>().ok())
            .filter(|&t| 0 < t)
            .ok_or_else(|| invalid("timestamp"))?;

        let name_length = match params.get("nameLength").filter(|s| !s.is_empty()) {
            None => None,
            Some(s) => Some(
                s.parse::<usize>()
                    .ok()
                    .filter(|len| NAME_LENGTHS.contains(len))
                    .ok_or_else(|| invalid("nameLength"))?,
            ),
        };

        let backwards = match params.get("backwards").filter(|s| !s.is_empty()) {
            None => false,
            Some(s) => parse_bool(s).ok_or_else(|| invalid("backwards"))?,
        };

        Ok(Self {
            region,
            timestamp,
            name_length,
            backwards,
        })
    }
}

fn parse_region(params: &Params, regions: &Regions) -> Result<String> {
    let region = params
        .get("region")
        .map(|r| r.to_uppercase())
        .unwrap_or_default();
    regions
        .validate(&region)
        .then_some(region)
        .ok_or_else(|| Error::InvalidRegion(params.get("region").cloned().unwrap_or_default()))
}

/// Accepts `1`, `t`, `T`, `TRUE`, `true`, `True` and their false counterparts.
fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Fetches a summoner from Riot and saves it. A failed save is logged but does not fail the
/// request.
pub async fn get_summoner<S, L>(
    summoners: &Summoners<S, L>,
    params: &Params,
) -> Result<SummonerRecord>
where
    S: KeyValueStore,
    L: SummonerLookup,
{
    let SummonerParams { region, name } = SummonerParams::parse(params, summoners.regions())?;
    let record = summoners.fetch(&region, &name).await.map_err(|e| {
        if !matches!(e, Error::NotFound { .. }) {
            log::error!("Error fetching summoner: {}", e);
        }
        e
    })?;
    match summoners.save(&record).await {
        Ok(()) => log::info!("Successfully saved summoner: {:?}", record),
        Err(e) => log::error!("Error saving summoner: {}", e),
    }
    Ok(record)
}

/// One page of stored summoners.
pub async fn get_summoners<S, L>(
    summoners: &Summoners<S, L>,
    params: &Params,
) -> Result<Vec<SummonerRecord>>
where
    S: KeyValueStore,
    L: SummonerLookup,
{
    let SummonersParams {
        region,
        timestamp,
        name_length,
        backwards,
    } = SummonersParams::parse(params, summoners.regions())?;
    let result = match name_length {
        None => {
            summoners
                .get_after(&region, PAGE_SIZE, timestamp, backwards)
                .await
        }
        Some(name_length) => {
            summoners
                .get_by_name_length(&region, PAGE_SIZE, name_length, timestamp, backwards)
                .await
        }
    };
    result.map_err(|e| {
        log::error!("Error listing summoners: {}", e);
        e
    })
}

/// `GET /summoner`
pub async fn summoner_get(req: Request, ctx: RouteContext<()>) -> worker::Result<Response> {
    let state = AppState::new(&ctx.env)?;
    let params = query_params(&req)?;
    let result = get_summoner(&state.summoners, &params).await;
    respond(result)?.with_cors(&state.cors)
}

/// `GET /summoners`
pub async fn summoners_get(req: Request, ctx: RouteContext<()>) -> worker::Result<Response> {
    let state = AppState::new(&ctx.env)?;
    let params = query_params(&req)?;
    let result = get_summoners(&state.summoners, &params).await;
    respond(result)?.with_cors(&state.cors)
}

fn query_params(req: &Request) -> worker::Result<Params> {
    Ok(req.url()?.query_pairs().into_owned().collect())
}

/// JSON body of error responses.
#[derive(Debug, serde::Serialize)]
pub struct ErrorBody {
    /// Client-facing message.
    pub message: String,
}

/// JSON response: the value on success, or an [`ErrorBody`] with the error's status.
pub fn respond<T: serde::Serialize>(result: Result<T>) -> worker::Result<Response> {
    match result {
        Ok(value) => Ok(Response::from_json(&value)?.with_status(StatusCode::OK.as_u16())),
        Err(e) => {
            let body = ErrorBody {
                message: e.public_message(),
            };
            Ok(Response::from_json(&body)?.with_status(e.status_code().as_u16()))
        }
    }
}
