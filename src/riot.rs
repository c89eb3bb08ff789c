//! Riot API `summoner-v4` access.

use http::StatusCode;
use riven::consts::PlatformRoute;
use riven::reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::regions::routing_host;
use crate::{Error, Result};

/// Riot API token header.
pub const RIOT_TOKEN_HEADER: &str = "X-Riot-Token";

/// GET `/lol/summoner/v4/summoners/by-name/{summonerName}`
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiotSummoner {
    /// Encrypted account ID.
    pub account_id: String,
    /// Profile icon ID.
    pub profile_icon_id: i64,
    /// Last modification of the summoner (epoch milliseconds).
    pub revision_date: i64,
    /// Summoner name.
    pub name: String,
    /// Summoner level.
    pub summoner_level: i64,
    // Also `id`, `puuid`.
}

/// Undecoded response from the lookup endpoint.
#[derive(Clone, Debug)]
pub struct LookupResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Response body text.
    pub body: String,
}

/// Looks up a summoner by name. Transport failures are [`Error::ExternalService`] without a
/// status; any received response, successful or not, is returned as-is.
#[allow(async_fn_in_trait)]
pub trait SummonerLookup {
    /// Requests the summoner `name` on `route`.
    async fn get_by_name(&self, route: PlatformRoute, name: &str) -> Result<LookupResponse>;
}

/// [`SummonerLookup`] calling the Riot API over HTTPS.
pub struct RiotHttpLookup {
    client: Client,
    api_key: SecretString,
}
impl RiotHttpLookup {
    /// Creates the client, authenticating with `api_key`.
    pub fn new(client: Client, api_key: SecretString) -> Self {
        Self { client, api_key }
    }
}

impl SummonerLookup for RiotHttpLookup {
    async fn get_by_name(&self, route: PlatformRoute, name: &str) -> Result<LookupResponse> {
        let url = summoner_url(route, name)?;
        log::debug!("GET {}", url);
        let transport_error = |e: riven::reqwest::Error| Error::ExternalService {
            status: None,
            message: format!("Request to `{}` failed: {}", url, e),
        };
        let response = self
            .client
            .get(url.clone())
            .header(RIOT_TOKEN_HEADER, self.api_key.expose_secret())
            .send()
            .await
            .map_err(transport_error)?;
        let status = StatusCode::from_u16(response.status().as_u16()).map_err(|e| {
            Error::ExternalService {
                status: None,
                message: format!("Invalid status from `{}`: {}", url, e),
            }
        })?;
        let body = response.text().await.map_err(transport_error)?;
        Ok(LookupResponse { status, body })
    }
}

/// URL of the by-name endpoint. `name` is percent-encoded as a path segment.
pub fn summoner_url(route: PlatformRoute, name: &str) -> Result<Url> {
    let mut url = Url::parse(&format!("https://{}.api.riotgames.com/", routing_host(route)))
        .map_err(|e| Error::Config(format!("Invalid Riot API url: {}", e)))?;
    url.path_segments_mut()
        .map_err(|()| Error::Config("Riot API url cannot be a base".to_owned()))?
        .pop_if_empty()
        .extend(["lol", "summoner", "v4", "summoners", "by-name", name]);
    Ok(url)
}
