//! Background "webjob" refresh: a scheduled producer queues summoners which are due, and the
//! queue consumer refreshes each one from Riot.

use std::future::Future;

use crate::riot::SummonerLookup;
use crate::store::KeyValueStore;
use crate::summoners::Summoners;
use crate::{Error, Result};

/// Max summoners queued per region per refresh.
pub const REFRESH_LIMIT: u32 = 8000;

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// Enum of the possible tasks for the refresh queue.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Task {
    /// Re-fetch the summoner, saving it or deleting it if it no longer exists.
    UpdateSummoner {
        /// Region code.
        region: String,
        /// Summoner name.
        name: String,
    },
}

/// How far around "now" a refresh looks for summoners becoming available.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshWindow {
    /// +/- 3 days, cron `0 * * * *`.
    Hourly,
    /// +/- 30 days, cron `0 0 * * 1`.
    Weekly,
    /// +/- 90 days, cron `0 0 1 * *`.
    Monthly,
}
impl RefreshWindow {
    /// Window for a scheduled trigger's cron expression.
    pub fn from_cron(cron: &str) -> Option<Self> {
        match cron.trim() {
            "0 * * * *" => Some(Self::Hourly),
            "0 0 * * 1" => Some(Self::Weekly),
            "0 0 1 * *" => Some(Self::Monthly),
            _ => None,
        }
    }

    /// `(start, end)` epoch millis around `now`.
    pub fn bounds(self, now: i64) -> (i64, i64) {
        let days = match self {
            Self::Hourly => 3,
            Self::Weekly => 30,
            Self::Monthly => 90,
        };
        (now - days * DAY_MILLIS, now + days * DAY_MILLIS)
    }
}

/// Dispatches a [`Task::UpdateSummoner`] for every summoner, in every region, whose availability
/// date falls within `window` around `now`. Stops at the first error. Returns the number of tasks
/// dispatched.
pub async fn refresh<S, L, F, Fut>(
    summoners: &Summoners<S, L>,
    window: RefreshWindow,
    now: i64,
    mut dispatch: F,
) -> Result<usize>
where
    S: KeyValueStore,
    L: SummonerLookup,
    F: FnMut(Task) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let (start, end) = window.bounds(now);
    let mut count = 0;
    for (region, _) in summoners.regions().list_all() {
        let due = summoners
            .get_between_date(region, REFRESH_LIMIT, start, end)
            .await?;
        log::info!(
            "{:?} refresh: {} summoners due in region {}.",
            window,
            due.len(),
            region
        );
        for record in due {
            log::debug!("Queueing name: {}, region: {}", record.name, record.region);
            dispatch(Task::UpdateSummoner {
                region: region.to_owned(),
                name: record.name,
            })
            .await?;
            count += 1;
        }
    }
    Ok(count)
}

/// Result of handling a [`Task::UpdateSummoner`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Summoner re-fetched and saved.
    Saved,
    /// Summoner no longer exists and was deleted.
    Deleted,
}

/// Handle a `Task`.
pub async fn handle<S, L>(summoners: &Summoners<S, L>, task: &Task) -> Result<UpdateOutcome>
where
    S: KeyValueStore,
    L: SummonerLookup,
{
    match task {
        Task::UpdateSummoner { region, name } => update_summoner(summoners, region, name).await,
    }
}

/// Handle [`Task::UpdateSummoner`].
pub async fn update_summoner<S, L>(
    summoners: &Summoners<S, L>,
    region: &str,
    name: &str,
) -> Result<UpdateOutcome>
where
    S: KeyValueStore,
    L: SummonerLookup,
{
    match summoners.fetch(region, name).await {
        Ok(record) => {
            summoners.save(&record).await?;
            log::info!("Summoner '{}' updated in region '{}'.", record.name, region);
            Ok(UpdateOutcome::Saved)
        }
        Err(Error::NotFound { .. }) => {
            log::info!(
                "Summoner '{}' was not found in region '{}', deleting.",
                name,
                region
            );
            summoners.delete(region, name).await?;
            Ok(UpdateOutcome::Deleted)
        }
        Err(e) => Err(e),
    }
}
