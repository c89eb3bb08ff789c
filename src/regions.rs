//! Player-facing region codes and their Riot API platform routes.

use std::collections::HashMap;

use riven::consts::PlatformRoute;

use crate::{Error, Result};

/// Regions supported by default.
pub const DEFAULT_REGIONS: [(&str, PlatformRoute); 5] = [
    ("NA", PlatformRoute::NA1),
    ("EUW", PlatformRoute::EUW1),
    ("EUNE", PlatformRoute::EUN1),
    ("OCE", PlatformRoute::OC1),
    ("LAS", PlatformRoute::LA2),
];

/// Lookup table from region code (`"NA"`) to [`PlatformRoute`] (`NA1`). Immutable once built.
#[derive(Clone, Debug)]
pub struct Regions {
    regions: HashMap<String, PlatformRoute>,
}
impl Default for Regions {
    fn default() -> Self {
        Self::with_regions(DEFAULT_REGIONS)
    }
}
impl Regions {
    /// Builds a directory from an explicit set of codes.
    pub fn with_regions<S: Into<String>>(
        regions: impl IntoIterator<Item = (S, PlatformRoute)>,
    ) -> Self {
        Self {
            regions: regions
                .into_iter()
                .map(|(code, route)| (code.into(), route))
                .collect(),
        }
    }

    /// If `code` is a supported region. Case-sensitive.
    pub fn validate(&self, code: &str) -> bool {
        self.regions.contains_key(code)
    }

    /// The platform route for `code`.
    pub fn translate(&self, code: &str) -> Result<PlatformRoute> {
        self.regions
            .get(code)
            .copied()
            .ok_or_else(|| Error::InvalidRegion(code.to_owned()))
    }

    /// All supported `(code, route)` pairs, in no particular order.
    pub fn list_all(&self) -> impl Iterator<Item = (&str, PlatformRoute)> + '_ {
        self.regions
            .iter()
            .map(|(code, &route)| (code.as_str(), route))
    }

    /// Number of supported regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// If no regions are supported.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Host label used by the Riot API for `route`, e.g. `na1`.
pub fn routing_host(route: PlatformRoute) -> String {
    route.to_string().to_ascii_lowercase()
}
