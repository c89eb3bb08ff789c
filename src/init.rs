//! Logging, configuration and state initialization.

use std::sync::Once;

use riven::reqwest::Client;
use secrecy::SecretString;
use web_sys::console;
use worker::{console_error, console_log, Cors, Env, Method};

use crate::regions::Regions;
use crate::riot::RiotHttpLookup;
use crate::store::d1::D1Store;
use crate::summoners::Summoners;
use crate::{Error, Result};

/// D1 database binding.
pub const BINDING_D1_DB: &str = "BINDING_D1_DB";
/// Queue binding for [`crate::webjob::Task`]s.
pub const BINDING_QUEUE_WEBJOB: &str = "BINDING_QUEUE_WEBJOB";
/// Default summoner table name.
pub const DEFAULT_TABLE: &str = "summoner";

/// Initialize [`log`] logging into Cloudflare's [`console`] logging system, if not already
/// initialized. The level is read from the `LOG_LEVEL` var, defaulting to `info`.
pub fn init_logging(env: &Env) {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        {
            fn hook(info: &std::panic::PanicInfo) {
                console_error!("{}", info);
            }
            std::panic::set_hook(Box::new(hook));
            console_log!("[panic hook set]");
        }
        {
            struct ConsoleLog;
            static LOG: ConsoleLog = ConsoleLog;
            impl log::Log for ConsoleLog {
                fn enabled(&self, metadata: &log::Metadata) -> bool {
                    metadata.level() <= log::max_level()
                }

                fn log(&self, record: &log::Record) {
                    if !self.enabled(record.metadata()) {
                        return;
                    }
                    let method = match record.level() {
                        log::Level::Error => console::error_1,
                        log::Level::Warn => console::warn_1,
                        log::Level::Info => console::info_1,
                        log::Level::Debug => console::debug_1,
                        log::Level::Trace => console::trace_1,
                    };
                    (method)(
                        &format!(
                            "[{} {}] {}",
                            record.level(),
                            record.module_path().unwrap_or("?"),
                            record.args()
                        )
                        .into(),
                    );
                }

                fn flush(&self) {}
            }
            let level = optional_envvar(env, "LOG_LEVEL")
                .map(|level| parse_level(&level))
                .unwrap_or(log::LevelFilter::Info);
            if log::set_logger(&LOG).is_ok() {
                log::set_max_level(level);
            }

            log::info!("logger set, level: {}", level);
        }
    });
}

fn parse_level(level: &str) -> log::LevelFilter {
    level.parse().unwrap_or_else(|_| {
        console_error!("Invalid `LOG_LEVEL` {:?}, using `info`.", level);
        log::LevelFilter::Info
    })
}

/// Configuration from the worker environment.
#[derive(Debug)]
pub struct Config {
    /// Summoner table name, `DB_TABLE`.
    pub table: String,
    /// Riot API key, secret `RIOT_API_TOKEN`.
    pub riot_api_token: SecretString,
    /// `CORS_ORIGINS`, comma separated.
    pub cors_origins: Vec<String>,
    /// `CORS_METHODS`, comma separated.
    pub cors_methods: Vec<String>,
}
impl Config {
    /// Reads the configuration from `env`.
    pub fn from_env(env: &Env) -> Result<Self> {
        Ok(Self {
            table: optional_envvar(env, "DB_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_owned()),
            riot_api_token: secret(env, "RIOT_API_TOKEN")?,
            cors_origins: split_list(&optional_envvar(env, "CORS_ORIGINS").unwrap_or_default()),
            cors_methods: split_list(&optional_envvar(env, "CORS_METHODS").unwrap_or_default()),
        })
    }

    /// CORS headers for HTTP responses.
    pub fn cors(&self) -> Cors {
        Cors::new()
            .with_origins(self.cors_origins.iter().cloned())
            .with_methods(
                self.cors_methods
                    .iter()
                    .map(|method| Method::from(method.to_ascii_uppercase())),
            )
            .with_allowed_headers(["*"])
    }
}

/// Production [`Summoners`].
pub type AppSummoners = Summoners<D1Store, RiotHttpLookup>;

/// Per-invocation state, built from [`Env`].
pub struct AppState {
    /// Record store.
    pub summoners: AppSummoners,
    /// CORS headers for HTTP responses.
    pub cors: Cors,
}
impl AppState {
    /// Reads the [`Config`] and builds the state.
    pub fn new(env: &Env) -> Result<Self> {
        let config = Config::from_env(env)?;
        let cors = config.cors();
        let db = env
            .d1(BINDING_D1_DB)
            .map_err(|e| Error::Config(format!("Missing D1 binding `{}`: {}", BINDING_D1_DB, e)))?;
        let store = D1Store::new(db, config.table)?;
        let lookup = RiotHttpLookup::new(Client::new(), config.riot_api_token);
        log::debug!("app state initialized");
        Ok(Self {
            summoners: Summoners::new(store, lookup, Regions::default()),
            cors,
        })
    }
}

/// Get an env var, if set.
pub fn optional_envvar(env: &Env, name: &str) -> Option<String> {
    env.var(name).ok().map(|v| v.to_string())
}
/// Get an env secret.
pub fn secret(env: &Env, name: &str) -> Result<SecretString> {
    env.secret(name)
        .map(|v| v.to_string().into())
        .map_err(|e| Error::Config(format!("Missing secret `{}`: {}", name, e)))
}

/// Splits a comma separated list, trimming whitespace and skipping empty items.
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}
