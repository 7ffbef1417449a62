//! Run configuration.
//!
//! The cache connection string only ever comes from the environment and has no
//! default. Everything else has a built-in default that can be overridden on
//! the command line or through the environment variables named on [`Overrides`].

use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;

use crate::error::ConfigError;
use crate::window::ServicePolicy;

pub const DEFAULT_FEED_URL: &str = "https://opendata.transport.vic.gov.au/dataset/3f4e292e-7f8a-4ffe-831f-1953be0fe448/resource/e4966d78-dc64-4a1d-a751-2470c9eaf034/download/gtfs.zip";

/// Location of the bus feed inside the statewide archive.
pub const DEFAULT_NESTED_MEMBER: &str = "4/google_transit.zip";

pub const DEFAULT_STOP_FILTER: &str = "Box Hill";

pub const DEFAULT_CACHE_KEY: &str = "schedules:box_hill:today_and_tomorrow";

/// 25 hours, so a missed daily run still leaves yesterday's entry readable.
pub const CACHE_TTL: Duration = Duration::from_secs(90_000);

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

pub const FEED_TIMEZONE: Tz = chrono_tz::Australia::Melbourne;

pub const REDIS_URL_VAR: &str = "REDIS_URL";
pub const CRON_SECRET_VAR: &str = "CRON_SECRET";

/// Optional overrides for the built-in defaults.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct Overrides {
    /// URL of the outer GTFS archive
    #[arg(long, env = "GTFS_FEED_URL")]
    pub feed_url: Option<String>,

    /// Path of the nested archive inside the outer one
    #[arg(long)]
    pub nested_member: Option<String>,

    /// Case-insensitive substring a stop name must contain
    #[arg(long, env = "STOP_NAME_FILTER")]
    pub stop_filter: Option<String>,

    /// Cache key the schedules are stored under
    #[arg(long)]
    pub cache_key: Option<String>,

    /// Which calendar_dates exception types count as running service
    #[arg(long, value_enum)]
    pub service_policy: Option<ServicePolicy>,

    /// Directory under which per-run scratch directories are created
    #[arg(long, env = "SCRATCH_ROOT")]
    pub scratch_root: Option<PathBuf>,
}

/// Fully resolved settings for one pipeline.
#[derive(Debug, Clone)]
pub struct Settings {
    pub redis_url: String,
    pub feed_url: String,
    pub nested_member: String,
    pub stop_filter: String,
    pub cache_key: String,
    pub cache_ttl: Duration,
    pub timezone: Tz,
    pub service_policy: ServicePolicy,
    pub scratch_root: PathBuf,
    pub fetch_timeout: Duration,
    pub cron_secret: Option<String>,
}

impl Settings {
    /// Resolves settings using `lookup` in place of the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] when `REDIS_URL` is unset or blank,
    /// and [`ConfigError::Invalid`] for an empty stop filter or cache key.
    pub fn from_lookup<F>(lookup: F, overrides: &Overrides) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let redis_url = non_blank(lookup(REDIS_URL_VAR)).ok_or(ConfigError::MissingVar(REDIS_URL_VAR))?;
        let cron_secret = non_blank(lookup(CRON_SECRET_VAR));

        let stop_filter = overrides
            .stop_filter
            .clone()
            .unwrap_or_else(|| DEFAULT_STOP_FILTER.to_string());
        if stop_filter.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "stop_filter",
                reason: "must not be empty".to_string(),
            });
        }

        let cache_key = overrides
            .cache_key
            .clone()
            .unwrap_or_else(|| DEFAULT_CACHE_KEY.to_string());
        if cache_key.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "cache_key",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(Self {
            redis_url,
            feed_url: overrides
                .feed_url
                .clone()
                .unwrap_or_else(|| DEFAULT_FEED_URL.to_string()),
            nested_member: overrides
                .nested_member
                .clone()
                .unwrap_or_else(|| DEFAULT_NESTED_MEMBER.to_string()),
            stop_filter,
            cache_key,
            cache_ttl: CACHE_TTL,
            timezone: FEED_TIMEZONE,
            service_policy: overrides.service_policy.unwrap_or_default(),
            scratch_root: overrides
                .scratch_root
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            fetch_timeout: FETCH_TIMEOUT,
            cron_secret,
        })
    }
}

/// Reads `name` from the process environment. Pass to [`Settings::from_lookup`].
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
