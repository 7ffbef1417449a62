//! The end-to-end run: fetch, extract, load, filter, join, publish.

use std::collections::HashSet;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{Span, error, info, warn};

use crate::archive;
use crate::cache::{self, CacheStore, RedisCache};
use crate::config::{Overrides, Settings};
use crate::error::{CacheError, PipelineError};
use crate::fetch::{BasicClient, HttpClient, fetch_archive};
use crate::schedule::{ScheduleEntry, StopNameFilter, join_schedules};
use crate::scratch::ScratchDir;
use crate::tables::FeedTables;
use crate::window::{DateWindow, ServicePolicy, active_services};

/// How a run that did not hit a fatal error ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// No service runs today or tomorrow. Nothing was written to the cache.
    NoActiveService { window: DateWindow },
    Published { entries: usize },
    /// The schedule was built but could not be stored. The previous cache
    /// entry, if any, stays until it expires.
    PublishFailed { entries: usize, error: CacheError },
}

enum Processed {
    NoActiveService,
    Schedule(Vec<ScheduleEntry>),
}

/// What the blocking half of a run needs, owned so it can move to another thread.
struct FeedJob {
    member: String,
    filter: StopNameFilter,
    policy: ServicePolicy,
    window: DateWindow,
}

pub struct Pipeline<C, S> {
    settings: Settings,
    client: C,
    cache: S,
}

/// Builds the production HTTP client and Redis store for `settings`.
///
/// Neither does any I/O; a bad `REDIS_URL` is reported as a config error.
pub fn production_backends(settings: &Settings) -> Result<(BasicClient, RedisCache), PipelineError> {
    let cache = RedisCache::open(&settings.redis_url)?;
    let client = BasicClient::new(settings.fetch_timeout)?;
    Ok((client, cache))
}

/// Resolves settings through `lookup`, builds the backends and runs once.
///
/// Settings are resolved before anything else, so a missing `REDIS_URL`
/// fails without touching the network or the scratch root.
pub async fn run_once<F, B, C, S>(lookup: F, overrides: &Overrides, backends: B) -> Result<RunOutcome, PipelineError>
where
    F: Fn(&str) -> Option<String>,
    B: FnOnce(&Settings) -> Result<(C, S), PipelineError>,
    C: HttpClient,
    S: CacheStore,
{
    Pipeline::from_lookup(lookup, overrides, backends)?.run().await
}

impl<C: HttpClient, S: CacheStore> Pipeline<C, S> {
    pub fn new(settings: Settings, client: C, cache: S) -> Self {
        Self {
            settings,
            client,
            cache,
        }
    }

    /// Resolves settings through `lookup`, then hands them to `backends`.
    /// Fails before any I/O if the settings are unusable.
    pub fn from_lookup<F, B>(lookup: F, overrides: &Overrides, backends: B) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
        B: FnOnce(&Settings) -> Result<(C, S), PipelineError>,
    {
        let settings = Settings::from_lookup(lookup, overrides)?;
        let (client, cache) = backends(&settings)?;
        Ok(Self::new(settings, client, cache))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &S {
        &self.cache
    }

    pub async fn run(&self) -> Result<RunOutcome, PipelineError> {
        self.run_at(Utc::now()).await
    }

    /// Runs once as if the current time were `now`.
    ///
    /// Fatal errors are returned. A cache failure is logged and reported as
    /// [`RunOutcome::PublishFailed`]. The scratch directory is gone by the time
    /// this returns, on every path.
    #[tracing::instrument(skip(self), fields(feed = %self.settings.feed_url))]
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunOutcome, PipelineError> {
        let started = Instant::now();
        info!("Fetching today's and tomorrow's schedules");

        let result = self.run_inner(now).await;

        let elapsed_secs = started.elapsed().as_secs_f64();
        match &result {
            Ok(outcome) => info!(elapsed_secs, ?outcome, "Run finished"),
            Err(e) => error!(elapsed_secs, kind = e.kind(), error = %e, "Run failed"),
        }
        result
    }

    async fn run_inner(&self, now: DateTime<Utc>) -> Result<RunOutcome, PipelineError> {
        let scratch = ScratchDir::create(&self.settings.scratch_root)?;

        let archive = fetch_archive(&self.client, &self.settings.feed_url).await?;

        let window = DateWindow::for_instant(now, self.settings.timezone);
        info!(
            today = window.today,
            tomorrow = window.tomorrow,
            "Filtering for dates"
        );

        let job = FeedJob {
            member: self.settings.nested_member.clone(),
            filter: StopNameFilter::new(&self.settings.stop_filter),
            policy: self.settings.service_policy,
            window,
        };
        let span = Span::current();
        let processed = tokio::task::spawn_blocking(move || {
            span.in_scope(|| {
                let result = process_feed(&archive, &scratch, &job);
                if let Err(e) = scratch.close() {
                    warn!(error = %e, "Failed to remove scratch directory");
                }
                result
            })
        })
        .await??;

        let entries = match processed {
            Processed::NoActiveService => {
                info!("No services found running today or tomorrow");
                return Ok(RunOutcome::NoActiveService { window });
            }
            Processed::Schedule(entries) => entries,
        };
        info!(
            count = entries.len(),
            filter = %self.settings.stop_filter,
            "Found scheduled services"
        );

        match cache::publish(
            &self.cache,
            &self.settings.cache_key,
            &entries,
            self.settings.cache_ttl,
        )
        .await
        {
            Ok(()) => Ok(RunOutcome::Published {
                entries: entries.len(),
            }),
            Err(error) => {
                error!(kind = error.kind(), error = %error, "Cache publish failed");
                Ok(RunOutcome::PublishFailed {
                    entries: entries.len(),
                    error,
                })
            }
        }
    }
}

/// Extraction, loading and joining. All blocking file work.
fn process_feed(archive: &[u8], scratch: &ScratchDir, job: &FeedJob) -> Result<Processed, PipelineError> {
    let tables_dir = archive::extract_nested(archive, &job.member, scratch.path())?;
    let tables = FeedTables::load(&tables_dir)?;

    let active: HashSet<String> = active_services(&tables.calendar_dates, job.window, job.policy);
    if active.is_empty() {
        return Ok(Processed::NoActiveService);
    }

    let entries = join_schedules(
        &tables.stops,
        tables.stop_times()?,
        &tables.trips,
        &tables.routes,
        &active,
        &job.filter,
    )?;
    Ok(Processed::Schedule(entries))
}
