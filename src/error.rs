//! Error taxonomy for the schedule pipeline.
//!
//! Everything under [`PipelineError`] is fatal and aborts the run. [`CacheError`]
//! is recoverable: the processing succeeded, only the publish failed, and the
//! next scheduled run will try again.

use thiserror::Error;

/// Required configuration is missing or unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// The source archive could not be downloaded.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid feed URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// The downloaded archive is corrupt or not laid out as expected.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("feed archive is not a readable zip: {0}")]
    Corrupt(#[source] zip::result::ZipError),

    #[error("member {0} not found in feed archive")]
    MissingMember(String),

    #[error("nested archive {member} is not a readable zip: {source}")]
    NestedCorrupt {
        member: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("failed to write extracted archive contents: {0}")]
    Io(#[from] std::io::Error),
}

/// A required table or column is absent, which means the upstream feed format changed.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("required file {0} is missing from the feed")]
    MissingFile(&'static str),

    #[error("{file} is missing required column {column}")]
    MissingColumn {
        file: &'static str,
        column: &'static str,
    },

    #[error("failed to open {file}: {source}")]
    Unreadable {
        file: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed row in {file}: {source}")]
    Malformed {
        file: &'static str,
        #[source]
        source: csv::Error,
    },
}

/// A fatal failure that aborts the run and is reported to the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("scratch directory error: {0}")]
    Io(#[from] std::io::Error),

    #[error("feed processing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PipelineError {
    /// Short category name, used in logs and trigger responses.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "config",
            PipelineError::Fetch(_) => "fetch",
            PipelineError::Archive(_) => "archive",
            PipelineError::Schema(_) => "schema",
            PipelineError::Io(_) => "io",
            PipelineError::Task(_) => "task",
        }
    }
}

/// Publishing to the cache failed. Logged and swallowed by the pipeline.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection failed: {0}")]
    Connection(String),

    #[error("cache write failed: {0}")]
    Write(String),

    #[error("failed to serialize schedules: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CacheError {
    pub fn kind(&self) -> &'static str {
        match self {
            CacheError::Connection(_) => "connection",
            CacheError::Write(_) | CacheError::Serialize(_) => "write",
        }
    }
}
