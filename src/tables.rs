//! GTFS table loading.
//!
//! Each table is validated against the columns the join needs before any row
//! is read, so a renamed or dropped column surfaces as a [`SchemaError`] naming
//! it rather than as a deserialization failure deep in the file.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use csv::{DeserializeRecordsIntoIter, Reader, ReaderBuilder, Trim};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::SchemaError;

pub const STOPS: &str = "stops.txt";
pub const STOP_TIMES: &str = "stop_times.txt";
pub const TRIPS: &str = "trips.txt";
pub const ROUTES: &str = "routes.txt";
pub const CALENDAR_DATES: &str = "calendar_dates.txt";

const STOP_COLUMNS: &[&str] = &["stop_id", "stop_name", "stop_lat", "stop_lon"];
const STOP_TIME_COLUMNS: &[&str] = &["trip_id", "stop_id", "stop_sequence", "departure_time"];
const TRIP_COLUMNS: &[&str] = &[
    "trip_id",
    "route_id",
    "service_id",
    "trip_headsign",
    "direction_id",
];
const ROUTE_COLUMNS: &[&str] = &["route_id", "route_short_name", "route_long_name"];
const CALENDAR_DATE_COLUMNS: &[&str] = &["service_id", "date", "exception_type"];

/// A row of `stops.txt`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Stop {
    pub stop_id: String,
    /// Empty in the feed deserializes to `None`; such stops never match a filter.
    pub stop_name: Option<String>,
    pub stop_lat: Option<f64>,
    pub stop_lon: Option<f64>,
}

/// A row of `stop_times.txt`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StopTime {
    pub trip_id: String,
    pub stop_id: String,
    pub stop_sequence: u32,
    /// Raw `HH:MM:SS`; may run past 24:00:00 for trips that cross midnight.
    pub departure_time: String,
}

/// A row of `trips.txt`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Trip {
    pub trip_id: String,
    pub route_id: String,
    pub service_id: String,
    pub trip_headsign: String,
    pub direction_id: Option<u8>,
}

/// A row of `routes.txt`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Route {
    pub route_id: String,
    pub route_short_name: String,
    pub route_long_name: String,
}

/// A row of `calendar_dates.txt`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceException {
    pub service_id: String,
    /// `YYYYMMDD`
    pub date: u32,
    /// 1 = service added on `date`, 2 = service removed.
    pub exception_type: u8,
}

/// The small tables, held in memory. `stop_times.txt` is streamed on demand
/// through [`FeedTables::stop_times`] since it dwarfs the others.
#[derive(Debug)]
pub struct FeedTables {
    dir: PathBuf,
    pub stops: Vec<Stop>,
    pub trips: Vec<Trip>,
    pub routes: Vec<Route>,
    pub calendar_dates: Vec<ServiceException>,
}

impl FeedTables {
    /// Loads the tables from an extracted feed directory.
    ///
    /// `stop_times.txt` is opened and its header checked here too, so every
    /// schema problem is reported before any joining starts.
    #[tracing::instrument(skip_all, fields(dir = %dir.display()))]
    pub fn load(dir: &Path) -> Result<Self, SchemaError> {
        let stops: Vec<Stop> = read_table(dir, STOPS, STOP_COLUMNS)?;
        let trips: Vec<Trip> = read_table(dir, TRIPS, TRIP_COLUMNS)?;
        let routes: Vec<Route> = read_table(dir, ROUTES, ROUTE_COLUMNS)?;
        let calendar_dates: Vec<ServiceException> =
            read_table(dir, CALENDAR_DATES, CALENDAR_DATE_COLUMNS)?;
        open_table(dir, STOP_TIMES, STOP_TIME_COLUMNS)?;

        info!(
            stops = stops.len(),
            trips = trips.len(),
            routes = routes.len(),
            calendar_dates = calendar_dates.len(),
            "Loaded feed tables"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            stops,
            trips,
            routes,
            calendar_dates,
        })
    }

    /// Streams `stop_times.txt` row by row.
    pub fn stop_times(&self) -> Result<StopTimeRows, SchemaError> {
        let reader = open_table(&self.dir, STOP_TIMES, STOP_TIME_COLUMNS)?;
        Ok(StopTimeRows {
            inner: reader.into_deserialize(),
        })
    }
}

/// Iterator over `stop_times.txt` rows.
pub struct StopTimeRows {
    inner: DeserializeRecordsIntoIter<File, StopTime>,
}

impl Iterator for StopTimeRows {
    type Item = Result<StopTime, SchemaError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|row| {
            row.map_err(|source| SchemaError::Malformed {
                file: STOP_TIMES,
                source,
            })
        })
    }
}

/// Reads every row of `file` into `T` after checking `required` columns.
pub fn read_table<T: DeserializeOwned>(
    dir: &Path,
    file: &'static str,
    required: &[&'static str],
) -> Result<Vec<T>, SchemaError> {
    let mut reader = open_table(dir, file, required)?;
    let rows = reader
        .deserialize()
        .map(|row| row.map_err(|source| SchemaError::Malformed { file, source }))
        .collect::<Result<Vec<T>, _>>()?;
    debug!(file, rows = rows.len(), "Read table");
    Ok(rows)
}

fn open_table(
    dir: &Path,
    file: &'static str,
    required: &[&'static str],
) -> Result<Reader<File>, SchemaError> {
    let handle = File::open(dir.join(file)).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => SchemaError::MissingFile(file),
        _ => SchemaError::Unreadable { file, source },
    })?;

    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(handle);
    let headers = reader
        .headers()
        .map_err(|source| SchemaError::Malformed { file, source })?;

    if let Some(column) = required
        .iter()
        .copied()
        .find(|column| !headers.iter().any(|h| h == *column))
    {
        return Err(SchemaError::MissingColumn { file, column });
    }

    Ok(reader)
}
