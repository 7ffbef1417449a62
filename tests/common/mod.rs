#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use gtfs_stop_cache::cache::CacheStore;
use gtfs_stop_cache::config::{Overrides, Settings};
use gtfs_stop_cache::error::CacheError;
use gtfs_stop_cache::fetch::HttpClient;
use zip::write::SimpleFileOptions;

pub const FEED_URL: &str = "http://feeds.test/gtfs.zip";

pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// GTFS text tables, editable per test before being packed.
#[derive(Clone)]
pub struct Feed {
    pub stops: String,
    pub stop_times: String,
    pub trips: String,
    pub routes: String,
    pub calendar_dates: String,
}

impl Feed {
    /// One Box Hill stop served by one trip on service `S1`, active on `date`.
    pub fn minimal(date: u32) -> Self {
        Self {
            stops: "stop_id,stop_name,stop_lat,stop_lon\n\
                    19905,Box Hill Interchange,-37.8193,145.1216\n"
                .to_string(),
            stop_times: "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
                         T1,08:14:00,08:15:00,19905,7\n"
                .to_string(),
            trips: "route_id,service_id,trip_id,trip_headsign,direction_id\n\
                    R903,S1,T1,Mordialloc,1\n"
                .to_string(),
            routes: "route_id,route_short_name,route_long_name\n\
                     R903,903,Altona - Mordialloc\n"
                .to_string(),
            calendar_dates: format!("service_id,date,exception_type\nS1,{date},1\n"),
        }
    }

    /// The statewide archive: the feed nested at `4/google_transit.zip`.
    pub fn archive(&self) -> Vec<u8> {
        let inner = zip_bytes(&[
            ("stops.txt", self.stops.as_bytes()),
            ("stop_times.txt", self.stop_times.as_bytes()),
            ("trips.txt", self.trips.as_bytes()),
            ("routes.txt", self.routes.as_bytes()),
            ("calendar_dates.txt", self.calendar_dates.as_bytes()),
        ]);
        zip_bytes(&[
            ("2/google_transit.zip", &b"metro trains live here"[..]),
            ("4/google_transit.zip", inner.as_slice()),
        ])
    }
}

/// Answers every request with the same status and body.
pub struct CannedClient {
    status: u16,
    body: Vec<u8>,
    calls: AtomicUsize,
}

impl CannedClient {
    pub fn ok(body: Vec<u8>) -> Self {
        Self::with_status(200, body)
    }

    pub fn with_status(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            body,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for CannedClient {
    async fn execute(&self, _req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let resp = http::Response::builder()
            .status(self.status)
            .body(self.body.clone())
            .unwrap();
        Ok(reqwest::Response::from(resp))
    }
}

/// In-memory cache that records pings and writes.
#[derive(Default)]
pub struct MemoryCache {
    pub unreachable: bool,
    pub pings: AtomicUsize,
    pub writes: Mutex<Vec<(String, String, Duration)>>,
}

impl MemoryCache {
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    pub fn last_write(&self) -> Option<(String, String, Duration)> {
        self.writes.lock().unwrap().last().cloned()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn ping(&self) -> Result<(), CacheError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            Err(CacheError::Connection("Connection refused (os error 111)".to_string()))
        } else {
            Ok(())
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.writes
            .lock()
            .unwrap()
            .push((key.to_string(), value.to_string(), ttl));
        Ok(())
    }
}

/// Points the feed at the canned client's URL and scratch at `scratch_root`.
pub fn overrides(scratch_root: &Path) -> Overrides {
    Overrides {
        feed_url: Some(FEED_URL.to_string()),
        scratch_root: Some(scratch_root.to_path_buf()),
        ..Default::default()
    }
}

/// An environment holding only `REDIS_URL`, if given.
pub fn env_with(redis_url: Option<&str>) -> impl Fn(&str) -> Option<String> {
    let redis_url = redis_url.map(str::to_string);
    move |name: &str| match name {
        "REDIS_URL" => redis_url.clone(),
        _ => None,
    }
}

pub fn settings(scratch_root: &Path) -> Settings {
    Settings::from_lookup(env_with(Some("redis://cache.test:6379")), &overrides(scratch_root)).unwrap()
}

pub fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}
