//! Join and projection.
//!
//! Stops matching the name filter are joined to stop times, trips and routes,
//! then restricted to active services. Every join is an inner join over a
//! hash index; rows without a partner at any stage are dropped.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::error::SchemaError;
use crate::tables::{Route, Stop, StopTime, Trip};

/// One scheduled departure from a matching stop. Field order is the output
/// column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleEntry {
    pub trip_id: String,
    pub stop_sequence: u32,
    pub route_id: String,
    pub route_short_name: String,
    pub route_long_name: String,
    pub direction_id: Option<u8>,
    pub service_id: String,
    pub trip_headsign: String,
    pub stop_name: String,
    pub stop_id: String,
    pub stop_lat: Option<f64>,
    pub stop_lon: Option<f64>,
    pub departure_time: String,
}

/// Case-insensitive substring match on stop names.
#[derive(Debug, Clone)]
pub struct StopNameFilter {
    needle: String,
}

impl StopNameFilter {
    pub fn new(needle: &str) -> Self {
        Self {
            needle: needle.to_lowercase(),
        }
    }

    /// A missing name never matches.
    pub fn matches(&self, name: Option<&str>) -> bool {
        name.is_some_and(|n| n.to_lowercase().contains(&self.needle))
    }
}

fn index_by<'a, T>(rows: &'a [T], key: impl Fn(&T) -> &str) -> HashMap<&'a str, Vec<&'a T>> {
    let mut index: HashMap<&'a str, Vec<&'a T>> = HashMap::new();
    for row in rows {
        index.entry(key(row)).or_default().push(row);
    }
    index
}

/// Builds the schedule for stops matching `filter` on `active` services,
/// sorted by `(route_short_name, departure_time)`.
///
/// Times are compared as raw strings, so `24:05:00` sorts after `23:59:00`.
/// The sort is stable; ties keep `stop_times` order.
pub fn join_schedules<I>(
    stops: &[Stop],
    stop_times: I,
    trips: &[Trip],
    routes: &[Route],
    active: &HashSet<String>,
    filter: &StopNameFilter,
) -> Result<Vec<ScheduleEntry>, SchemaError>
where
    I: IntoIterator<Item = Result<StopTime, SchemaError>>,
{
    let matched: Vec<Stop> = stops
        .iter()
        .filter(|s| filter.matches(s.stop_name.as_deref()))
        .cloned()
        .collect();
    let stops_by_id = index_by(&matched, |s| s.stop_id.as_str());
    let trips_by_id = index_by(trips, |t| t.trip_id.as_str());
    let routes_by_id = index_by(routes, |r| r.route_id.as_str());

    let mut visits = 0usize;
    let mut entries = Vec::new();

    for stop_time in stop_times {
        let stop_time = stop_time?;
        let Some(at_stop) = stops_by_id.get(stop_time.stop_id.as_str()) else {
            continue;
        };
        visits += 1;

        let Some(on_trip) = trips_by_id.get(stop_time.trip_id.as_str()) else {
            continue;
        };

        for stop in at_stop {
            for trip in on_trip {
                if !active.contains(&trip.service_id) {
                    continue;
                }
                let Some(on_route) = routes_by_id.get(trip.route_id.as_str()) else {
                    continue;
                };
                for route in on_route {
                    entries.push(project(stop, &stop_time, trip, route));
                }
            }
        }
    }

    debug!(
        matched_stops = matched.len(),
        visits,
        entries = entries.len(),
        "Joined schedules"
    );

    entries.sort_by(schedule_order);
    Ok(entries)
}

fn project(stop: &Stop, stop_time: &StopTime, trip: &Trip, route: &Route) -> ScheduleEntry {
    ScheduleEntry {
        trip_id: stop_time.trip_id.clone(),
        stop_sequence: stop_time.stop_sequence,
        route_id: route.route_id.clone(),
        route_short_name: route.route_short_name.clone(),
        route_long_name: route.route_long_name.clone(),
        direction_id: trip.direction_id,
        service_id: trip.service_id.clone(),
        trip_headsign: trip.trip_headsign.clone(),
        stop_name: stop.stop_name.clone().unwrap_or_default(),
        stop_id: stop.stop_id.clone(),
        stop_lat: stop.stop_lat,
        stop_lon: stop.stop_lon,
        departure_time: stop_time.departure_time.clone(),
    }
}

fn schedule_order(a: &ScheduleEntry, b: &ScheduleEntry) -> Ordering {
    a.route_short_name
        .cmp(&b.route_short_name)
        .then_with(|| a.departure_time.cmp(&b.departure_time))
}
