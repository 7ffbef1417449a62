//! Fetches a GTFS feed, narrows it to one stop cluster's schedule for today and
//! tomorrow, and publishes the result to a cache with an expiry.

pub mod archive;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod output;
pub mod pipeline;
pub mod schedule;
pub mod scratch;
pub mod tables;
pub mod trigger;
pub mod window;
