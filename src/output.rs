//! Serialization of the schedule for the cache.

use tracing::debug;

use crate::schedule::ScheduleEntry;

/// Encodes entries as a JSON array of objects, one per entry, in order.
pub fn to_json(entries: &[ScheduleEntry]) -> serde_json::Result<String> {
    let json = serde_json::to_string(entries)?;
    debug!(entries = entries.len(), bytes = json.len(), "Serialized schedules");
    Ok(json)
}
