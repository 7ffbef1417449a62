//! The two-day service window.
//!
//! "Today" is the calendar date in the feed's time zone at the moment of the
//! run, not in UTC: a run at 23:30 UTC is already the next morning in Melbourne.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::tables::ServiceException;

/// `exception_type` value marking service added on a date.
pub const SERVICE_ADDED: u8 = 1;

/// Which `calendar_dates` rows count as running service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ServicePolicy {
    /// Only `exception_type == 1`. Type 2 marks a service removed on that date.
    #[default]
    AddedOnly,
    /// Any exception on a window date, regardless of type.
    AnyException,
}

impl ServicePolicy {
    pub fn admits(self, exception_type: u8) -> bool {
        match self {
            ServicePolicy::AddedOnly => exception_type == SERVICE_ADDED,
            ServicePolicy::AnyException => true,
        }
    }
}

/// Today and tomorrow as `YYYYMMDD` integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub today: u32,
    pub tomorrow: u32,
}

impl DateWindow {
    /// The window containing `now`, as seen on a wall clock in `tz`.
    pub fn for_instant(now: DateTime<Utc>, tz: Tz) -> Self {
        Self::starting(now.with_timezone(&tz).date_naive())
    }

    pub fn starting(today: NaiveDate) -> Self {
        let tomorrow = today.succ_opt().unwrap_or(today);
        Self {
            today: yyyymmdd(today),
            tomorrow: yyyymmdd(tomorrow),
        }
    }

    pub fn contains(&self, date: u32) -> bool {
        date == self.today || date == self.tomorrow
    }
}

fn yyyymmdd(date: NaiveDate) -> u32 {
    date.year() as u32 * 10_000 + date.month() * 100 + date.day()
}

/// Service IDs with an admitted exception on either window date.
pub fn active_services(
    exceptions: &[ServiceException],
    window: DateWindow,
    policy: ServicePolicy,
) -> HashSet<String> {
    let active: HashSet<String> = exceptions
        .iter()
        .filter(|e| window.contains(e.date) && policy.admits(e.exception_type))
        .map(|e| e.service_id.clone())
        .collect();
    debug!(
        today = window.today,
        tomorrow = window.tomorrow,
        ?policy,
        active = active.len(),
        "Selected active services"
    );
    active
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Australia::Melbourne;

    fn exception(service_id: &str, date: u32, exception_type: u8) -> ServiceException {
        ServiceException {
            service_id: service_id.to_string(),
            date,
            exception_type,
        }
    }

    #[test]
    fn test_window_uses_feed_timezone() {
        // 14:30 UTC on 30 June is 00:30 on 1 July in Melbourne (UTC+10).
        let now = Utc.with_ymd_and_hms(2024, 6, 30, 14, 30, 0).unwrap();
        let window = DateWindow::for_instant(now, Melbourne);
        assert_eq!(
            window,
            DateWindow {
                today: 20240701,
                tomorrow: 20240702,
            }
        );
    }

    #[test]
    fn test_window_before_local_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 6, 30, 13, 30, 0).unwrap();
        let window = DateWindow::for_instant(now, Melbourne);
        assert_eq!(window.today, 20240630);
        assert_eq!(window.tomorrow, 20240701);
    }

    #[test]
    fn test_window_crosses_year_in_daylight_time() {
        // AEDT is UTC+11, so 13:30 UTC on New Year's Eve is already 2025 locally.
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 13, 30, 0).unwrap();
        let window = DateWindow::for_instant(now, Melbourne);
        assert_eq!(window.today, 20250101);
        assert_eq!(window.tomorrow, 20250102);

        let earlier = Utc.with_ymd_and_hms(2024, 12, 31, 12, 30, 0).unwrap();
        let window = DateWindow::for_instant(earlier, Melbourne);
        assert_eq!(window.today, 20241231);
        assert_eq!(window.tomorrow, 20250101);
    }

    #[test]
    fn test_leap_day() {
        let window = DateWindow::starting(NaiveDate::from_ymd_opt(2024, 2, 28).unwrap());
        assert_eq!(window.tomorrow, 20240229);
        assert!(window.contains(20240228));
        assert!(!window.contains(20240301));
    }

    #[test]
    fn test_added_only_excludes_removed_service() {
        let window = DateWindow::starting(NaiveDate::from_ymd_opt(2024, 10, 17).unwrap());
        let rows = vec![
            exception("weekday", 20241017, 1),
            exception("weekend", 20241018, 1),
            exception("cancelled", 20241017, 2),
            exception("next_week", 20241024, 1),
        ];

        let active = active_services(&rows, window, ServicePolicy::AddedOnly);

        let mut ids: Vec<_> = active.into_iter().collect();
        ids.sort();
        assert_eq!(ids, vec!["weekday", "weekend"]);
    }

    #[test]
    fn test_any_exception_includes_removed_service() {
        let window = DateWindow::starting(NaiveDate::from_ymd_opt(2024, 10, 17).unwrap());
        let rows = vec![
            exception("cancelled", 20241017, 2),
            exception("next_week", 20241024, 1),
        ];

        let active = active_services(&rows, window, ServicePolicy::AnyException);
        assert_eq!(active.len(), 1);
        assert!(active.contains("cancelled"));
    }

    #[test]
    fn test_no_rows_in_window_is_empty() {
        let window = DateWindow::starting(NaiveDate::from_ymd_opt(2024, 12, 25).unwrap());
        let rows = vec![exception("weekday", 20241224, 1)];
        assert!(active_services(&rows, window, ServicePolicy::AddedOnly).is_empty());
    }
}
