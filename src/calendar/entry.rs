//! Holiday and compensatory working-day records.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Year used to store recurring entries (leap year, so 02-29 is representable)
pub const RECURRING_BASE_YEAR: i32 = 2000;

/// One row of the business calendar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    /// Exact date, or any date carrying the month/day when `recurring`
    pub date: NaiveDate,

    /// Human-readable label, e.g. "Labour Day"
    pub name: String,

    /// Day off
    #[serde(default)]
    pub is_holiday: bool,

    /// Compensatory working day; always wins over `is_holiday` and weekends
    #[serde(default)]
    pub is_working_day: bool,

    /// Matches the same month/day every year
    #[serde(default)]
    pub recurring: bool,
}

impl CalendarEntry {
    pub fn holiday(date: NaiveDate, name: impl Into<String>) -> Self {
        Self {
            date,
            name: name.into(),
            is_holiday: true,
            is_working_day: false,
            recurring: false,
        }
    }

    /// Holiday repeating every year on `month`/`day`
    pub fn recurring_holiday(month: u32, day: u32, name: impl Into<String>) -> Option<Self> {
        let date = NaiveDate::from_ymd_opt(RECURRING_BASE_YEAR, month, day)?;
        Some(Self {
            date,
            name: name.into(),
            is_holiday: true,
            is_working_day: false,
            recurring: true,
        })
    }

    /// Weekend day declared a working day
    pub fn working_day(date: NaiveDate, name: impl Into<String>) -> Self {
        Self {
            date,
            name: name.into(),
            is_holiday: false,
            is_working_day: true,
            recurring: false,
        }
    }

    pub fn month_day(&self) -> (u32, u32) {
        (self.date.month(), self.date.day())
    }
}

/// Fixed-date national holidays, stored as recurring entries.
///
/// Lunar-calendar holidays move every year and must be loaded as exact dates.
pub fn default_holidays() -> Vec<CalendarEntry> {
    [
        (1, 1, "New Year's Day"),
        (4, 30, "Reunification Day"),
        (5, 1, "International Labour Day"),
        (9, 2, "National Day"),
    ]
    .into_iter()
    .filter_map(|(month, day, name)| CalendarEntry::recurring_holiday(month, day, name))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_holidays_are_recurring() {
        let seed = default_holidays();
        assert_eq!(seed.len(), 4);
        assert!(seed.iter().all(|e| e.recurring && e.is_holiday));
        assert!(seed.iter().any(|e| e.month_day() == (9, 2)));
    }

    #[test]
    fn test_recurring_feb_29_is_representable() {
        let entry = CalendarEntry::recurring_holiday(2, 29, "Leap Day").unwrap();
        assert_eq!(entry.month_day(), (2, 29));
        assert!(CalendarEntry::recurring_holiday(2, 30, "Nope").is_none());
    }
}
