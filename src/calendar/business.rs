//! Working-day arithmetic over a snapshot of calendar entries.
//!
//! Rules:
//! - Saturday and Sunday are days off unless an entry marks them working
//! - A weekday is working unless an entry marks it a holiday
//! - `is_working_day` on an entry always wins over `is_holiday`
//! - Exact-date entries take precedence over recurring ones
//! - Dates with no entry fall back to the weekday rule

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use tracing::warn;

use super::entry::CalendarEntry;

/// Longest run of consecutive days off tolerated before the walk gives up
/// and counts the day anyway.
const MAX_CONSECUTIVE_DAYS_OFF: u32 = 400;

/// Immutable calendar snapshot
#[derive(Debug, Clone, Default)]
pub struct BusinessCalendar {
    exact: HashMap<NaiveDate, CalendarEntry>,
    recurring: HashMap<(u32, u32), CalendarEntry>,
}

impl BusinessCalendar {
    pub fn new(entries: impl IntoIterator<Item = CalendarEntry>) -> Self {
        let mut calendar = Self::default();
        for entry in entries {
            if entry.recurring {
                calendar.recurring.insert(entry.month_day(), entry);
            } else {
                calendar.exact.insert(entry.date, entry);
            }
        }
        calendar
    }

    /// Calendar with no entries: plain Monday to Friday
    pub fn weekdays_only() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.recurring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry governing `date`, if any
    pub fn entry_for(&self, date: NaiveDate) -> Option<&CalendarEntry> {
        self.exact
            .get(&date)
            .or_else(|| self.recurring.get(&(date.month(), date.day())))
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        if let Some(entry) = self.entry_for(date) {
            if entry.is_working_day {
                return true;
            }
            if entry.is_holiday {
                return false;
            }
        }

        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// First working day strictly after `date`
    pub fn next_working_day(&self, date: NaiveDate) -> NaiveDate {
        self.add_working_days(date, 1)
    }

    /// The `n`th working day strictly after `start`.
    ///
    /// `n == 0` returns `start` when it is a working day, otherwise the next
    /// working day.
    pub fn add_working_days(&self, start: NaiveDate, n: u32) -> NaiveDate {
        if n == 0 {
            if self.is_working_day(start) {
                return start;
            }
            return self.next_working_day(start);
        }

        let mut current = start;
        let mut counted = 0;
        let mut days_off = 0;

        while counted < n {
            current = match current.succ_opt() {
                Some(next) => next,
                None => return current,
            };

            if self.is_working_day(current) {
                counted += 1;
                days_off = 0;
            } else {
                days_off += 1;
                if days_off > MAX_CONSECUTIVE_DAYS_OFF {
                    warn!(
                        date = %current,
                        "calendar has no working day for over a year, counting day anyway"
                    );
                    counted += 1;
                    days_off = 0;
                }
            }
        }

        current
    }

    /// Working days in the half-open range `(from, to]`
    pub fn count_working_days(&self, from: NaiveDate, to: NaiveDate) -> u32 {
        from.iter_days()
            .skip(1)
            .take_while(|day| *day <= to)
            .filter(|day| self.is_working_day(*day))
            .count() as u32
    }
}

/// `date` at `hour`:00 UTC, the point an SLA deadline falls due
pub fn at_cutoff(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&date.and_time(time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::default_holidays;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_weekends_are_days_off() {
        let cal = BusinessCalendar::weekdays_only();
        assert!(cal.is_working_day(d(2026, 10, 16))); // Friday
        assert!(!cal.is_working_day(d(2026, 10, 17)));
        assert!(!cal.is_working_day(d(2026, 10, 18)));
        assert!(cal.is_working_day(d(2026, 10, 19)));
    }

    #[test]
    fn test_friday_plus_one_is_monday() {
        let cal = BusinessCalendar::weekdays_only();
        assert_eq!(cal.add_working_days(d(2026, 10, 16), 1), d(2026, 10, 19));
    }

    #[test]
    fn test_zero_days() {
        let cal = BusinessCalendar::weekdays_only();
        assert_eq!(cal.add_working_days(d(2026, 10, 14), 0), d(2026, 10, 14));
        // Saturday rolls to Monday
        assert_eq!(cal.add_working_days(d(2026, 10, 17), 0), d(2026, 10, 19));
    }

    #[test]
    fn test_compensatory_saturday_counts() {
        let cal = BusinessCalendar::new(vec![CalendarEntry::working_day(
            d(2026, 10, 17),
            "Make-up day",
        )]);
        assert!(cal.is_working_day(d(2026, 10, 17)));
        assert_eq!(cal.add_working_days(d(2026, 10, 16), 1), d(2026, 10, 17));
    }

    #[test]
    fn test_working_override_beats_holiday() {
        let mut entry = CalendarEntry::holiday(d(2026, 3, 4), "Conflicting");
        entry.is_working_day = true;
        let cal = BusinessCalendar::new(vec![entry]);
        assert!(cal.is_working_day(d(2026, 3, 4)));
    }

    #[test]
    fn test_recurring_matches_every_year() {
        let cal = BusinessCalendar::new(default_holidays());
        for year in [2024, 2025, 2031] {
            assert!(!cal.is_working_day(d(year, 1, 1)));
            assert!(cal.entry_for(d(year, 1, 1)).is_some());
        }
    }

    #[test]
    fn test_exact_entry_matches_one_date() {
        let cal = BusinessCalendar::new(vec![CalendarEntry::holiday(d(2026, 2, 17), "Tet")]);
        assert!(!cal.is_working_day(d(2026, 2, 17)));
        assert!(cal.is_working_day(d(2027, 2, 17)));
    }

    #[test]
    fn test_exact_entry_wins_over_recurring() {
        let mut entries = default_holidays();
        entries.push(CalendarEntry::working_day(d(2026, 9, 2), "Moved holiday"));
        let cal = BusinessCalendar::new(entries);

        assert!(cal.is_working_day(d(2026, 9, 2)));
        assert!(!cal.is_working_day(d(2027, 9, 2)));
    }

    #[test]
    fn test_recurring_leap_day_only_in_leap_years() {
        let entry = CalendarEntry::recurring_holiday(2, 29, "Leap Day").unwrap();
        let cal = BusinessCalendar::new(vec![entry]);

        // 2028-02-29 is a Tuesday
        assert!(!cal.is_working_day(d(2028, 2, 29)));
        // 2027-02-28 and 2027-03-01 are unaffected
        assert!(cal.is_working_day(d(2027, 3, 1)));
        assert!(cal.entry_for(d(2027, 2, 28)).is_none());
    }

    #[test]
    fn test_holiday_skipped_when_adding() {
        // Wed 2026-04-29, holidays Thu 04-30 and Fri 05-01
        let cal = BusinessCalendar::new(default_holidays());
        assert_eq!(cal.add_working_days(d(2026, 4, 29), 1), d(2026, 5, 4));
        assert_eq!(cal.next_working_day(d(2026, 4, 29)), d(2026, 5, 4));
    }

    #[test]
    fn test_count_working_days() {
        let cal = BusinessCalendar::weekdays_only();
        // (Fri, next Fri] = Mon..Fri
        assert_eq!(cal.count_working_days(d(2026, 10, 16), d(2026, 10, 23)), 5);
        assert_eq!(cal.count_working_days(d(2026, 10, 16), d(2026, 10, 16)), 0);
        assert_eq!(cal.count_working_days(d(2026, 10, 23), d(2026, 10, 16)), 0);
    }

    #[test]
    fn test_add_then_count_agree() {
        let cal = BusinessCalendar::new(default_holidays());
        let start = d(2026, 4, 27);
        let end = cal.add_working_days(start, 7);
        assert_eq!(cal.count_working_days(start, end), 7);
    }

    #[test]
    fn test_at_cutoff() {
        let deadline = at_cutoff(d(2026, 10, 19), 17);
        assert_eq!(deadline.to_rfc3339(), "2026-10-19T17:00:00+00:00");
    }
}
