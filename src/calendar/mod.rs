//! Business calendar for SLA deadline computation.
//!
//! This module contains:
//! - CalendarEntry: Holiday / compensatory working-day records
//! - BusinessCalendar: Working-day arithmetic over a snapshot of entries

pub mod business;
pub mod entry;

// Re-export commonly used types
pub use business::{at_cutoff, BusinessCalendar};
pub use entry::{default_holidays, CalendarEntry, RECURRING_BASE_YEAR};
