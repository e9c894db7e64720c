//! Business calendar commands.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use clap::Subcommand;
use serde_json::json;

use super::{open_store, print_json};
use crate::calendar::{default_holidays, BusinessCalendar, CalendarEntry, RECURRING_BASE_YEAR};
use crate::store::WorkflowStore;

#[derive(Subcommand, Debug)]
pub enum CalendarCommands {
    /// Add a holiday, or a compensatory working day with --working
    Add {
        /// Date (YYYY-MM-DD)
        date: NaiveDate,

        #[arg(short, long, default_value = "Holiday")]
        name: String,

        /// Repeat on the same month/day every year
        #[arg(long, conflicts_with = "working")]
        recurring: bool,

        /// Declare a weekend day a working day
        #[arg(long)]
        working: bool,
    },

    /// Remove the entry stored for a date
    Remove {
        date: NaiveDate,

        /// Remove the recurring entry for this month/day instead
        #[arg(long)]
        recurring: bool,
    },

    /// List calendar entries
    List,

    /// Check whether a date is a working day
    Check { date: NaiveDate },

    /// Add N working days to a date
    AddDays { date: NaiveDate, days: u32 },

    /// Load the fixed-date national holidays
    Seed,
}

pub async fn execute(command: CalendarCommands) -> Result<()> {
    let store = open_store()?;

    match command {
        CalendarCommands::Add {
            date,
            name,
            recurring,
            working,
        } => {
            let entry = if working {
                CalendarEntry::working_day(date, name)
            } else if recurring {
                CalendarEntry::recurring_holiday(date.month(), date.day(), name)
                    .context("Invalid month/day for a recurring holiday")?
            } else {
                CalendarEntry::holiday(date, name)
            };

            store.upsert_calendar_entry(&entry).await?;
            print_json(&entry)
        }
        CalendarCommands::Remove { date, recurring } => {
            let date = if recurring {
                NaiveDate::from_ymd_opt(RECURRING_BASE_YEAR, date.month(), date.day())
                    .context("Invalid month/day for a recurring entry")?
            } else {
                date
            };

            if store.remove_calendar_entry(date).await? {
                eprintln!("Removed entry for {}", date);
            } else {
                eprintln!("No entry for {}", date);
            }
            Ok(())
        }
        CalendarCommands::List => {
            let mut entries = store.calendar_entries().await?;
            entries.sort_by_key(|e| (e.recurring, e.date));

            for e in entries {
                let kind = if e.is_working_day { "working" } else { "holiday" };
                let date = if e.recurring {
                    format!("every {}", e.date.format("%m-%d"))
                } else {
                    e.date.to_string()
                };
                println!("{:<12} {:<8} {}", date, kind, e.name);
            }
            Ok(())
        }
        CalendarCommands::Check { date } => {
            let calendar = BusinessCalendar::new(store.calendar_entries().await?);
            print_json(&json!({
                "date": date,
                "working_day": calendar.is_working_day(date),
                "entry": calendar.entry_for(date),
                "next_working_day": calendar.next_working_day(date),
            }))
        }
        CalendarCommands::AddDays { date, days } => {
            let calendar = BusinessCalendar::new(store.calendar_entries().await?);
            let result = calendar.add_working_days(date, days);
            print_json(&json!({ "start": date, "days": days, "result": result }))
        }
        CalendarCommands::Seed => {
            let seeded = seed_defaults(store.as_ref()).await?;
            eprintln!("Seeded {} recurring holidays", seeded);
            Ok(())
        }
    }
}

/// Upsert the default recurring holidays; returns how many were written
pub(crate) async fn seed_defaults(store: &dyn WorkflowStore) -> Result<usize> {
    let entries = default_holidays();
    for entry in &entries {
        store.upsert_calendar_entry(entry).await?;
    }
    Ok(entries.len())
}
