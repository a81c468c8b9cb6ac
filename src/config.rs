use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDate};
use chrono_tz::Tz;

use crate::error::AppError;
use crate::schedule::default_term_start;

/// Minutes before a course starts that its reminder fires.
pub const REMINDER_ADVANCE_RANGE: RangeInclusive<i64> = 1..=60;

pub const REMINDER_INTERVAL_RANGE: RangeInclusive<u64> = 1..=3600;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Term anchor used when none has been saved through the settings API.
    pub term_start: NaiveDate,
    /// TZID written into exported calendars.
    pub timezone: Tz,
    pub reminder_advance_minutes: i64,
    pub reminder_interval_secs: u64,
    pub ics_output_dir: PathBuf,
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let term_start = match env::var("TERM_START") {
            Ok(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
                AppError::BadRequest(format!("TERM_START must be YYYY-MM-DD: {}", e))
            })?,
            Err(_) => fallback_term_start()?,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://timetable.db".to_string()),
            bind_addr: parse_env("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)))?,
            term_start,
            timezone: parse_env("TIMEZONE", chrono_tz::Asia::Shanghai)?,
            reminder_advance_minutes: in_range(
                "REMINDER_ADVANCE_MINUTES",
                parse_env("REMINDER_ADVANCE_MINUTES", 15)?,
                REMINDER_ADVANCE_RANGE,
            )?,
            reminder_interval_secs: in_range(
                "REMINDER_INTERVAL_SECS",
                parse_env("REMINDER_INTERVAL_SECS", 60)?,
                REMINDER_INTERVAL_RANGE,
            )?,
            ics_output_dir: env::var("ICS_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("calendar")),
        })
    }

    /// Defaults for an in-memory setup anchored at `term_start`.
    pub fn local(term_start: NaiveDate) -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            term_start,
            timezone: chrono_tz::Asia::Shanghai,
            reminder_advance_minutes: 15,
            reminder_interval_secs: 60,
            ics_output_dir: PathBuf::from("calendar"),
        }
    }
}

fn fallback_term_start() -> Result<NaiveDate, AppError> {
    let year = Local::now().year();
    default_term_start(year)
        .ok_or_else(|| AppError::BadRequest(format!("no default term start for {}", year)))
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::BadRequest(format!("{} is invalid: {}", key, e))),
        Err(_) => Ok(default),
    }
}

fn in_range<T>(key: &str, value: T, range: RangeInclusive<T>) -> Result<T, AppError>
where
    T: PartialOrd + Display,
{
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(AppError::BadRequest(format!(
            "{} must be between {} and {}, got {}",
            key,
            range.start(),
            range.end(),
            value
        )))
    }
}
