pub mod ics;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveTime};
use serde::Serialize;
use tracing::info;

use crate::error::AppError;
use crate::models::{Course, hhmm};
use crate::schedule::{ScheduleError, occurrences};

pub use ics::{IcsOptions, render_calendar};

/// One concrete meeting of a course, ready to be written to a calendar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarEvent {
    pub course_id: i64,
    pub week: u32,
    pub summary: String,
    pub location: String,
    pub description: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

/// Expand courses into dated events, ordered by date then start time.
pub fn resolve_events(
    courses: &[Course],
    term_start: NaiveDate,
    only_week: Option<u32>,
) -> Result<Vec<CalendarEvent>, ScheduleError> {
    let mut events = Vec::new();

    for course in courses {
        let description = match &course.description {
            Some(text) => format!("教师：{}\n{}", course.teacher, text),
            None => format!("教师：{}", course.teacher),
        };

        for occurrence in occurrences(course, term_start, only_week)? {
            events.push(CalendarEvent {
                course_id: course.id,
                week: occurrence.week,
                summary: course.name.clone(),
                location: course.room.clone(),
                description: description.clone(),
                date: occurrence.date,
                start: course.start_time,
                end: course.end_time,
            });
        }
    }

    events.sort_by_key(|e| (e.date, e.start, e.course_id));
    Ok(events)
}

/// External calendar that receives resolved events.
#[async_trait]
pub trait CalendarSink: Send + Sync {
    /// Returns how many events were accepted.
    async fn push_events(&self, events: &[CalendarEvent]) -> Result<usize, AppError>;
}

/// Writes each pushed batch to a timestamped `.ics` file for the system
/// calendar to import.
pub struct IcsFileSink {
    dir: PathBuf,
    options: IcsOptions,
}

impl IcsFileSink {
    pub fn new(dir: impl Into<PathBuf>, options: IcsOptions) -> Self {
        Self {
            dir: dir.into(),
            options,
        }
    }
}

#[async_trait]
impl CalendarSink for IcsFileSink {
    async fn push_events(&self, events: &[CalendarEvent]) -> Result<usize, AppError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let filename = format!("schedule_{}.ics", Local::now().format("%Y%m%d_%H%M%S"));
        let path = self.dir.join(filename);
        let body = render_calendar(events, &self.options);
        tokio::fs::write(&path, body).await?;

        info!("Wrote {} events to {}", events.len(), path.display());
        Ok(events.len())
    }
}

pub struct NoopCalendarSink;

#[async_trait]
impl CalendarSink for NoopCalendarSink {
    async fn push_events(&self, events: &[CalendarEvent]) -> Result<usize, AppError> {
        Ok(events.len())
    }
}
