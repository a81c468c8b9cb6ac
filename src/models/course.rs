use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::hhmm;
use crate::schedule::{ScheduleError, WeekSet, WeekSpec};

/// Id carried by a course that has not been persisted yet.
pub const UNSAVED_ID: i64 = -1;

pub const DEFAULT_COLOR: &str = "#e3f2fd";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub room: String,
    pub teacher: String,
    pub weeks: WeekSpec,
    /// 1 = Monday .. 7 = Sunday
    pub day_of_week: u32,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub description: Option<String>,
    pub score: f64,
    pub color: String,
}

impl Course {
    pub fn week_set(&self) -> &WeekSet {
        self.weeks.week_set()
    }

    pub fn runs_in_week(&self, week: u32) -> bool {
        self.week_set().contains(week)
    }

    pub fn is_persisted(&self) -> bool {
        self.id != UNSAVED_ID
    }
}

/// Raw `courses` row; times and week spec are still text here.
#[derive(Debug, Clone, FromRow)]
pub struct CourseRow {
    pub id: i64,
    pub name: String,
    pub room: String,
    pub teacher: String,
    pub weeks: String,
    pub day_of_week: i64,
    pub start_time: String,
    pub end_time: String,
    pub description: Option<String>,
    pub score: f64,
    pub color: String,
}

impl TryFrom<CourseRow> for Course {
    type Error = ScheduleError;

    fn try_from(row: CourseRow) -> Result<Self, Self::Error> {
        let weeks = WeekSpec::parse(&row.weeks)?;
        let day_of_week = u32::try_from(row.day_of_week)
            .ok()
            .filter(|d| (1..=7).contains(d))
            .ok_or_else(|| {
                ScheduleError::Range(format!(
                    "course {} has day_of_week {}",
                    row.id, row.day_of_week
                ))
            })?;
        let start_time = parse_stored_time(row.id, &row.start_time)?;
        let end_time = parse_stored_time(row.id, &row.end_time)?;

        Ok(Course {
            id: row.id,
            name: row.name,
            room: row.room,
            teacher: row.teacher,
            weeks,
            day_of_week,
            start_time,
            end_time,
            description: row.description,
            score: row.score,
            color: row.color,
        })
    }
}

fn parse_stored_time(id: i64, raw: &str) -> Result<NaiveTime, ScheduleError> {
    hhmm::parse(raw).map_err(|_| {
        ScheduleError::InvalidCourse(format!("course {} has malformed time {:?}", id, raw))
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCourseRequest {
    pub name: String,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub teacher: String,
    pub weeks: String,
    pub day_of_week: u32,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub color: Option<String>,
}

impl NewCourseRequest {
    /// Validate the request and turn it into an unsaved course.
    pub fn into_draft(self) -> Result<Course, ScheduleError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ScheduleError::InvalidCourse(
                "course name must not be empty".to_string(),
            ));
        }
        if !(1..=7).contains(&self.day_of_week) {
            return Err(ScheduleError::Range(format!(
                "day_of_week must be 1..=7, got {}",
                self.day_of_week
            )));
        }
        if self.start_time >= self.end_time {
            return Err(ScheduleError::InvalidCourse(format!(
                "start time {} must be before end time {}",
                hhmm::format(&self.start_time),
                hhmm::format(&self.end_time)
            )));
        }
        validate_score(self.score)?;
        let weeks = WeekSpec::parse(&self.weeks)?;

        Ok(Course {
            id: UNSAVED_ID,
            name,
            room: self.room.trim().to_string(),
            teacher: self.teacher.trim().to_string(),
            weeks,
            day_of_week: self.day_of_week,
            start_time: self.start_time,
            end_time: self.end_time,
            description: self.description.filter(|d| !d.trim().is_empty()),
            score: self.score,
            color: self.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        })
    }
}

pub fn validate_score(score: f64) -> Result<(), ScheduleError> {
    if (0.0..=5.0).contains(&score) {
        Ok(())
    } else {
        Err(ScheduleError::InvalidCourse(format!(
            "score must be between 0 and 5, got {}",
            score
        )))
    }
}
