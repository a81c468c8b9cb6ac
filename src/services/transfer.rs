//! JSON schedule export/import.

use chrono::{NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::repository;
use crate::error::AppError;
use crate::models::{Course, NewCourseRequest, hhmm};
use crate::schedule::{WeekSet, conflicts};

pub const DOCUMENT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleDocument {
    pub version: String,
    pub export_time: String,
    pub courses: Vec<ExportedCourse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedCourse {
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
}

impl From<&Course> for ExportedCourse {
    fn from(course: &Course) -> Self {
        Self {
            name: course.name.clone(),
            room: course.room.clone(),
            teacher: course.teacher.clone(),
            weeks: course.weeks.to_string(),
            day_of_week: course.day_of_week,
            start_time: course.start_time,
            end_time: course.end_time,
            description: course.description.clone(),
            score: course.score,
        }
    }
}

impl From<ExportedCourse> for NewCourseRequest {
    fn from(course: ExportedCourse) -> Self {
        Self {
            name: course.name,
            room: course.room,
            teacher: course.teacher,
            weeks: course.weeks,
            day_of_week: course.day_of_week,
            start_time: course.start_time,
            end_time: course.end_time,
            description: course.description,
            score: course.score,
            color: None,
        }
    }
}

/// Accepts both the versioned document and the older bare list of courses.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ImportPayload {
    Document(ScheduleDocument),
    Legacy(Vec<ExportedCourse>),
}

impl ImportPayload {
    pub fn into_courses(self) -> Vec<ExportedCourse> {
        match self {
            ImportPayload::Document(doc) => {
                if doc.version != DOCUMENT_VERSION {
                    warn!("Importing schedule document version {}", doc.version);
                }
                doc.courses
            }
            ImportPayload::Legacy(courses) => courses,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportScope {
    All,
    Week(u32),
    /// Courses meeting in any of these weeks.
    Weeks(WeekSet),
}

impl ExportScope {
    pub fn includes(&self, course: &Course) -> bool {
        match self {
            ExportScope::All => true,
            ExportScope::Week(week) => course.runs_in_week(*week),
            ExportScope::Weeks(weeks) => course.week_set().intersects(weeks),
        }
    }
}

pub fn build_document(courses: &[Course], scope: &ExportScope) -> ScheduleDocument {
    ScheduleDocument {
        version: DOCUMENT_VERSION.to_string(),
        export_time: Utc::now().to_rfc3339(),
        courses: courses
            .iter()
            .filter(|c| scope.includes(c))
            .map(ExportedCourse::from)
            .collect(),
    }
}

pub async fn export_schedule(db: &SqlitePool, scope: &ExportScope) -> Result<ScheduleDocument, AppError> {
    let courses = repository::fetch_courses(db).await?;
    let doc = build_document(&courses, scope);
    info!("Exported {} of {} courses ({:?})", doc.courses.len(), courses.len(), scope);
    Ok(doc)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportStats {
    pub total: usize,
    pub imported: usize,
    /// Entries dropped because they clash with an earlier entry of the same import.
    pub skipped_conflicts: usize,
}

/// Replace every stored course with the contents of `payload`.
///
/// All entries are validated before anything is touched; one bad entry
/// aborts the import. Entries that clash with an already imported one are
/// skipped.
pub async fn import_schedule(db: &SqlitePool, payload: ImportPayload) -> Result<ImportStats, AppError> {
    let drafts = payload
        .into_courses()
        .into_iter()
        .enumerate()
        .map(|(index, course)| {
            NewCourseRequest::from(course).into_draft().map_err(|e| {
                AppError::BadRequest(format!("course #{} in import: {}", index + 1, e))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut stats = ImportStats {
        total: drafts.len(),
        ..ImportStats::default()
    };

    let mut tx = db.begin().await?;
    let cleared = repository::clear_courses(&mut *tx).await?;

    let mut accepted: Vec<Course> = Vec::with_capacity(drafts.len());
    for draft in drafts {
        if accepted.iter().any(|c| conflicts(&draft, c)) {
            warn!("Skipping imported course {}: time conflict", draft.name);
            stats.skipped_conflicts += 1;
            continue;
        }
        let course = repository::insert_course(&mut *tx, &draft).await?;
        accepted.push(course);
        stats.imported += 1;
    }

    tx.commit().await?;
    info!(
        "Import replaced {} courses with {} ({} skipped)",
        cleared, stats.imported, stats.skipped_conflicts
    );

    Ok(stats)
}
