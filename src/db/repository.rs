use chrono::{NaiveDate, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::error::AppError;
use crate::models::{Course, CourseRow, Feedback, Holiday, HolidayKind, hhmm};

const COURSE_COLUMNS: &str = "id, name, room, teacher, weeks, day_of_week, start_time, end_time, description, score, color";

const TERM_START_KEY: &str = "term_start";

fn into_courses(rows: Vec<CourseRow>) -> Result<Vec<Course>, AppError> {
    rows.into_iter()
        .map(|row| Course::try_from(row).map_err(AppError::from))
        .collect()
}

pub async fn fetch_courses<'e, E>(db: E) -> Result<Vec<Course>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, CourseRow>(&format!(
        "SELECT {} FROM courses ORDER BY day_of_week, start_time, id",
        COURSE_COLUMNS
    ))
    .fetch_all(db)
    .await?;

    into_courses(rows)
}

/// Courses that meet during teaching week `week`.
pub async fn fetch_courses_for_week(db: &SqlitePool, week: u32) -> Result<Vec<Course>, AppError> {
    let courses = fetch_courses(db).await?;
    Ok(courses.into_iter().filter(|c| c.runs_in_week(week)).collect())
}

pub async fn search_courses(db: &SqlitePool, keyword: &str) -> Result<Vec<Course>, AppError> {
    let pattern = format!("%{}%", keyword.trim());
    let rows = sqlx::query_as::<_, CourseRow>(&format!(
        "SELECT {} FROM courses \
         WHERE name LIKE ?1 OR teacher LIKE ?1 OR room LIKE ?1 OR description LIKE ?1 \
         ORDER BY day_of_week, start_time, id",
        COURSE_COLUMNS
    ))
    .bind(pattern)
    .fetch_all(db)
    .await?;

    into_courses(rows)
}

pub async fn find_course_by_id(db: &SqlitePool, id: i64) -> Result<Option<Course>, AppError> {
    let row = sqlx::query_as::<_, CourseRow>(&format!(
        "SELECT {} FROM courses WHERE id = ?",
        COURSE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;

    row.map(|r| Course::try_from(r).map_err(AppError::from))
        .transpose()
}

/// Insert `course` and return it with its assigned id. Any id already on
/// the course is ignored.
pub async fn insert_course<'e, E>(db: E, course: &Course) -> Result<Course, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "INSERT INTO courses (name, room, teacher, weeks, day_of_week, start_time, end_time, description, score, color) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&course.name)
    .bind(&course.room)
    .bind(&course.teacher)
    .bind(course.weeks.as_str())
    .bind(i64::from(course.day_of_week))
    .bind(hhmm::format(&course.start_time))
    .bind(hhmm::format(&course.end_time))
    .bind(&course.description)
    .bind(course.score)
    .bind(&course.color)
    .execute(db)
    .await?;

    Ok(Course {
        id: result.last_insert_rowid(),
        ..course.clone()
    })
}

/// Full replace of the course stored under `id`.
pub async fn update_course<'e, E>(db: E, id: i64, course: &Course) -> Result<Option<Course>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let affected = sqlx::query(
        "UPDATE courses SET name = ?, room = ?, teacher = ?, weeks = ?, day_of_week = ?, \
         start_time = ?, end_time = ?, description = ?, score = ?, color = ? WHERE id = ?"
    )
    .bind(&course.name)
    .bind(&course.room)
    .bind(&course.teacher)
    .bind(course.weeks.as_str())
    .bind(i64::from(course.day_of_week))
    .bind(hhmm::format(&course.start_time))
    .bind(hhmm::format(&course.end_time))
    .bind(&course.description)
    .bind(course.score)
    .bind(&course.color)
    .bind(id)
    .execute(db)
    .await?
    .rows_affected();

    if affected == 0 {
        return Ok(None);
    }

    Ok(Some(Course {
        id,
        ..course.clone()
    }))
}

/// Delete a course together with its feedback.
pub async fn delete_course(db: &SqlitePool, id: i64) -> Result<bool, AppError> {
    let mut tx = db.begin().await?;

    sqlx::query("DELETE FROM feedback WHERE course_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let affected = sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    Ok(affected > 0)
}

pub async fn clear_courses<'e, E>(db: E) -> Result<u64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    // feedback rows follow through ON DELETE CASCADE
    let affected = sqlx::query("DELETE FROM courses")
        .execute(db)
        .await?
        .rows_affected();

    Ok(affected)
}

pub async fn update_score(db: &SqlitePool, id: i64, score: f64) -> Result<bool, AppError> {
    let affected = sqlx::query("UPDATE courses SET score = ? WHERE id = ?")
        .bind(score)
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(affected > 0)
}

/// Record feedback and make its score the course's current score.
pub async fn add_feedback(
    db: &SqlitePool,
    course_id: i64,
    content: &str,
    score: f64,
) -> Result<Feedback, AppError> {
    let now = Utc::now().to_rfc3339();
    let mut tx = db.begin().await?;

    let id = sqlx::query(
        "INSERT INTO feedback (course_id, content, score, created_at) VALUES (?, ?, ?, ?)"
    )
    .bind(course_id)
    .bind(content)
    .bind(score)
    .bind(&now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    sqlx::query("UPDATE courses SET score = ? WHERE id = ?")
        .bind(score)
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Feedback {
        id,
        course_id,
        content: content.to_string(),
        score,
        created_at: now,
    })
}

pub async fn fetch_feedback(db: &SqlitePool, course_id: i64) -> Result<Vec<Feedback>, AppError> {
    let feedback = sqlx::query_as::<_, Feedback>(
        "SELECT id, course_id, content, score, created_at FROM feedback \
         WHERE course_id = ? ORDER BY created_at DESC, id DESC"
    )
    .bind(course_id)
    .fetch_all(db)
    .await?;

    Ok(feedback)
}

pub async fn get_term_start(db: &SqlitePool) -> Result<Option<NaiveDate>, AppError> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(TERM_START_KEY)
        .fetch_optional(db)
        .await?;

    value
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| {
                AppError::BadRequest(format!("stored term start {:?} is invalid: {}", raw, e))
            })
        })
        .transpose()
}

pub async fn set_term_start(db: &SqlitePool, date: NaiveDate) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value"
    )
    .bind(TERM_START_KEY)
    .bind(date.format("%Y-%m-%d").to_string())
    .execute(db)
    .await?;

    Ok(())
}

pub async fn fetch_holidays(db: &SqlitePool) -> Result<Vec<Holiday>, AppError> {
    let holidays = sqlx::query_as::<_, Holiday>(
        "SELECT date, name, kind FROM holidays ORDER BY date"
    )
    .fetch_all(db)
    .await?;

    Ok(holidays)
}

pub async fn upsert_holiday(
    db: &SqlitePool,
    date: NaiveDate,
    name: &str,
    kind: HolidayKind,
) -> Result<Holiday, AppError> {
    sqlx::query(
        "INSERT INTO holidays (date, name, kind) VALUES (?, ?, ?) \
         ON CONFLICT(date) DO UPDATE SET name = excluded.name, kind = excluded.kind"
    )
    .bind(date)
    .bind(name)
    .bind(kind)
    .execute(db)
    .await?;

    Ok(Holiday {
        date,
        name: name.to_string(),
        kind,
    })
}

pub async fn delete_holiday(db: &SqlitePool, date: NaiveDate) -> Result<bool, AppError> {
    let affected = sqlx::query("DELETE FROM holidays WHERE date = ?")
        .bind(date)
        .execute(db)
        .await?
        .rows_affected();

    Ok(affected > 0)
}
