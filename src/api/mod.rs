use axum::Json;
use axum::extract::{Path, Query};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{post, put};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::calendar::{IcsOptions, render_calendar, resolve_events};
use crate::db::repository;
use crate::error::AppError;
use crate::models::course::validate_score;
use crate::models::*;
use crate::schedule::{ConflictPolicy, TimetableGrid, build_grid, parse_weeks};
use crate::services::term::{TermInfo, effective_term_start, term_info};
use crate::services::transfer::{self, ExportScope, ImportPayload, ImportStats, ScheduleDocument};
use crate::services::{CourseService, CourseWrite, ScheduleStatistics, SyncService, SyncStats, summarize};
use crate::state::AppState;

#[derive(Deserialize)]
struct CourseQueryParams {
    week: Option<u32>,
    q: Option<String>,
}

#[derive(Deserialize)]
struct WriteParams {
    #[serde(default)]
    force: bool,
}

#[derive(Deserialize)]
struct WeekParams {
    week: Option<u32>,
}

#[derive(Deserialize)]
struct ExportParams {
    week: Option<u32>,
    weeks: Option<String>,
}

#[derive(Deserialize)]
struct CheckRequest {
    #[serde(flatten)]
    course: NewCourseRequest,
    #[serde(default)]
    exclude_id: Option<i64>,
}

#[derive(Deserialize)]
struct TermRequest {
    term_start: NaiveDate,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/courses", get(list_courses).post(create_course))
        .route("/courses/check", post(check_course))
        .route("/courses/{id}", get(get_course).put(update_course).delete(delete_course))
        .route("/courses/{id}/score", put(set_score))
        .route("/courses/{id}/feedback", get(list_feedback).post(add_feedback))
        .route("/timetable", get(timetable))
        .route("/statistics", get(statistics))
        .route("/export", get(export_schedule))
        .route("/export/ics", get(export_ics))
        .route("/import", post(import_schedule))
        .route("/sync", post(sync_now))
        .route("/settings/term", get(get_term).put(set_term))
        .route("/holidays", get(list_holidays))
        .route("/holidays/{date}", put(put_holiday).delete(delete_holiday))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn list_courses(
    State(state): State<AppState>,
    Query(params): Query<CourseQueryParams>,
) -> Result<Json<Vec<Course>>, AppError> {
    let courses = CourseService::new(state.db)
        .list(params.week, params.q.as_deref())
        .await?;
    Ok(Json(courses))
}

async fn create_course(
    State(state): State<AppState>,
    Query(params): Query<WriteParams>,
    Json(req): Json<NewCourseRequest>,
) -> Result<(StatusCode, Json<CourseWrite>), AppError> {
    let write = CourseService::new(state.db)
        .add(req, ConflictPolicy::from_force(params.force))
        .await?;
    Ok((StatusCode::CREATED, Json(write)))
}

async fn check_course(
    State(state): State<AppState>,
    Json(req): Json<CheckRequest>,
) -> Result<Json<Vec<Course>>, AppError> {
    let clashes = CourseService::new(state.db)
        .check(req.course, req.exclude_id)
        .await?;
    Ok(Json(clashes))
}

async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Course>, AppError> {
    let course = CourseService::new(state.db).get(id).await?;
    Ok(Json(course))
}

async fn update_course(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<WriteParams>,
    Json(req): Json<NewCourseRequest>,
) -> Result<Json<CourseWrite>, AppError> {
    let write = CourseService::new(state.db)
        .update(id, req, ConflictPolicy::from_force(params.force))
        .await?;
    Ok(Json(write))
}

async fn delete_course(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    CourseService::new(state.db).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_score(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ScoreRequest>,
) -> Result<StatusCode, AppError> {
    validate_score(req.score)?;
    if repository::update_score(&state.db, id, req.score).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

async fn list_feedback(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Feedback>>, AppError> {
    repository::find_course_by_id(&state.db, id)
        .await?
        .ok_or(AppError::NotFound)?;
    let feedback = repository::fetch_feedback(&state.db, id).await?;
    Ok(Json(feedback))
}

async fn add_feedback(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<NewFeedbackRequest>,
) -> Result<(StatusCode, Json<Feedback>), AppError> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("feedback must not be empty".to_string()));
    }
    validate_score(req.score)?;
    repository::find_course_by_id(&state.db, id)
        .await?
        .ok_or(AppError::NotFound)?;

    let feedback = repository::add_feedback(&state.db, id, content, req.score).await?;
    Ok((StatusCode::CREATED, Json(feedback)))
}

async fn timetable(
    State(state): State<AppState>,
    Query(params): Query<WeekParams>,
) -> Result<Json<TimetableGrid>, AppError> {
    let courses = repository::fetch_courses(&state.db).await?;
    Ok(Json(build_grid(&courses, params.week)))
}

async fn statistics(State(state): State<AppState>) -> Result<Json<ScheduleStatistics>, AppError> {
    let courses = repository::fetch_courses(&state.db).await?;
    Ok(Json(summarize(&courses)))
}

async fn export_schedule(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> Result<Json<ScheduleDocument>, AppError> {
    let scope = match (params.week, params.weeks) {
        (_, Some(spec)) => ExportScope::Weeks(parse_weeks(&spec)?),
        (Some(week), None) => ExportScope::Week(week),
        (None, None) => ExportScope::All,
    };
    let doc = transfer::export_schedule(&state.db, &scope).await?;
    Ok(Json(doc))
}

async fn export_ics(
    State(state): State<AppState>,
    Query(params): Query<WeekParams>,
) -> Result<impl IntoResponse, AppError> {
    let term_start = effective_term_start(&state.db, &state.config).await?;
    let courses = repository::fetch_courses(&state.db).await?;
    let events = resolve_events(&courses, term_start, params.week)?;

    let options = IcsOptions {
        timezone: state.config.timezone,
        alarm_minutes: Some(state.config.reminder_advance_minutes),
        ..IcsOptions::default()
    };
    let body = render_calendar(&events, &options);

    Ok(([(header::CONTENT_TYPE, "text/calendar; charset=utf-8")], body))
}

async fn import_schedule(
    State(state): State<AppState>,
    Json(payload): Json<ImportPayload>,
) -> Result<Json<ImportStats>, AppError> {
    let stats = transfer::import_schedule(&state.db, payload).await?;
    Ok(Json(stats))
}

async fn sync_now(
    State(state): State<AppState>,
    Query(params): Query<WeekParams>,
) -> Result<Json<SyncStats>, AppError> {
    let service = SyncService::new(state.db.clone(), state.calendar.clone(), state.config.clone());
    let stats = service.sync_all(params.week).await?;
    Ok(Json(stats))
}

async fn get_term(State(state): State<AppState>) -> Result<Json<TermInfo>, AppError> {
    let info = term_info(&state.db, &state.config).await?;
    Ok(Json(info))
}

async fn set_term(
    State(state): State<AppState>,
    Json(req): Json<TermRequest>,
) -> Result<Json<TermInfo>, AppError> {
    repository::set_term_start(&state.db, req.term_start).await?;
    let info = term_info(&state.db, &state.config).await?;
    Ok(Json(info))
}

async fn list_holidays(State(state): State<AppState>) -> Result<Json<Vec<Holiday>>, AppError> {
    let holidays = repository::fetch_holidays(&state.db).await?;
    Ok(Json(holidays))
}

async fn put_holiday(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
    Json(req): Json<HolidayRequest>,
) -> Result<Json<Holiday>, AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("holiday name must not be empty".to_string()));
    }
    let holiday = repository::upsert_holiday(&state.db, date, name, req.kind).await?;
    Ok(Json(holiday))
}

async fn delete_holiday(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Result<StatusCode, AppError> {
    if repository::delete_holiday(&state.db, date).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
