use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::repository;
use crate::error::AppError;
use crate::models::{Course, NewCourseRequest};
use crate::schedule::{ConflictPolicy, find_conflicts};

/// Takes the database write lock before the first read.
const WRITE_TRANSACTION: &str = "BEGIN IMMEDIATE";

/// Result of an accepted add/update. `warnings` is only ever non-empty
/// under the advisory policy.
#[derive(Debug, Serialize)]
pub struct CourseWrite {
    pub course: Course,
    pub warnings: Vec<Course>,
}

pub struct CourseService {
    db: SqlitePool,
}

impl CourseService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn list(&self, week: Option<u32>, keyword: Option<&str>) -> Result<Vec<Course>, AppError> {
        let courses = match keyword.map(str::trim).filter(|k| !k.is_empty()) {
            Some(keyword) => repository::search_courses(&self.db, keyword).await?,
            None => repository::fetch_courses(&self.db).await?,
        };

        Ok(match week {
            Some(week) => courses.into_iter().filter(|c| c.runs_in_week(week)).collect(),
            None => courses,
        })
    }

    pub async fn get(&self, id: i64) -> Result<Course, AppError> {
        repository::find_course_by_id(&self.db, id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Conflicts a candidate would cause, without writing anything.
    pub async fn check(
        &self,
        req: NewCourseRequest,
        exclude_id: Option<i64>,
    ) -> Result<Vec<Course>, AppError> {
        let draft = req.into_draft()?;
        self.conflicts_for(&draft, exclude_id).await
    }

    pub async fn add(
        &self,
        req: NewCourseRequest,
        policy: ConflictPolicy,
    ) -> Result<CourseWrite, AppError> {
        let draft = req.into_draft()?;

        // check and insert share one write lock
        let mut tx = self.db.begin_with(WRITE_TRANSACTION).await?;
        let existing = repository::fetch_courses(&mut *tx).await?;
        let warnings = clashes_with(&draft, &existing, None);
        enforce(policy, &draft, &warnings)?;

        let course = repository::insert_course(&mut *tx, &draft).await?;
        tx.commit().await?;
        info!("Added course {} ({})", course.id, course.name);

        Ok(CourseWrite { course, warnings })
    }

    pub async fn update(
        &self,
        id: i64,
        req: NewCourseRequest,
        policy: ConflictPolicy,
    ) -> Result<CourseWrite, AppError> {
        let draft = req.into_draft()?;

        let mut tx = self.db.begin_with(WRITE_TRANSACTION).await?;
        let existing = repository::fetch_courses(&mut *tx).await?;
        if !existing.iter().any(|c| c.id == id) {
            return Err(AppError::NotFound);
        }
        let warnings = clashes_with(&draft, &existing, Some(id));
        enforce(policy, &draft, &warnings)?;

        let course = repository::update_course(&mut *tx, id, &draft)
            .await?
            .ok_or(AppError::NotFound)?;
        tx.commit().await?;
        info!("Updated course {} ({})", course.id, course.name);

        Ok(CourseWrite { course, warnings })
    }

    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        if repository::delete_course(&self.db, id).await? {
            info!("Deleted course {}", id);
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }

    async fn conflicts_for(&self, draft: &Course, exclude_id: Option<i64>) -> Result<Vec<Course>, AppError> {
        let existing = repository::fetch_courses(&self.db).await?;
        Ok(clashes_with(draft, &existing, exclude_id))
    }
}

fn clashes_with(draft: &Course, existing: &[Course], exclude_id: Option<i64>) -> Vec<Course> {
    find_conflicts(draft, existing, exclude_id)
        .into_iter()
        .cloned()
        .collect()
}

fn enforce(policy: ConflictPolicy, draft: &Course, clashes: &[Course]) -> Result<(), AppError> {
    if clashes.is_empty() {
        return Ok(());
    }

    match policy {
        ConflictPolicy::Strict => {
            warn!("Rejected {}: conflicts with {} course(s)", draft.name, clashes.len());
            Err(AppError::Conflict(clashes.to_vec()))
        }
        ConflictPolicy::Advisory => {
            warn!("Accepting {} despite {} conflict(s)", draft.name, clashes.len());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::db::{connect, test_pool};

    fn request(name: &str, day: u32, weeks: &str, start: (u32, u32), end: (u32, u32)) -> NewCourseRequest {
        NewCourseRequest {
            name: name.to_string(),
            room: "A101".to_string(),
            teacher: "周老师".to_string(),
            weeks: weeks.to_string(),
            day_of_week: day,
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            description: None,
            score: 0.0,
            color: None,
        }
    }

    #[tokio::test]
    async fn test_add_reports_exactly_one_conflict() {
        let service = CourseService::new(test_pool().await);
        let existing = service
            .add(request("高数", 1, "1-16", (8, 20), (9, 55)), ConflictPolicy::Strict)
            .await
            .unwrap()
            .course;

        let candidate = request("大物", 1, "1-8", (9, 0), (10, 0));
        let clashes = service.check(candidate.clone(), None).await.unwrap();
        assert_eq!(clashes.len(), 1);
        assert_eq!(clashes[0].id, existing.id);

        match service.add(candidate, ConflictPolicy::Strict).await {
            Err(AppError::Conflict(found)) => {
                assert_eq!(found.len(), 1);
                assert_eq!(found[0].id, existing.id);
            }
            other => panic!("expected conflict, got {:?}", other),
        }
        assert_eq!(service.list(None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_advisory_add_keeps_warnings() {
        let service = CourseService::new(test_pool().await);
        service
            .add(request("高数", 1, "1-16", (8, 20), (9, 55)), ConflictPolicy::Strict)
            .await
            .unwrap();

        let write = service
            .add(request("大物", 1, "1-8", (9, 0), (10, 0)), ConflictPolicy::Advisory)
            .await
            .unwrap();
        assert!(write.course.is_persisted());
        assert_eq!(write.warnings.len(), 1);
        assert_eq!(service.list(None, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_ignores_the_course_itself() {
        let service = CourseService::new(test_pool().await);
        let course = service
            .add(request("高数", 1, "1-16", (8, 20), (9, 55)), ConflictPolicy::Strict)
            .await
            .unwrap()
            .course;

        let write = service
            .update(course.id, request("高数", 1, "1-16", (8, 30), (10, 5)), ConflictPolicy::Strict)
            .await
            .unwrap();
        assert!(write.warnings.is_empty());
        assert_eq!(write.course.end_time, NaiveTime::from_hms_opt(10, 5, 0).unwrap());
    }

    #[tokio::test]
    async fn test_update_missing_course() {
        let service = CourseService::new(test_pool().await);
        let result = service
            .update(42, request("高数", 1, "1-16", (8, 20), (9, 55)), ConflictPolicy::Strict)
            .await;
        assert!(matches!(result, Err(AppError::NotFound)));
        assert!(matches!(service.delete(42).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn test_invalid_week_spec_is_rejected_before_writing() {
        let service = CourseService::new(test_pool().await);
        let result = service
            .add(request("高数", 1, "abc", (8, 20), (9, 55)), ConflictPolicy::Advisory)
            .await;
        assert!(matches!(result, Err(AppError::Schedule(_))));
        assert!(service.list(None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_filters_by_week_and_keyword() {
        let service = CourseService::new(test_pool().await);
        service
            .add(request("Calculus", 1, "1-8", (8, 20), (9, 55)), ConflictPolicy::Strict)
            .await
            .unwrap();
        service
            .add(request("Physics", 2, "9-16", (8, 20), (9, 55)), ConflictPolicy::Strict)
            .await
            .unwrap();

        assert_eq!(service.list(Some(10), None).await.unwrap().len(), 1);
        assert_eq!(service.list(None, Some("calc")).await.unwrap().len(), 1);
        assert!(service.list(Some(10), Some("calc")).await.unwrap().is_empty());
        assert_eq!(service.list(None, Some("  ")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_strict_adds_store_one_course() {
        let path = std::env::temp_dir().join(format!(
            "timetable-concurrent-{}-{}.db",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let pool = connect(&format!("sqlite://{}", path.display())).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = CourseService::new(pool.clone());
            handles.push(tokio::spawn(async move {
                service
                    .add(request("高数", 1, "1-16", (8, 20), (9, 55)), ConflictPolicy::Strict)
                    .await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(AppError::Conflict(found)) => assert_eq!(found.len(), 1),
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        let stored = repository::fetch_courses(&pool).await.unwrap();
        pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }

        assert_eq!(accepted, 1);
        assert_eq!(stored.len(), 1);
    }
}
