use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::calendar::{CalendarSink, resolve_events};
use crate::config::AppConfig;
use crate::db::repository;
use crate::error::AppError;
use crate::services::term::effective_term_start;

pub struct SyncService {
    db: SqlitePool,
    sink: Arc<dyn CalendarSink>,
    config: Arc<AppConfig>,
}

#[derive(Debug, Serialize)]
pub struct SyncStats {
    pub courses: usize,
    pub events_resolved: usize,
    pub events_pushed: usize,
}

impl SyncService {
    pub fn new(db: SqlitePool, sink: Arc<dyn CalendarSink>, config: Arc<AppConfig>) -> Self {
        Self { db, sink, config }
    }

    /// Resolve every course (or just those of `week`) to dated events and
    /// hand them to the calendar sink.
    pub async fn sync_all(&self, week: Option<u32>) -> Result<SyncStats, AppError> {
        info!("Starting calendar sync (week: {:?})", week);

        let term_start = effective_term_start(&self.db, &self.config).await?;
        let courses = match week {
            Some(week) => repository::fetch_courses_for_week(&self.db, week).await?,
            None => repository::fetch_courses(&self.db).await?,
        };

        let events = resolve_events(&courses, term_start, week)?;
        info!(
            "Resolved {} events from {} courses (term start {})",
            events.len(),
            courses.len(),
            term_start
        );

        let pushed = self.sink.push_events(&events).await?;

        let stats = SyncStats {
            courses: courses.len(),
            events_resolved: events.len(),
            events_pushed: pushed,
        };
        info!("Sync completed successfully: {:?}", stats);
        Ok(stats)
    }
}
