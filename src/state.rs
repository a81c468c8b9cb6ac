use std::sync::Arc;

use sqlx::SqlitePool;

use crate::calendar::CalendarSink;
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub calendar: Arc<dyn CalendarSink>,
}
