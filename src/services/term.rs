use chrono::{Local, NaiveDate};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::db::repository;
use crate::error::AppError;
use crate::schedule::{term_anchor, week_of};

#[derive(Debug, Clone, Serialize)]
pub struct TermInfo {
    pub term_start: NaiveDate,
    /// Monday of week 1.
    pub anchor: NaiveDate,
    pub current_week: Option<u32>,
}

/// The saved term start, falling back to the configured one.
pub async fn effective_term_start(db: &SqlitePool, config: &AppConfig) -> Result<NaiveDate, AppError> {
    Ok(repository::get_term_start(db).await?.unwrap_or(config.term_start))
}

pub async fn term_info(db: &SqlitePool, config: &AppConfig) -> Result<TermInfo, AppError> {
    let term_start = effective_term_start(db, config).await?;
    Ok(TermInfo {
        term_start,
        anchor: term_anchor(term_start),
        current_week: week_of(term_start, Local::now().date_naive()),
    })
}
