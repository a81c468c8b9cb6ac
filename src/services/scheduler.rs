use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Duration as TimeDelta, Local, NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::SqlitePool;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::db::repository;
use crate::error::AppError;
use crate::models::{Course, hhmm};
use crate::schedule::week_of;
use crate::services::term::effective_term_start;

/// Longest gap a single check looks back over, e.g. after the host slept.
const MAX_CATCH_UP_HOURS: i64 = 24;

/// Course reminder loop.
/// Each tick logs every course whose reminder time passed since the previous tick.
pub struct ReminderScheduler {
    db: SqlitePool,
    config: Arc<AppConfig>,
    interval: Duration,
}

impl ReminderScheduler {
    pub fn new(db: SqlitePool, config: Arc<AppConfig>) -> Self {
        let interval = Duration::from_secs(config.reminder_interval_secs.max(1));
        Self {
            db,
            config,
            interval,
        }
    }

    pub async fn start(self) {
        info!(
            "Starting course reminders (interval: {:?}, advance: {} min)",
            self.interval, self.config.reminder_advance_minutes
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_checked = Local::now().naive_local();

        loop {
            ticker.tick().await;
            let now = Local::now().naive_local();

            match self.run_once(last_checked, now).await {
                Ok(due) => {
                    for course in due {
                        info!(
                            "Reminder: {} starts at {} in {} (teacher: {})",
                            course.name,
                            hhmm::format(&course.start_time),
                            course.room,
                            course.teacher
                        );
                    }
                    last_checked = now;
                }
                Err(e) => {
                    // window stays open and is retried on the next tick
                    warn!("Reminder check failed: {:?}", e);
                }
            }
        }
    }

    /// Courses whose reminder time falls in `(since, now]`.
    pub async fn run_once(
        &self,
        since: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<Vec<Course>, AppError> {
        if now <= since {
            return Ok(Vec::new());
        }

        let term_start = effective_term_start(&self.db, &self.config).await?;
        let courses = repository::fetch_courses(&self.db).await?;

        Ok(due_reminders(
            &courses,
            term_start,
            since,
            now,
            self.config.reminder_advance_minutes,
        )
        .into_iter()
        .cloned()
        .collect())
    }
}

/// Courses meeting on some day of the window whose start minus
/// `advance_minutes` (floored at that day's midnight) lies in `(since, now]`.
/// Results are ordered by reminder time.
pub fn due_reminders<'a>(
    courses: &'a [Course],
    term_start: NaiveDate,
    since: NaiveDateTime,
    now: NaiveDateTime,
    advance_minutes: i64,
) -> Vec<&'a Course> {
    let max_catch_up = TimeDelta::hours(MAX_CATCH_UP_HOURS);
    let since = if now - since > max_catch_up {
        debug!("Reminder window clipped to the last {} hours", MAX_CATCH_UP_HOURS);
        now - max_catch_up
    } else {
        since
    };
    let advance = TimeDelta::minutes(advance_minutes.max(0));

    let mut due = Vec::new();
    for date in since.date().iter_days().take_while(|d| *d <= now.date()) {
        let Some(week) = week_of(term_start, date) else {
            continue;
        };
        let weekday = date.weekday().number_from_monday();
        let midnight = date.and_time(NaiveTime::default());

        for course in courses
            .iter()
            .filter(|c| c.day_of_week == weekday && c.runs_in_week(week))
        {
            let remind_at = (date.and_time(course.start_time) - advance).max(midnight);
            if since < remind_at && remind_at <= now {
                due.push((remind_at, course));
            }
        }
    }

    due.sort_by_key(|(at, course)| (*at, course.id));
    due.into_iter().map(|(_, course)| course).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::models::NewCourseRequest;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn request(name: &str, day: u32, weeks: &str, start: (u32, u32)) -> NewCourseRequest {
        NewCourseRequest {
            name: name.to_string(),
            room: "F101".to_string(),
            teacher: "郑老师".to_string(),
            weeks: weeks.to_string(),
            day_of_week: day,
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(start.0 + 1, start.1, 0).unwrap(),
            description: None,
            score: 0.0,
            color: None,
        }
    }

    fn term() -> NaiveDate {
        // a Monday
        NaiveDate::from_ymd_opt(2024, 2, 26).unwrap()
    }

    #[test]
    fn test_due_reminders_within_window() {
        let courses = vec![
            request("早课", 1, "1-16", (8, 20)).into_draft().unwrap(),
            request("午课", 1, "1-16", (14, 0)).into_draft().unwrap(),
            request("周二", 2, "1-16", (8, 20)).into_draft().unwrap(),
        ];

        let due = due_reminders(&courses, term(), at(2024, 2, 26, 8, 4, 0), at(2024, 2, 26, 8, 5, 0), 15);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].name, "早课");

        // the window is open on the left
        assert!(due_reminders(&courses, term(), at(2024, 2, 26, 8, 5, 0), at(2024, 2, 26, 8, 6, 0), 15).is_empty());

        let due = due_reminders(&courses, term(), at(2024, 2, 26, 7, 0, 0), at(2024, 2, 26, 14, 0, 0), 15);
        let names: Vec<&str> = due.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["早课", "午课"]);
    }

    #[test]
    fn test_window_across_midnight() {
        let courses = vec![request("周二", 2, "1-16", (0, 10)).into_draft().unwrap()];
        let due = due_reminders(&courses, term(), at(2024, 2, 26, 23, 59, 30), at(2024, 2, 27, 0, 0, 30), 15);
        assert_eq!(due.len(), 1);
    }

    #[test]
    fn test_early_courses_remind_at_midnight() {
        let courses = vec![request("晨练", 1, "1-16", (0, 10)).into_draft().unwrap()];
        let due = due_reminders(&courses, term(), at(2024, 2, 25, 23, 59, 0), at(2024, 2, 26, 0, 0, 0), 15);
        assert_eq!(due.len(), 1);
    }

    #[tokio::test]
    async fn test_reminder_fires_once_with_long_interval() {
        let pool = test_pool().await;
        repository::insert_course(&pool, &request("早课", 1, "1-16", (8, 20)).into_draft().unwrap())
            .await
            .unwrap();

        let mut config = AppConfig::local(term());
        config.reminder_interval_secs = 120;
        let scheduler = ReminderScheduler::new(pool, Arc::new(config));

        let mut fired = 0;
        let mut last = at(2024, 2, 26, 7, 0, 30);
        while last < at(2024, 2, 26, 8, 20, 0) {
            let now = last + TimeDelta::seconds(120);
            fired += scheduler.run_once(last, now).await.unwrap().len();
            last = now;
        }
        assert_eq!(fired, 1);
    }

    #[tokio::test]
    async fn test_run_once_respects_weeks_and_term() {
        let pool = test_pool().await;
        for req in [request("前八周", 1, "1-8", (8, 20)), request("后八周", 1, "9-16", (8, 20))] {
            repository::insert_course(&pool, &req.into_draft().unwrap())
                .await
                .unwrap();
        }

        let config = Arc::new(AppConfig::local(term()));
        let scheduler = ReminderScheduler::new(pool, config);

        // week 2 Monday
        let due = scheduler
            .run_once(at(2024, 3, 4, 8, 4, 30), at(2024, 3, 4, 8, 5, 30))
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].name, "前八周");

        // week 10 Monday
        let due = scheduler
            .run_once(at(2024, 4, 29, 8, 4, 30), at(2024, 4, 29, 8, 5, 30))
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].name, "后八周");

        // before the term starts
        assert!(scheduler
            .run_once(at(2024, 2, 19, 8, 0, 0), at(2024, 2, 19, 9, 0, 0))
            .await
            .unwrap()
            .is_empty());
    }
}
