use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timetable::api::router;
use timetable::calendar::{IcsFileSink, IcsOptions};
use timetable::config::AppConfig;
use timetable::db;
use timetable::services::ReminderScheduler;
use timetable::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "timetable=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(AppConfig::new_from_env()?);
    info!("term starts {} (week 1 anchor)", config.term_start);

    let pool = db::connect(&config.database_url).await?;

    let calendar = Arc::new(IcsFileSink::new(
        config.ics_output_dir.clone(),
        IcsOptions {
            timezone: config.timezone,
            alarm_minutes: Some(config.reminder_advance_minutes),
            ..IcsOptions::default()
        },
    ));

    let reminders = ReminderScheduler::new(pool.clone(), config.clone());
    tokio::spawn(reminders.start());

    let state = AppState {
        db: pool,
        config: config.clone(),
        calendar,
    };

    let app = router(state);

    info!("listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
