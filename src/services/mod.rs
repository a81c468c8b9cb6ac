pub mod course_service;
pub mod scheduler;
pub mod statistics;
pub mod sync_service;
pub mod term;
pub mod transfer;

pub use course_service::{CourseService, CourseWrite};
pub use scheduler::ReminderScheduler;
pub use statistics::{ScheduleStatistics, summarize};
pub use sync_service::{SyncService, SyncStats};
pub use term::{TermInfo, effective_term_start};
pub use transfer::{ExportScope, ImportPayload, ImportStats, ScheduleDocument};
