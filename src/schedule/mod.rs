//! Week-range parsing, conflict detection and term-date arithmetic.
//!
//! Everything in here is pure and synchronous. The persistence and HTTP
//! layers call into these functions; nothing in this module touches the
//! database or the network.

pub mod conflict;
pub mod dates;
pub mod timeslot;
pub mod weeks;

use thiserror::Error;

pub use conflict::{ConflictPolicy, conflicts, find_conflicts};
pub use dates::{Occurrence, default_term_start, occurrences, resolve_date, term_anchor, week_of};
pub use timeslot::{TimeSlot, TimetableGrid, build_grid, standard_slots};
pub use weeks::{MAX_WEEK, WeekSet, WeekSpec, parse_weeks};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// Malformed week-range string.
    #[error("Invalid week range: {0}")]
    Format(String),

    /// Day-of-week or week number outside its valid bounds.
    #[error("Out of range: {0}")]
    Range(String),

    #[error("Invalid course: {0}")]
    InvalidCourse(String),
}
