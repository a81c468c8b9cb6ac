use serde::{Deserialize, Serialize};

use crate::models::Course;

/// What a caller does with a non-empty conflict list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Any conflict rejects the write.
    #[default]
    Strict,
    /// The write goes through; conflicts are reported as warnings.
    Advisory,
}

impl ConflictPolicy {
    pub fn from_force(force: bool) -> Self {
        if force {
            ConflictPolicy::Advisory
        } else {
            ConflictPolicy::Strict
        }
    }
}

/// Two courses clash when they share a weekday, share at least one week,
/// and their `[start, end)` intervals overlap.
pub fn conflicts(a: &Course, b: &Course) -> bool {
    if a.day_of_week != b.day_of_week {
        return false;
    }
    if !a.week_set().intersects(b.week_set()) {
        return false;
    }
    a.start_time < b.end_time && b.start_time < a.end_time
}

/// Every member of `existing` that clashes with `candidate`, skipping the
/// record whose id is `exclude_id` (the course being edited in place).
pub fn find_conflicts<'a>(
    candidate: &Course,
    existing: &'a [Course],
    exclude_id: Option<i64>,
) -> Vec<&'a Course> {
    existing
        .iter()
        .filter(|course| Some(course.id) != exclude_id)
        .filter(|course| conflicts(candidate, course))
        .collect()
}
