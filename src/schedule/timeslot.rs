use chrono::NaiveTime;
use serde::Serialize;

use crate::models::{Course, hhmm};

/// (label, start, end) of the standard teaching blocks.
const STANDARD_SLOTS: [(&str, (u32, u32), (u32, u32)); 5] = [
    ("1-2", (8, 20), (9, 55)),
    ("3-4", (10, 15), (11, 50)),
    ("5-6", (14, 0), (15, 35)),
    ("7-8", (15, 55), (17, 30)),
    ("evening", (19, 0), (20, 35)),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSlot {
    pub index: usize,
    pub label: &'static str,
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl TimeSlot {
    /// Both ends inclusive: a course starting exactly at a slot's end is
    /// still placed in it.
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time <= self.end
    }
}

pub fn standard_slots() -> Vec<TimeSlot> {
    STANDARD_SLOTS
        .iter()
        .enumerate()
        .filter_map(|(index, (label, start, end))| {
            Some(TimeSlot {
                index,
                label: *label,
                start: NaiveTime::from_hms_opt(start.0, start.1, 0)?,
                end: NaiveTime::from_hms_opt(end.0, end.1, 0)?,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct GridCell {
    pub slot: usize,
    pub day_of_week: u32,
    pub courses: Vec<Course>,
}

/// Week view: courses placed by (slot, weekday).
#[derive(Debug, Clone, Serialize)]
pub struct TimetableGrid {
    /// `None` shows every course regardless of week.
    pub week: Option<u32>,
    pub slots: Vec<TimeSlot>,
    pub cells: Vec<GridCell>,
    /// Courses whose start time falls outside every slot.
    pub unplaced: Vec<Course>,
}

pub fn build_grid(courses: &[Course], week: Option<u32>) -> TimetableGrid {
    let slots = standard_slots();
    let mut cells: Vec<GridCell> = Vec::new();
    let mut unplaced = Vec::new();

    let visible = courses
        .iter()
        .filter(|course| week.is_none_or(|w| course.runs_in_week(w)));

    for course in visible {
        let Some(slot) = slots.iter().find(|s| s.contains(course.start_time)) else {
            unplaced.push(course.clone());
            continue;
        };

        match cells
            .iter_mut()
            .find(|c| c.slot == slot.index && c.day_of_week == course.day_of_week)
        {
            Some(cell) => cell.courses.push(course.clone()),
            None => cells.push(GridCell {
                slot: slot.index,
                day_of_week: course.day_of_week,
                courses: vec![course.clone()],
            }),
        }
    }

    cells.sort_by_key(|c| (c.slot, c.day_of_week));

    TimetableGrid {
        week,
        slots,
        cells,
        unplaced,
    }
}
