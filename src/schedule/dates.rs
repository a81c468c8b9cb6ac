use chrono::{Datelike, Duration, NaiveDate};

use super::ScheduleError;
use crate::models::Course;

/// Monday of the week containing `term_start`; this is day 1 of week 1.
pub fn term_anchor(term_start: NaiveDate) -> NaiveDate {
    let back = i64::from(term_start.weekday().num_days_from_monday());
    term_start - Duration::days(back)
}

/// Concrete date of `day_of_week` (1 = Monday) in teaching week `week`.
pub fn resolve_date(
    term_start: NaiveDate,
    day_of_week: u32,
    week: u32,
) -> Result<NaiveDate, ScheduleError> {
    if !(1..=7).contains(&day_of_week) {
        return Err(ScheduleError::Range(format!(
            "day_of_week must be 1..=7, got {}",
            day_of_week
        )));
    }
    if week < 1 {
        return Err(ScheduleError::Range(format!(
            "week must be at least 1, got {}",
            week
        )));
    }

    let offset = i64::from(day_of_week - 1) + i64::from(week - 1) * 7;
    term_anchor(term_start)
        .checked_add_signed(Duration::days(offset))
        .ok_or_else(|| ScheduleError::Range(format!("week {} is beyond the calendar", week)))
}

/// Teaching week that contains `date`, or `None` before the term starts.
pub fn week_of(term_start: NaiveDate, date: NaiveDate) -> Option<u32> {
    let days = (date - term_anchor(term_start)).num_days();
    if days < 0 {
        return None;
    }
    u32::try_from(days / 7 + 1).ok()
}

/// Fallback term start when nothing is configured: the first Monday after
/// the 1st of September.
pub fn default_term_start(year: i32) -> Option<NaiveDate> {
    let sept_first = NaiveDate::from_ymd_opt(year, 9, 1)?;
    let mut ahead = -i64::from(sept_first.weekday().num_days_from_monday());
    if ahead <= 0 {
        ahead += 7;
    }
    sept_first.checked_add_signed(Duration::days(ahead))
}

/// A single concrete meeting of a course.
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence<'a> {
    pub course: &'a Course,
    pub week: u32,
    pub date: NaiveDate,
}

/// All meetings of `course` across its weeks, optionally narrowed to one week.
pub fn occurrences(
    course: &Course,
    term_start: NaiveDate,
    only_week: Option<u32>,
) -> Result<Vec<Occurrence<'_>>, ScheduleError> {
    course
        .week_set()
        .iter()
        .filter(|week| only_week.is_none_or(|w| w == *week))
        .map(|week| {
            resolve_date(term_start, course.day_of_week, week).map(|date| Occurrence {
                course,
                week,
                date,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, Weekday};

    use super::*;
    use crate::models::DEFAULT_COLOR;
    use crate::schedule::WeekSpec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_resolve_date_in_first_week() {
        assert_eq!(resolve_date(date(2024, 2, 26), 3, 1), Ok(date(2024, 2, 28)));
    }

    #[test]
    fn test_resolve_date_second_week_monday() {
        assert_eq!(resolve_date(date(2024, 2, 26), 1, 2), Ok(date(2024, 3, 4)));
    }

    #[test]
    fn test_resolve_date_sunday_of_week_one() {
        assert_eq!(resolve_date(date(2024, 2, 26), 7, 1), Ok(date(2024, 3, 3)));
    }

    #[test]
    fn test_term_start_is_normalised_to_monday() {
        // Thursday 2024-02-29 belongs to the week starting 2024-02-26
        assert_eq!(term_anchor(date(2024, 2, 29)), date(2024, 2, 26));
        assert_eq!(resolve_date(date(2024, 2, 29), 1, 1), Ok(date(2024, 2, 26)));
        assert_eq!(resolve_date(date(2024, 3, 3), 3, 1), Ok(date(2024, 2, 28)));
    }

    #[test]
    fn test_resolve_date_rejects_out_of_range_inputs() {
        let start = date(2024, 2, 26);
        assert!(matches!(resolve_date(start, 0, 1), Err(ScheduleError::Range(_))));
        assert!(matches!(resolve_date(start, 8, 1), Err(ScheduleError::Range(_))));
        assert!(matches!(resolve_date(start, 1, 0), Err(ScheduleError::Range(_))));
    }

    #[test]
    fn test_week_of_inverts_resolve_date() {
        let start = date(2024, 2, 26);
        for week in 1..=20 {
            for day in 1..=7 {
                let resolved = resolve_date(start, day, week).unwrap();
                assert_eq!(week_of(start, resolved), Some(week));
                assert_eq!(resolved.weekday().number_from_monday(), day);
            }
        }
        assert_eq!(week_of(start, date(2024, 2, 25)), None);
    }

    #[test]
    fn test_default_term_start_is_first_monday_after_sept_first() {
        // 2025-09-01 is a Monday, so the following Monday is used
        assert_eq!(default_term_start(2025), Some(date(2025, 9, 8)));
        // 2024-09-01 is a Sunday
        assert_eq!(default_term_start(2024), Some(date(2024, 9, 2)));
        assert_eq!(default_term_start(2024).unwrap().weekday(), Weekday::Mon);
    }

    #[test]
    fn test_occurrences_cover_every_week() {
        let course = Course {
            id: 1,
            name: "线性代数".to_string(),
            room: "B203".to_string(),
            teacher: "陈老师".to_string(),
            weeks: WeekSpec::parse("1-3,5").unwrap(),
            day_of_week: 2,
            start_time: NaiveTime::from_hms_opt(10, 15, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(11, 50, 0).unwrap(),
            description: None,
            score: 0.0,
            color: DEFAULT_COLOR.to_string(),
        };

        let all = occurrences(&course, date(2024, 2, 26), None).unwrap();
        let dates: Vec<NaiveDate> = all.iter().map(|o| o.date).collect();
        assert_eq!(
            dates,
            vec![date(2024, 2, 27), date(2024, 3, 5), date(2024, 3, 12), date(2024, 3, 26)]
        );

        let fifth = occurrences(&course, date(2024, 2, 26), Some(5)).unwrap();
        assert_eq!(fifth.len(), 1);
        assert_eq!(fifth[0].week, 5);
        assert!(occurrences(&course, date(2024, 2, 26), Some(4)).unwrap().is_empty());
    }
}
