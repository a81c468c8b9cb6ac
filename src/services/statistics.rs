use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::models::Course;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayCount {
    pub day_of_week: u32,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameStat {
    pub name: String,
    pub count: usize,
    pub teachers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeacherStat {
    pub teacher: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleStatistics {
    pub total: usize,
    /// Always seven entries, Monday first.
    pub per_day: Vec<DayCount>,
    /// Sorted by course name.
    pub by_name: Vec<NameStat>,
    /// Busiest teacher first.
    pub by_teacher: Vec<TeacherStat>,
}

pub fn summarize(courses: &[Course]) -> ScheduleStatistics {
    let per_day = (1..=7)
        .map(|day| DayCount {
            day_of_week: day,
            count: courses.iter().filter(|c| c.day_of_week == day).count(),
        })
        .collect();

    let mut names: BTreeMap<&str, (usize, BTreeSet<&str>)> = BTreeMap::new();
    let mut teachers: BTreeMap<&str, usize> = BTreeMap::new();
    for course in courses {
        let entry = names.entry(course.name.as_str()).or_default();
        entry.0 += 1;
        if !course.teacher.is_empty() {
            entry.1.insert(course.teacher.as_str());
        }
        *teachers.entry(course.teacher.as_str()).or_default() += 1;
    }

    let by_name = names
        .into_iter()
        .map(|(name, (count, teachers))| NameStat {
            name: name.to_string(),
            count,
            teachers: teachers.into_iter().map(str::to_string).collect(),
        })
        .collect();

    let mut by_teacher: Vec<TeacherStat> = teachers
        .into_iter()
        .map(|(teacher, count)| TeacherStat {
            teacher: teacher.to_string(),
            count,
        })
        .collect();
    // stable sort keeps teachers with equal counts in name order
    by_teacher.sort_by(|a, b| b.count.cmp(&a.count));

    ScheduleStatistics {
        total: courses.len(),
        per_day,
        by_name,
        by_teacher,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::models::DEFAULT_COLOR;
    use crate::schedule::WeekSpec;

    fn course(name: &str, teacher: &str, day: u32) -> Course {
        Course {
            id: 1,
            name: name.to_string(),
            room: String::new(),
            teacher: teacher.to_string(),
            weeks: WeekSpec::parse("1-16").unwrap(),
            day_of_week: day,
            start_time: NaiveTime::from_hms_opt(8, 20, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 55, 0).unwrap(),
            description: None,
            score: 0.0,
            color: DEFAULT_COLOR.to_string(),
        }
    }

    #[test]
    fn test_summarize() {
        let courses = vec![
            course("高数", "王老师", 1),
            course("高数", "李老师", 3),
            course("英语", "王老师", 1),
            course("体育", "赵老师", 5),
        ];

        let stats = summarize(&courses);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.per_day.len(), 7);
        assert_eq!(stats.per_day[0].count, 2);
        assert_eq!(stats.per_day[2].count, 1);
        assert_eq!(stats.per_day[6].count, 0);

        let math = stats.by_name.iter().find(|s| s.name == "高数").unwrap();
        assert_eq!(math.count, 2);
        assert_eq!(math.teachers.len(), 2);

        assert_eq!(stats.by_teacher[0].teacher, "王老师");
        assert_eq!(stats.by_teacher[0].count, 2);
        assert_eq!(stats.by_teacher.len(), 3);
    }

    #[test]
    fn test_summarize_empty() {
        let stats = summarize(&[]);
        assert_eq!(stats.total, 0);
        assert!(stats.by_name.is_empty());
        assert!(stats.per_day.iter().all(|d| d.count == 0));
    }
}
