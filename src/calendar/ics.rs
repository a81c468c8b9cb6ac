use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::{OffsetComponents, Tz, TzOffset};

use super::CalendarEvent;

const PRODID: &str = "-//timetable//CN";
const MAX_LINE_OCTETS: usize = 75;

#[derive(Debug, Clone)]
pub struct IcsOptions {
    pub calendar_name: String,
    /// Zone of every DTSTART/DTEND; described by the VTIMEZONE block.
    pub timezone: Tz,
    /// Minutes before start for the display alarm; `None` or a non-positive
    /// value disables it.
    pub alarm_minutes: Option<i64>,
}

impl Default for IcsOptions {
    fn default() -> Self {
        Self {
            calendar_name: "我的课表".to_string(),
            timezone: chrono_tz::Asia::Shanghai,
            alarm_minutes: Some(15),
        }
    }
}

/// Render events as an RFC 5545 calendar, one VEVENT per event.
pub fn render_calendar(events: &[CalendarEvent], options: &IcsOptions) -> String {
    let stamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let tzid = options.timezone.name();
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{}", PRODID),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
        format!("X-WR-CALNAME:{}", escape_text(&options.calendar_name)),
        format!("X-WR-TIMEZONE:{}", tzid),
    ];
    lines.extend(timezone_block(options.timezone, events));

    for event in events {
        lines.push("BEGIN:VEVENT".to_string());
        lines.push(format!(
            "UID:course-{}-week-{}-{}@timetable",
            event.course_id,
            event.week,
            event.date.format("%Y%m%d")
        ));
        lines.push(format!("DTSTAMP:{}", stamp));
        lines.push(format!(
            "DTSTART;TZID={}:{}",
            tzid,
            local_datetime(event.date, event.start)
        ));
        lines.push(format!(
            "DTEND;TZID={}:{}",
            tzid,
            local_datetime(event.date, event.end)
        ));
        lines.push(format!("SUMMARY:{}", escape_text(&event.summary)));
        if !event.location.is_empty() {
            lines.push(format!("LOCATION:{}", escape_text(&event.location)));
        }
        lines.push(format!("DESCRIPTION:{}", escape_text(&event.description)));

        if let Some(minutes) = options.alarm_minutes.filter(|m| *m > 0) {
            lines.push("BEGIN:VALARM".to_string());
            lines.push("ACTION:DISPLAY".to_string());
            lines.push(format!("DESCRIPTION:{}", escape_text(&event.summary)));
            lines.push(format!("TRIGGER:-PT{}M", minutes));
            lines.push("END:VALARM".to_string());
        }

        lines.push("END:VEVENT".to_string());
    }

    lines.push("END:VCALENDAR".to_string());

    let mut out = String::new();
    for line in &lines {
        out.push_str(&fold_line(line));
        out.push_str("\r\n");
    }
    out
}

/// One STANDARD/DAYLIGHT sub-component of a VTIMEZONE.
struct Observance {
    /// Local wall-clock time, in the offset being left, when it takes effect.
    starts: NaiveDateTime,
    offset_from: i32,
    offset_to: i32,
    daylight: bool,
    name: String,
}

impl Observance {
    fn new(starts: NaiveDateTime, from: i32, to: TzOffset) -> Self {
        Self {
            starts,
            offset_from: from,
            offset_to: to.fix().local_minus_utc(),
            daylight: to.dst_offset() != Duration::zero(),
            name: to.to_string(),
        }
    }

    fn lines(&self) -> Vec<String> {
        let kind = if self.daylight { "DAYLIGHT" } else { "STANDARD" };
        vec![
            format!("BEGIN:{}", kind),
            format!("DTSTART:{}", self.starts.format("%Y%m%dT%H%M%S")),
            format!("TZOFFSETFROM:{}", utc_offset(self.offset_from)),
            format!("TZOFFSETTO:{}", utc_offset(self.offset_to)),
            format!("TZNAME:{}", escape_text(&self.name)),
            format!("END:{}", kind),
        ]
    }
}

/// VTIMEZONE for `tz` covering every offset change between the first and
/// last event.
fn timezone_block(tz: Tz, events: &[CalendarEvent]) -> Vec<String> {
    let today = Utc::now().date_naive();
    let first = events.iter().map(|e| e.date).min().unwrap_or(today);
    let last = events.iter().map(|e| e.date).max().unwrap_or(today);

    let mut cursor = (first - Duration::days(1)).and_time(NaiveTime::default());
    let end = (last + Duration::days(2)).and_time(NaiveTime::default());

    let initial = tz.offset_from_utc_datetime(&cursor);
    let mut current = initial.fix().local_minus_utc();
    let mut observances = vec![Observance::new(NaiveDateTime::default(), current, initial)];

    while cursor < end {
        let next = cursor + Duration::hours(1);
        if tz.offset_from_utc_datetime(&next).fix().local_minus_utc() != current {
            // changes land on whole minutes
            let mut switch = cursor + Duration::minutes(1);
            while tz.offset_from_utc_datetime(&switch).fix().local_minus_utc() == current {
                switch += Duration::minutes(1);
            }
            let offset = tz.offset_from_utc_datetime(&switch);
            let starts = switch + Duration::seconds(i64::from(current));
            observances.push(Observance::new(starts, current, offset));
            current = offset.fix().local_minus_utc();
        }
        cursor = next;
    }

    let mut lines = vec!["BEGIN:VTIMEZONE".to_string(), format!("TZID:{}", tz.name())];
    lines.extend(observances.iter().flat_map(Observance::lines));
    lines.push("END:VTIMEZONE".to_string());
    lines
}

/// `+0800`, or `+053000`-style when the offset has seconds.
fn utc_offset(seconds: i32) -> String {
    let sign = if seconds < 0 { '-' } else { '+' };
    let abs = seconds.unsigned_abs();
    let (h, m, s) = (abs / 3600, abs % 3600 / 60, abs % 60);
    if s == 0 {
        format!("{}{:02}{:02}", sign, h, m)
    } else {
        format!("{}{:02}{:02}{:02}", sign, h, m, s)
    }
}

fn local_datetime(date: NaiveDate, time: NaiveTime) -> String {
    date.and_time(time).format("%Y%m%dT%H%M%S").to_string()
}

fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Split lines longer than 75 octets; continuation lines start with a space.
/// Never splits inside a UTF-8 sequence.
fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return line.to_string();
    }

    let mut folded = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut width = 0;
    for c in line.chars() {
        let len = c.len_utf8();
        if width + len > MAX_LINE_OCTETS {
            folded.push_str("\r\n ");
            // the leading space counts toward the continuation line
            width = 1;
        }
        folded.push(c);
        width += len;
    }
    folded
}
