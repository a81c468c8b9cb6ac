use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ScheduleError;

/// Optional marker users append to week ranges ("1-16周").
pub const WEEK_MARKER: char = '周';

/// Upper bound on a single week number. No term runs longer than this.
pub const MAX_WEEK: u32 = 60;

/// Concrete set of week numbers, always sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekSet(BTreeSet<u32>);

impl WeekSet {
    pub fn contains(&self, week: u32) -> bool {
        self.0.contains(&week)
    }

    pub fn intersects(&self, other: &WeekSet) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical compressed form, e.g. `{1,2,3,5}` -> `"1-3,5"`.
    ///
    /// Not guaranteed to reproduce the grouping of the string the set was
    /// parsed from.
    pub fn to_spec(&self) -> String {
        let mut parts = Vec::new();
        let mut weeks = self.iter().peekable();

        while let Some(low) = weeks.next() {
            let mut high = low;
            while let Some(next) = high.checked_add(1).filter(|n| weeks.peek() == Some(n)) {
                high = next;
                weeks.next();
            }
            if low == high {
                parts.push(low.to_string());
            } else {
                parts.push(format!("{}-{}", low, high));
            }
        }

        parts.join(",")
    }
}

impl FromIterator<u32> for WeekSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Expand a week-range string such as `"1-8,10,12-16"` into its week set.
///
/// Every `周` marker is stripped and each comma-separated token is trimmed
/// before parsing. An empty spec is rejected rather than read as "no weeks".
pub fn parse_weeks(spec: &str) -> Result<WeekSet, ScheduleError> {
    let cleaned: String = spec.chars().filter(|c| *c != WEEK_MARKER).collect();
    if cleaned.trim().is_empty() {
        return Err(ScheduleError::Format("week range is empty".to_string()));
    }

    let mut weeks = BTreeSet::new();
    for token in cleaned.split(',') {
        let token = token.trim();
        let (low, high) = match token.split_once('-') {
            Some((low, high)) => (parse_week(low, token)?, parse_week(high, token)?),
            None => {
                let week = parse_week(token, token)?;
                (week, week)
            }
        };

        if low > high {
            return Err(ScheduleError::Format(format!(
                "range {:?} starts after it ends",
                token
            )));
        }
        weeks.extend(low..=high);
    }

    Ok(WeekSet(weeks))
}

fn parse_week(raw: &str, token: &str) -> Result<u32, ScheduleError> {
    let raw = raw.trim();
    // a leading minus ("-3") leaves an empty lower bound and lands here
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ScheduleError::Format(format!("invalid token {:?}", token)));
    }

    let week: u32 = raw
        .parse()
        .map_err(|_| ScheduleError::Format(format!("week number too large in {:?}", token)))?;

    if week == 0 {
        return Err(ScheduleError::Format(format!(
            "week numbers start at 1, got {:?}",
            token
        )));
    }
    if week > MAX_WEEK {
        return Err(ScheduleError::Format(format!(
            "week {} exceeds the maximum of {}",
            week, MAX_WEEK
        )));
    }

    Ok(week)
}

/// A validated week-range string together with its expanded set.
///
/// The string is the source of truth and is what gets persisted; the set
/// is derived when the spec is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WeekSpec {
    raw: String,
    weeks: WeekSet,
}

impl WeekSpec {
    /// Parses `raw`, keeping its grouping and marker but dropping whitespace.
    pub fn parse(raw: &str) -> Result<Self, ScheduleError> {
        let weeks = parse_weeks(raw)?;
        Ok(Self {
            raw: raw.chars().filter(|c| !c.is_whitespace()).collect(),
            weeks,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn week_set(&self) -> &WeekSet {
        &self.weeks
    }
}

impl FromStr for WeekSpec {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for WeekSpec {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WeekSpec> for String {
    fn from(spec: WeekSpec) -> Self {
        spec.raw
    }
}

impl fmt::Display for WeekSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_spec_has_no_whitespace() {
        let spec = WeekSpec::parse(" 1, 3 ,5 周").unwrap();
        assert_eq!(spec.as_str(), "1,3,5周");
        assert_eq!(spec.week_set().iter().collect::<Vec<_>>(), vec![1, 3, 5]);
    }

    #[test]
    fn test_to_spec_at_the_top_of_the_range() {
        let set: WeekSet = [u32::MAX - 1, u32::MAX, 3].into_iter().collect();
        assert_eq!(set.to_spec(), format!("3,{}-{}", u32::MAX - 1, u32::MAX));
    }

    fn weeks(spec: &str) -> Vec<u32> {
        parse_weeks(spec).expect("valid spec").iter().collect()
    }

    #[test]
    fn test_parse_mixed_ranges_and_singles() {
        assert_eq!(weeks("1-3,5"), vec![1, 2, 3, 5]);
        assert_eq!(weeks("1-8,10,12-16").len(), 14);
    }

    #[test]
    fn test_parse_strips_week_marker_and_whitespace() {
        assert_eq!(weeks("1-4周"), vec![1, 2, 3, 4]);
        assert_eq!(weeks(" 1, 3 ,5-6 "), vec![1, 3, 5, 6]);
    }

    #[test]
    fn test_duplicates_collapse() {
        assert_eq!(weeks("1-3,2,3,1-2"), vec![1, 2, 3]);
    }

    #[test]
    fn test_single_week_range() {
        assert_eq!(weeks("7-7"), vec![7]);
    }

    #[test]
    fn test_empty_spec_is_rejected() {
        assert!(matches!(parse_weeks(""), Err(ScheduleError::Format(_))));
        assert!(matches!(parse_weeks("  "), Err(ScheduleError::Format(_))));
        assert!(matches!(parse_weeks("周"), Err(ScheduleError::Format(_))));
    }

    #[test]
    fn test_malformed_tokens_are_rejected() {
        for spec in ["a", "1,,3", "1-", "-3", "1-2-3", "1.5", "3-1", "0", "0-4", "61"] {
            assert!(
                matches!(parse_weeks(spec), Err(ScheduleError::Format(_))),
                "expected {:?} to fail",
                spec
            );
        }
    }

    #[test]
    fn test_every_week_is_positive() {
        for spec in ["1", "1-16", "2,4,6-9", "60"] {
            assert!(parse_weeks(spec).unwrap().iter().all(|w| w >= 1));
        }
    }

    #[test]
    fn test_to_spec_compresses_runs() {
        let set = parse_weeks("5,1,2,3,9-10").unwrap();
        assert_eq!(set.to_spec(), "1-3,5,9-10");
        assert_eq!(parse_weeks(&set.to_spec()).unwrap(), set);
    }

    #[test]
    fn test_week_spec_serde_keeps_original_string() {
        let spec: WeekSpec = serde_json::from_str("\"1-16周\"").unwrap();
        assert_eq!(spec.as_str(), "1-16周");
        assert_eq!(spec.week_set().len(), 16);
        assert_eq!(serde_json::to_string(&spec).unwrap(), "\"1-16周\"");

        assert!(serde_json::from_str::<WeekSpec>("\"9-1\"").is_err());
    }
}
