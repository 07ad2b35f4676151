use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// First month of a football season. Matches from July of year Y through June of
/// Y+1 share the label "Y-(Y+1)".
const SEASON_START_MONTH: u32 = 7;

pub fn season_label(date: NaiveDate) -> String {
    let year = date.year();
    if date.month() >= SEASON_START_MONTH {
        format!("{}-{}", year, year + 1)
    } else {
        format!("{}-{}", year - 1, year)
    }
}

/// Starting year of a "YYYY-YYYY" label, if it looks like one.
pub fn season_start_year(label: &str) -> Option<i32> {
    let (start, end) = label.trim().split_once('-')?;
    let start = start.trim().parse::<i32>().ok()?;
    let end = end.trim().parse::<i32>().ok()?;
    (end == start + 1).then_some(start)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeasonSet {
    labels: BTreeSet<String>,
}

impl SeasonSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(label: &str) -> Self {
        let mut set = Self::new();
        set.insert(label);
        set
    }

    /// Comma/semicolon/space separated list, e.g. "2022-2023,2023-2024".
    pub fn parse(raw: &str) -> Self {
        raw.split([',', ';', ' '])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn insert(&mut self, label: &str) -> bool {
        self.labels.insert(label.trim().to_string())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl<'a> FromIterator<&'a str> for SeasonSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = Self::new();
        for label in iter {
            set.insert(label);
        }
        set
    }
}

impl FromIterator<String> for SeasonSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = Self::new();
        for label in iter {
            set.insert(&label);
        }
        set
    }
}

impl fmt::Display for SeasonSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.labels.iter().cloned().collect::<Vec<_>>().join(",");
        f.write_str(&joined)
    }
}

/// A missing filter selects every season.
pub fn matches_filter(filter: Option<&SeasonSet>, label: &str) -> bool {
    filter.is_none_or(|set| set.contains(label))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn july_through_december_opens_a_season() {
        for month in 7..=12 {
            assert_eq!(season_label(d(2023, month, 1)), "2023-2024");
        }
        assert_eq!(season_label(d(2023, 7, 1)), "2023-2024");
        assert_eq!(season_label(d(2023, 12, 31)), "2023-2024");
    }

    #[test]
    fn january_through_june_closes_a_season() {
        for month in 1..=6 {
            assert_eq!(season_label(d(2024, month, 15)), "2023-2024");
        }
        assert_eq!(season_label(d(2024, 6, 30)), "2023-2024");
    }

    #[test]
    fn label_is_stable_across_calls() {
        let date = d(2019, 8, 10);
        let first = season_label(date);
        for _ in 0..10 {
            assert_eq!(season_label(date), first);
        }
    }

    #[test]
    fn parse_trims_and_dedups() {
        let set = SeasonSet::parse(" 2022-2023, 2023-2024;2022-2023 ");
        assert_eq!(set.len(), 2);
        assert!(set.contains("2022-2023"));
        assert!(set.contains("2023-2024"));
        assert_eq!(set.to_string(), "2022-2023,2023-2024");
    }

    #[test]
    fn start_year_requires_consecutive_years() {
        assert_eq!(season_start_year("2021-2022"), Some(2021));
        assert_eq!(season_start_year("2021-2023"), None);
        assert_eq!(season_start_year("garbage"), None);
    }

    #[test]
    fn missing_filter_matches_everything() {
        assert!(matches_filter(None, "1999-2000"));
        let set = SeasonSet::single("2023-2024");
        assert!(matches_filter(Some(&set), "2023-2024"));
        assert!(!matches_filter(Some(&set), "2022-2023"));
    }
}
