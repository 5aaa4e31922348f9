//! Segment matcher
//!
//! Selects index entries by partial time, date and key fragments. Each
//! fragment is a prefix of the full segment:
//!
//! ```text
//! time  "10"  "10:30"  "10:30:15"  "10:30:15_PM"  "10_PM"
//! date  "04"  "04_06"  "04_06_2024"  "2024"  "_06_2024"
//! key   exact key
//! ```
//!
//! A lone four-digit date fragment is a year, and an empty date field is
//! skipped. Fields left out of a fragment are wildcards, the meridiem
//! included. A candidate is kept when any rule matches and is attributed to
//! the first one, in the order time, date, key.

use crate::ident::{CalendarDate, ClockTime, Meridiem, ParseIdError};
use crate::record::IndexEntry;
use std::str::FromStr;

/// Rule that selected a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchRule {
    Time,
    Date,
    Key,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentMatch {
    pub id: String,
    pub rule: MatchRule,
}

/// Partial `[hour, minute, second, meridiem]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeFragment {
    pub hour: Option<u8>,
    pub minute: Option<u8>,
    pub second: Option<u8>,
    pub meridiem: Option<Meridiem>,
}

impl TimeFragment {
    pub fn matches(&self, time: &ClockTime) -> bool {
        field_eq(self.hour, time.hour)
            && field_eq(self.minute, time.minute)
            && field_eq(self.second, time.second)
            && field_eq(self.meridiem, time.meridiem)
    }
}

impl FromStr for TimeFragment {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseIdError::Time(s.to_string());
        let s = s.trim();

        let (clock, meridiem) = match s.split_once('_') {
            Some((clock, m)) => (clock, Some(m.parse::<Meridiem>().map_err(|_| err())?)),
            None => (s, None),
        };
        let parts: Vec<u8> = clock
            .split(':')
            .map(|p| p.trim().parse::<u8>())
            .collect::<Result<_, _>>()
            .map_err(|_| err())?;
        if parts.len() > 3 {
            return Err(err());
        }

        let fragment = Self {
            hour: parts.first().copied(),
            minute: parts.get(1).copied(),
            second: parts.get(2).copied(),
            meridiem,
        };
        let valid = fragment.hour.map_or(true, |h| (1..=12).contains(&h))
            && fragment.minute.map_or(true, |m| m <= 59)
            && fragment.second.map_or(true, |s| s <= 59);
        if !valid {
            return Err(err());
        }

        Ok(fragment)
    }
}

/// Partial `[day, month, year]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateFragment {
    pub day: Option<u8>,
    pub month: Option<u8>,
    pub year: Option<u16>,
}

impl DateFragment {
    pub fn matches(&self, date: &CalendarDate) -> bool {
        field_eq(self.day, date.day)
            && field_eq(self.month, date.month)
            && field_eq(self.year, date.year)
    }
}

impl FromStr for DateFragment {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseIdError::Date(s.to_string());
        let parts: Vec<&str> = s.trim().split('_').map(str::trim).collect();
        let fields: Vec<Option<u16>> = parts
            .iter()
            .map(|p| match *p {
                "" => Ok(None),
                p => p.parse::<u16>().map(Some),
            })
            .collect::<Result<_, _>>()
            .map_err(|_| err())?;

        let (day, month, year) = match fields[..] {
            [Some(year)] if parts[0].len() == 4 => (None, None, Some(year)),
            [day] => (day, None, None),
            [day, month] => (day, month, None),
            [day, month, year] => (day, month, year),
            _ => return Err(err()),
        };
        let valid = (day.is_some() || month.is_some() || year.is_some())
            && day.map_or(true, |d| (1..=31).contains(&d))
            && month.map_or(true, |m| (1..=12).contains(&m));
        if !valid {
            return Err(err());
        }

        Ok(Self {
            day: day.map(|d| d as u8),
            month: month.map(|m| m as u8),
            year,
        })
    }
}

fn field_eq<T: PartialEq>(wanted: Option<T>, actual: T) -> bool {
    wanted.map_or(true, |w| w == actual)
}

/// Parsed fragments of a lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentQuery {
    pub key: Option<String>,
    pub time: Option<TimeFragment>,
    pub date: Option<DateFragment>,
}

impl SegmentQuery {
    pub fn parse(key: Option<&str>, time: Option<&str>, date: Option<&str>) -> Result<Self, ParseIdError> {
        Ok(Self {
            key: key.map(str::to_string),
            time: time.map(str::parse::<TimeFragment>).transpose()?,
            date: date.map(str::parse::<DateFragment>).transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_none() && self.time.is_none() && self.date.is_none()
    }

    /// First rule that selects `entry`, if any
    pub fn rule_for(&self, entry: &IndexEntry) -> Option<MatchRule> {
        if self.time.is_some_and(|t| t.matches(&entry.insertion_time)) {
            return Some(MatchRule::Time);
        }
        if self.date.is_some_and(|d| d.matches(&entry.insertion_date)) {
            return Some(MatchRule::Date);
        }
        if self.key.as_deref().is_some_and(|k| k == entry.key) {
            return Some(MatchRule::Key);
        }
        None
    }
}

/// Entries selected by `query`, each reported once, in index order
pub fn match_segments<'a, I>(entries: I, query: &SegmentQuery) -> Vec<SegmentMatch>
where
    I: IntoIterator<Item = &'a IndexEntry>,
{
    entries
        .into_iter()
        .filter_map(|entry| {
            query.rule_for(entry).map(|rule| SegmentMatch {
                id: entry.id.clone(),
                rule,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, key: &str, time: &str, date: &str) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            key: key.to_string(),
            partition: "log".into(),
            insertion_time: time.parse().unwrap(),
            insertion_date: date.parse().unwrap(),
            embedder_id: "test".into(),
            description: String::new(),
            tags: Vec::new(),
            ordinal: 0,
        }
    }

    #[test]
    fn test_parse_time_fragments() {
        let t: TimeFragment = "10".parse().unwrap();
        assert_eq!(t.hour, Some(10));
        assert_eq!(t.minute, None);
        assert_eq!(t.meridiem, None);

        let t: TimeFragment = "10:30:15_pm".parse().unwrap();
        assert_eq!((t.hour, t.minute, t.second), (Some(10), Some(30), Some(15)));
        assert_eq!(t.meridiem, Some(Meridiem::Pm));

        assert!("13".parse::<TimeFragment>().is_err());
        assert!("10:61".parse::<TimeFragment>().is_err());
        assert!("10:00:00:00".parse::<TimeFragment>().is_err());
        assert!("10_XM".parse::<TimeFragment>().is_err());
    }

    #[test]
    fn test_parse_date_fragments() {
        let d: DateFragment = "04_06".parse().unwrap();
        assert_eq!((d.day, d.month, d.year), (Some(4), Some(6), None));

        let d: DateFragment = "2024".parse().unwrap();
        assert_eq!((d.day, d.month, d.year), (None, None, Some(2024)));
        let d: DateFragment = "_06_2024".parse().unwrap();
        assert_eq!((d.day, d.month, d.year), (None, Some(6), Some(2024)));
        let d: DateFragment = "__2024".parse().unwrap();
        assert_eq!((d.day, d.month, d.year), (None, None, Some(2024)));

        assert!("32".parse::<DateFragment>().is_err());
        assert!("".parse::<DateFragment>().is_err());
        assert!("__".parse::<DateFragment>().is_err());
        assert!("04_13_2024".parse::<DateFragment>().is_err());
        assert!("04-06".parse::<DateFragment>().is_err());
    }

    #[test]
    fn test_hour_fragment_matches_whole_hour() {
        let entries = vec![
            entry("a", "k", "10:00:00_AM", "04_06_2024"),
            entry("b", "k", "10:59:59_AM", "04_06_2024"),
            entry("c", "k", "11:00:00_AM", "04_06_2024"),
            entry("d", "k", "10:15:00_PM", "04_06_2024"),
        ];
        let query = SegmentQuery::parse(None, Some("10"), None).unwrap();
        let ids: Vec<_> = match_segments(&entries, &query).into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["a", "b", "d"]);

        let query = SegmentQuery::parse(None, Some("10_AM"), None).unwrap();
        assert_eq!(match_segments(&entries, &query).len(), 2);

        let query = SegmentQuery::parse(None, Some("10:59:59"), None).unwrap();
        let matches = match_segments(&entries, &query);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "b");
    }

    #[test]
    fn test_date_prefix() {
        let entries = vec![
            entry("a", "k", "10:00:00_AM", "04_06_2024"),
            entry("b", "k", "10:00:00_AM", "04_07_2024"),
            entry("c", "k", "10:00:00_AM", "05_06_2024"),
        ];
        let query = SegmentQuery::parse(None, None, Some("04")).unwrap();
        assert_eq!(match_segments(&entries, &query).len(), 2);

        let query = SegmentQuery::parse(None, None, Some("04_06_2024")).unwrap();
        assert_eq!(match_segments(&entries, &query)[0].id, "a");
    }

    #[test]
    fn test_year_fragment() {
        let entries = vec![
            entry("a", "k", "10:00:00_AM", "04_06_2024"),
            entry("b", "k", "10:00:00_AM", "31_12_2024"),
            entry("c", "k", "10:00:00_AM", "01_01_2025"),
        ];
        let query = SegmentQuery::parse(None, None, Some("2024")).unwrap();
        let ids: Vec<_> = match_segments(&entries, &query).into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let query = SegmentQuery::parse(None, None, Some("_01_2025")).unwrap();
        assert_eq!(match_segments(&entries, &query)[0].id, "c");
    }

    #[test]
    fn test_precedence_reports_each_candidate_once() {
        let entries = vec![
            entry("both", "notes", "09:00:00_AM", "04_06_2024"),
            entry("key-only", "notes", "09:00:00_AM", "01_01_2023"),
            entry("time", "notes", "03:00:00_PM", "04_06_2024"),
            entry("none", "other", "09:00:00_AM", "01_01_2023"),
        ];
        let query = SegmentQuery::parse(Some("notes"), Some("3"), Some("04_06")).unwrap();
        let matches = match_segments(&entries, &query);

        assert_eq!(
            matches,
            vec![
                SegmentMatch { id: "both".into(), rule: MatchRule::Date },
                SegmentMatch { id: "key-only".into(), rule: MatchRule::Key },
                SegmentMatch { id: "time".into(), rule: MatchRule::Time },
            ]
        );
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        let entries = vec![entry("a", "k", "10:00:00_AM", "04_06_2024")];
        let query = SegmentQuery::default();
        assert!(query.is_empty());
        assert!(match_segments(&entries, &query).is_empty());
    }
}
