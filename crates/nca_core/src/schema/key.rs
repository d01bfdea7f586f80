use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchKeyError {
    #[error("invalid issue key format")]
    Format,
    #[error("incorrect number of date/edition digits")]
    DigitCount,
    #[error("invalid date")]
    InvalidDate,
}

/// The natural identity of an issue: `<lccn>/<YYYYMMDDEE>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IssueKey(String);

impl IssueKey {
    pub fn new(lccn: &str, date: NaiveDate, edition: u32) -> Self {
        IssueKey(format!("{lccn}/{}", date_edition(date, edition)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Newspapers print at most three editions a day.
pub fn is_valid_edition(edition: u32) -> bool {
    (1..=3).contains(&edition)
}

/// `YYYYMMDDEE`
pub fn date_edition(date: NaiveDate, edition: u32) -> String {
    format!("{}{edition:02}", date.format("%Y%m%d"))
}

/// Parses a `YYYY-MM-DD` date, rejecting anything that would not format back
/// to the same string (e.g. `2001-2-3`).
pub fn parse_raw_date(raw: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    (date.format("%Y-%m-%d").to_string() == raw).then_some(date)
}

/// Replaces tabs so a value can sit inside a tab-separated record.
pub fn escape_tsv(value: &str) -> String {
    value.replace('\t', "\\t")
}

/// A partial issue key: an LCCN followed by zero or more of year, month, day,
/// and edition. Zero means "not given".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SearchKey {
    pub lccn: String,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub ed: u32,
}

fn search_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\w+)(/[0-9]+)?$").expect("search key pattern"))
}

impl SearchKey {
    pub fn parse(input: &str) -> Result<Self, SearchKeyError> {
        let groups = search_key_pattern()
            .captures(input)
            .ok_or(SearchKeyError::Format)?;
        let mut key = SearchKey {
            lccn: groups[1].to_string(),
            ..SearchKey::default()
        };

        let Some(digits) = groups.get(2).map(|m| &m.as_str()[1..]) else {
            return Ok(key);
        };

        let len = digits.len();
        if !(4..=10).contains(&len) || len % 2 != 0 {
            return Err(SearchKeyError::DigitCount);
        }

        // The pattern guarantees ASCII digits, so the slices are valid numbers.
        let number = |range: std::ops::Range<usize>| digits[range].parse::<u32>().unwrap_or(0);
        key.year = number(0..4) as i32;
        if len >= 6 {
            key.month = number(4..6);
        }
        if len >= 8 {
            key.day = number(6..8);
        }
        if len == 10 {
            key.ed = number(8..10);
        }

        let valid = NaiveDate::from_ymd_opt(key.year, key.month.max(1), key.day.max(1)).is_some();
        let month_given_as_zero = len >= 6 && key.month == 0;
        let day_given_as_zero = len >= 8 && key.day == 0;
        if !valid || month_given_as_zero || day_given_as_zero {
            return Err(SearchKeyError::InvalidDate);
        }

        Ok(key)
    }
}

impl FromStr for SearchKey {
    type Err = SearchKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SearchKey::parse(s)
    }
}

impl fmt::Display for SearchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lccn)?;
        if self.year > 0 {
            write!(f, "/{:04}", self.year)?;
        }
        if self.month > 0 {
            write!(f, "{:02}", self.month)?;
        }
        if self.day > 0 {
            write!(f, "{:02}", self.day)?;
        }
        if self.ed > 0 {
            write!(f, "{:02}", self.ed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_date_must_be_canonical() {
        assert!(parse_raw_date("2001-02-03").is_some());
        assert!(parse_raw_date("2001-2-3").is_none());
        assert!(parse_raw_date("2001-02-30").is_none());
        assert!(parse_raw_date("").is_none());
    }

    #[test]
    fn zero_month_is_not_a_date() {
        assert_eq!(
            SearchKey::parse("sn12345678/200100"),
            Err(SearchKeyError::InvalidDate)
        );
    }
}
