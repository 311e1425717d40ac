use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Decimal;

/// A single value in a sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(Decimal),
    Date(NaiveDate),
}

impl Cell {
    pub fn from_raw(raw: &str) -> Self {
        if raw.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(raw.to_owned())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Cell::Number(value) => Some(*value),
            Cell::Text(text) => parse_amount(text),
            Cell::Empty | Cell::Date(_) => None,
        }
    }

    /// Numeric value for amount columns: anything that doesn't parse counts as zero.
    pub fn amount(&self) -> Decimal {
        self.as_decimal().unwrap_or(Decimal::ZERO)
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(date) => Some(*date),
            Cell::Text(text) => parse_date(text),
            Cell::Empty | Cell::Number(_) => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(text) => f.write_str(text),
            Cell::Number(value) => write!(f, "{value}"),
            Cell::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

impl From<Decimal> for Cell {
    fn from(value: Decimal) -> Self {
        Cell::Number(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::from_raw(value)
    }
}

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥'];

/// Parse an amount as found in payroll exports: `1,234.50`, `$ 99`, `(12.00)`, `1e3`.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let mut text = raw.trim();
    let negative = text.starts_with('(') && text.ends_with(')');
    if negative {
        text = text[1..text.len() - 1].trim();
    }
    let text = text.trim_start_matches(CURRENCY_SYMBOLS).trim();
    if text.is_empty() {
        return None;
    }

    let cleaned: String = text.chars().filter(|&c| c != ',').collect();
    let value = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()?;

    Some(if negative { -value } else { value })
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M:%S"];

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .map(|datetime| datetime.date())
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|datetime| datetime.date_naive())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn amounts() {
        assert_eq!(parse_amount("100"), Some(dec("100")));
        assert_eq!(parse_amount(" 1,234.50 "), Some(dec("1234.50")));
        assert_eq!(parse_amount("$ 99.10"), Some(dec("99.10")));
        assert_eq!(parse_amount("€12"), Some(dec("12")));
        assert_eq!(parse_amount("(12.00)"), Some(dec("-12.00")));
        assert_eq!(parse_amount("-7.5"), Some(dec("-7.5")));
        assert_eq!(parse_amount("1e3"), Some(dec("1000")));
    }

    #[test]
    fn malformed_amounts_are_zero() {
        assert_eq!(parse_amount("n/a"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("$"), None);
        assert_eq!(Cell::from_raw("n/a").amount(), Decimal::ZERO);
        assert_eq!(Cell::Empty.amount(), Decimal::ZERO);
    }

    #[test]
    fn dates() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 14);
        for raw in [
            "2025-03-14",
            "2025/03/14",
            "03/14/2025",
            "14.03.2025",
            "March 14, 2025",
            "Mar 14, 2025",
            "2025-03-14 08:30:00",
            "2025-03-14T08:30:00",
            "2025-03-14T08:30:00+01:00",
        ] {
            assert_eq!(parse_date(raw), expected, "{raw}");
        }
    }

    #[test]
    fn unparseable_dates() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("soon"), None);
        assert_eq!(parse_date("2025-13-01"), None);
        assert_eq!(Cell::Number(Decimal::ONE).as_date(), None);
    }

    #[test]
    fn native_dates_pass_through() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(Cell::Date(date).as_date(), Some(date));
        assert_eq!(Cell::Date(date).to_string(), "2024-02-29");
    }

    #[test]
    fn empty_cells() {
        assert!(Cell::from_raw("").is_empty());
        assert!(Cell::from_raw("   ").is_empty());
        assert!(!Cell::from_raw("x").is_empty());
        assert_eq!(Cell::from_raw(""), Cell::Empty);
    }
}
