//! Reporting period selection: a financial-year label plus a month or "ALL".
//!
//! The listing's dropdowns are matched by visible text, so both parts are kept
//! as the exact labels the site shows.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Label the month dropdown uses for "no month filter".
pub const ALL_MONTHS: &str = "ALL";

/// Month labels in financial-year order (April first).
pub const FINANCIAL_MONTHS: [&str; 12] = [
    "April", "May", "June", "July", "August", "September",
    "October", "November", "December", "January", "February", "March",
];

/// First financial year the listing publishes reports for.
pub const FIRST_FINANCIAL_YEAR: i32 = 2023;

static FY_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap());

#[derive(Error, Debug, PartialEq)]
pub enum PeriodError {
    #[error("financial year '{0}' is not in YYYY-YY form (e.g. 2024-25)")]
    MalformedYear(String),

    #[error("financial year '{0}' must span consecutive years")]
    NonConsecutiveYear(String),

    #[error("unknown month '{0}' (expected ALL or a month name)")]
    UnknownMonth(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthSelection {
    All,
    Month(&'static str),
}

impl MonthSelection {
    pub fn parse(raw: &str) -> Result<Self, PeriodError> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case(ALL_MONTHS) {
            return Ok(MonthSelection::All);
        }
        FINANCIAL_MONTHS
            .iter()
            .find(|m| m.eq_ignore_ascii_case(trimmed))
            .map(|m| MonthSelection::Month(*m))
            .ok_or_else(|| PeriodError::UnknownMonth(raw.to_string()))
    }

    /// Text of the dropdown option to click.
    pub fn label(&self) -> &str {
        match self {
            MonthSelection::All => ALL_MONTHS,
            MonthSelection::Month(m) => m,
        }
    }
}

/// A validated (financial year, month) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    start_year: i32,
    month: MonthSelection,
}

impl Period {
    pub fn parse(year: &str, month: &str) -> Result<Self, PeriodError> {
        let year = year.trim();
        let caps = FY_LABEL
            .captures(year)
            .ok_or_else(|| PeriodError::MalformedYear(year.to_string()))?;
        let start: i32 = caps[1]
            .parse()
            .map_err(|_| PeriodError::MalformedYear(year.to_string()))?;
        let end_suffix: i32 = caps[2]
            .parse()
            .map_err(|_| PeriodError::MalformedYear(year.to_string()))?;
        if (start + 1) % 100 != end_suffix {
            return Err(PeriodError::NonConsecutiveYear(year.to_string()));
        }

        Ok(Self {
            start_year: start,
            month: MonthSelection::parse(month)?,
        })
    }

    /// The financial-year label as displayed, e.g. `2024-25`.
    pub fn year_label(&self) -> String {
        format!("{}-{:02}", self.start_year, (self.start_year + 1) % 100)
    }

    pub fn month_label(&self) -> &str {
        self.month.label()
    }

    pub fn month(&self) -> &MonthSelection {
        &self.month
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}", self.year_label(), self.month_label())
    }
}

/// Financial-year labels from the first published year through `through_start_year`,
/// newest first, the way the year picker lists them.
pub fn financial_year_labels(through_start_year: i32) -> Vec<String> {
    (FIRST_FINANCIAL_YEAR..=through_start_year)
        .rev()
        .map(|y| format!("{}-{:02}", y, (y + 1) % 100))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_period() {
        let period = Period::parse("2024-25", "april").unwrap();
        assert_eq!(period.year_label(), "2024-25");
        assert_eq!(period.month_label(), "April");
    }

    #[test]
    fn test_parse_all_months() {
        let period = Period::parse("2023-24", "ALL").unwrap();
        assert_eq!(period.month(), &MonthSelection::All);
        assert_eq!(period.month_label(), "ALL");
    }

    #[test]
    fn test_century_rollover() {
        let period = Period::parse("2099-00", "March").unwrap();
        assert_eq!(period.year_label(), "2099-00");
    }

    #[test]
    fn test_rejects_malformed_year() {
        assert_eq!(
            Period::parse("2024", "ALL"),
            Err(PeriodError::MalformedYear("2024".into()))
        );
        assert!(matches!(
            Period::parse("2024-26", "ALL"),
            Err(PeriodError::NonConsecutiveYear(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_month() {
        assert!(matches!(
            Period::parse("2024-25", "Smarch"),
            Err(PeriodError::UnknownMonth(_))
        ));
    }

    #[test]
    fn test_financial_year_labels_newest_first() {
        assert_eq!(
            financial_year_labels(2025),
            vec!["2025-26", "2024-25", "2023-24"]
        );
    }
}
