//! Calendar decomposition of date columns

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub const DOW_LEVELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

pub const MONTH_LEVELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// A feature extracted from a date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateFeature {
    /// Day of week, as a factor Sun..Sat
    Dow,
    /// Month, as a factor Jan..Dec
    Month,
    Year,
    /// Day of year, 1-based
    Doy,
}

impl DateFeature {
    pub fn suffix(&self) -> &'static str {
        match self {
            DateFeature::Dow => "dow",
            DateFeature::Month => "month",
            DateFeature::Year => "year",
            DateFeature::Doy => "doy",
        }
    }

    /// Name of the derived column for `source`
    pub fn column_name(&self, source: &str) -> String {
        format!("{}_{}", source, self.suffix())
    }

    /// Full level set for factor-valued features
    pub fn levels(&self) -> Option<Vec<String>> {
        match self {
            DateFeature::Dow => Some(DOW_LEVELS.iter().map(|s| s.to_string()).collect()),
            DateFeature::Month => Some(MONTH_LEVELS.iter().map(|s| s.to_string()).collect()),
            DateFeature::Year | DateFeature::Doy => None,
        }
    }

    pub fn label(&self, date: NaiveDate) -> &'static str {
        match self {
            DateFeature::Dow => DOW_LEVELS[date.weekday().num_days_from_sunday() as usize],
            DateFeature::Month => MONTH_LEVELS[date.month0() as usize],
            DateFeature::Year | DateFeature::Doy => "",
        }
    }

    pub fn number(&self, date: NaiveDate) -> i32 {
        match self {
            DateFeature::Year => date.year(),
            DateFeature::Doy => date.ordinal() as i32,
            DateFeature::Dow => date.weekday().num_days_from_sunday() as i32,
            DateFeature::Month => date.month() as i32,
        }
    }

    pub fn is_factor(&self) -> bool {
        self.levels().is_some()
    }
}

impl std::str::FromStr for DateFeature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dow" => Ok(DateFeature::Dow),
            "month" => Ok(DateFeature::Month),
            "year" => Ok(DateFeature::Year),
            "doy" => Ok(DateFeature::Doy),
            _ => Err(format!("Unknown date feature: '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        // 2013-01-01 was a Tuesday
        let date = NaiveDate::from_ymd_opt(2013, 1, 1).unwrap();
        assert_eq!(DateFeature::Dow.label(date), "Tue");
        assert_eq!(DateFeature::Month.label(date), "Jan");
        assert_eq!(DateFeature::Doy.number(date), 1);
        assert_eq!(DateFeature::Year.number(date), 2013);
    }

    #[test]
    fn test_column_names() {
        assert_eq!(DateFeature::Dow.column_name("date"), "date_dow");
        assert_eq!(DateFeature::Month.column_name("date"), "date_month");
    }
}
