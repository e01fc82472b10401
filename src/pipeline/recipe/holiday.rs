//! United States holiday calendar used by the holiday indicator step

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// A named US holiday rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Holiday {
    USNewYearsDay,
    USInaugurationDay,
    USMLKingsBirthday,
    USLincolnsBirthday,
    USWashingtonsBirthday,
    USPresidentsDay,
    USCPulaskisBirthday,
    USGoodFriday,
    USDecorationMemorialDay,
    USMemorialDay,
    USJuneteenthNationalIndependenceDay,
    USIndependenceDay,
    USLaborDay,
    USColumbusDay,
    USElectionDay,
    USVeteransDay,
    USThanksgivingDay,
    USChristmasDay,
}

impl Holiday {
    /// Every holiday in the US calendar, in calendar order
    pub fn us_calendar() -> Vec<Holiday> {
        use Holiday::*;
        vec![
            USNewYearsDay,
            USInaugurationDay,
            USMLKingsBirthday,
            USLincolnsBirthday,
            USWashingtonsBirthday,
            USPresidentsDay,
            USCPulaskisBirthday,
            USGoodFriday,
            USDecorationMemorialDay,
            USMemorialDay,
            USJuneteenthNationalIndependenceDay,
            USIndependenceDay,
            USLaborDay,
            USColumbusDay,
            USElectionDay,
            USVeteransDay,
            USThanksgivingDay,
            USChristmasDay,
        ]
    }

    pub fn name(&self) -> &'static str {
        use Holiday::*;
        match self {
            USNewYearsDay => "USNewYearsDay",
            USInaugurationDay => "USInaugurationDay",
            USMLKingsBirthday => "USMLKingsBirthday",
            USLincolnsBirthday => "USLincolnsBirthday",
            USWashingtonsBirthday => "USWashingtonsBirthday",
            USPresidentsDay => "USPresidentsDay",
            USCPulaskisBirthday => "USCPulaskisBirthday",
            USGoodFriday => "USGoodFriday",
            USDecorationMemorialDay => "USDecorationMemorialDay",
            USMemorialDay => "USMemorialDay",
            USJuneteenthNationalIndependenceDay => "USJuneteenthNationalIndependenceDay",
            USIndependenceDay => "USIndependenceDay",
            USLaborDay => "USLaborDay",
            USColumbusDay => "USColumbusDay",
            USElectionDay => "USElectionDay",
            USVeteransDay => "USVeteransDay",
            USThanksgivingDay => "USThanksgivingDay",
            USChristmasDay => "USChristmasDay",
        }
    }

    /// The date this holiday falls on in `year`, if it is observed that year
    pub fn date_in(&self, year: i32) -> Option<NaiveDate> {
        use Holiday::*;
        match self {
            USNewYearsDay => NaiveDate::from_ymd_opt(year, 1, 1),
            // Inaugurations follow presidential elections, every fourth year
            USInaugurationDay => (year.rem_euclid(4) == 1)
                .then(|| NaiveDate::from_ymd_opt(year, 1, 20))
                .flatten(),
            USMLKingsBirthday => nth_weekday(year, 1, Weekday::Mon, 3),
            USLincolnsBirthday => NaiveDate::from_ymd_opt(year, 2, 12),
            USWashingtonsBirthday => NaiveDate::from_ymd_opt(year, 2, 22),
            USPresidentsDay => nth_weekday(year, 2, Weekday::Mon, 3),
            USCPulaskisBirthday => nth_weekday(year, 3, Weekday::Mon, 1),
            USGoodFriday => easter_sunday(year).map(|d| d - Duration::days(2)),
            USDecorationMemorialDay => NaiveDate::from_ymd_opt(year, 5, 30),
            USMemorialDay => last_weekday(year, 5, Weekday::Mon),
            USJuneteenthNationalIndependenceDay => NaiveDate::from_ymd_opt(year, 6, 19),
            USIndependenceDay => NaiveDate::from_ymd_opt(year, 7, 4),
            USLaborDay => nth_weekday(year, 9, Weekday::Mon, 1),
            USColumbusDay => nth_weekday(year, 10, Weekday::Mon, 2),
            USElectionDay => nth_weekday(year, 11, Weekday::Mon, 1).map(|d| d + Duration::days(1)),
            USVeteransDay => NaiveDate::from_ymd_opt(year, 11, 11),
            USThanksgivingDay => nth_weekday(year, 11, Weekday::Thu, 4),
            USChristmasDay => NaiveDate::from_ymd_opt(year, 12, 25),
        }
    }

    pub fn is_on(&self, date: NaiveDate) -> bool {
        self.date_in(date.year()) == Some(date)
    }
}

impl std::fmt::Display for Holiday {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    nth_weekday(year, month, weekday, 5).or_else(|| nth_weekday(year, month, weekday, 4))
}

/// Gregorian Easter Sunday (anonymous Gregorian algorithm)
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_floating_holidays_2013() {
        assert_eq!(Holiday::USMLKingsBirthday.date_in(2013), Some(ymd(2013, 1, 21)));
        assert_eq!(Holiday::USMemorialDay.date_in(2013), Some(ymd(2013, 5, 27)));
        assert_eq!(Holiday::USLaborDay.date_in(2013), Some(ymd(2013, 9, 2)));
        assert_eq!(Holiday::USThanksgivingDay.date_in(2013), Some(ymd(2013, 11, 28)));
        assert_eq!(Holiday::USElectionDay.date_in(2013), Some(ymd(2013, 11, 5)));
    }

    #[test]
    fn test_easter_based() {
        assert_eq!(easter_sunday(2013), Some(ymd(2013, 3, 31)));
        assert_eq!(easter_sunday(2024), Some(ymd(2024, 3, 31)));
        assert_eq!(Holiday::USGoodFriday.date_in(2013), Some(ymd(2013, 3, 29)));
    }

    #[test]
    fn test_inauguration_every_four_years() {
        assert_eq!(Holiday::USInaugurationDay.date_in(2013), Some(ymd(2013, 1, 20)));
        assert_eq!(Holiday::USInaugurationDay.date_in(2014), None);
    }

    #[test]
    fn test_is_on() {
        assert!(Holiday::USChristmasDay.is_on(ymd(2013, 12, 25)));
        assert!(!Holiday::USChristmasDay.is_on(ymd(2013, 12, 24)));
    }

    #[test]
    fn test_calendar_names_unique() {
        let mut names: Vec<&str> = Holiday::us_calendar().iter().map(|h| h.name()).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_no_two_holidays_share_a_date() {
        let mut dates: Vec<NaiveDate> = Holiday::us_calendar()
            .iter()
            .filter_map(|h| h.date_in(2013))
            .collect();
        let total = dates.len();
        dates.sort();
        dates.dedup();
        assert_eq!(dates.len(), total);
        assert_eq!(Holiday::USWashingtonsBirthday.date_in(2013), Some(ymd(2013, 2, 22)));
        assert_eq!(Holiday::USPresidentsDay.date_in(2013), Some(ymd(2013, 2, 18)));
    }
}
