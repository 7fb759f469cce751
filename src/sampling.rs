use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Calendar spacing between target dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Monthly,
    #[default]
    Quarterly,
    Annual,
}

impl Interval {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Annual => "annual",
        }
    }

    pub const fn months(self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::Annual => 12,
        }
    }

    /// Resolver tolerance in days. Coarser spacing gets a wider window.
    pub const fn default_tolerance_days(self) -> u32 {
        match self {
            Self::Monthly => 20,
            Self::Quarterly => 45,
            Self::Annual => 90,
        }
    }

    /// First boundary of the period containing `date`.
    fn period_start(self, date: NaiveDate) -> NaiveDate {
        let month = match self {
            Self::Monthly => date.month(),
            Self::Quarterly => (date.month0() / 3) * 3 + 1,
            Self::Annual => 1,
        };
        // day 1 of a month from 1..=12 always exists
        NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" | "month" => Ok(Self::Monthly),
            "quarterly" | "quarter" => Ok(Self::Quarterly),
            "annual" | "annually" | "yearly" | "year" => Ok(Self::Annual),
            _ => Err(ValidationError::InvalidInterval {
                value: s.to_string(),
            }),
        }
    }
}

/// Target dates on period boundaries, from the boundary of the period holding
/// `start` through the last boundary not after `end`. Empty when `start > end`.
pub fn generate(start: NaiveDate, end: NaiveDate, interval: Interval) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    if start > end {
        return dates;
    }
    let step = Months::new(interval.months());
    let mut current = interval.period_start(start);
    while current <= end {
        dates.push(current);
        match current.checked_add_months(step) {
            Some(next) => current = next,
            None => break,
        }
    }
    dates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn quarterly_aligns_to_quarter_starts() {
        let dates = generate(date(2022, 1, 15), date(2023, 1, 15), Interval::Quarterly);
        assert_eq!(
            dates,
            vec![
                date(2022, 1, 1),
                date(2022, 4, 1),
                date(2022, 7, 1),
                date(2022, 10, 1),
                date(2023, 1, 1),
            ]
        );
    }

    #[test]
    fn quarterly_mid_quarter_start() {
        let dates = generate(date(2022, 8, 20), date(2022, 12, 31), Interval::Quarterly);
        assert_eq!(dates, vec![date(2022, 7, 1), date(2022, 10, 1)]);
    }

    #[test]
    fn monthly_includes_boundary_month() {
        let dates = generate(date(2021, 11, 3), date(2022, 2, 1), Interval::Monthly);
        assert_eq!(
            dates,
            vec![date(2021, 11, 1), date(2021, 12, 1), date(2022, 1, 1), date(2022, 2, 1)]
        );
    }

    #[test]
    fn annual_uses_january_first() {
        let dates = generate(date(2019, 6, 30), date(2021, 12, 31), Interval::Annual);
        assert_eq!(dates, vec![date(2019, 1, 1), date(2020, 1, 1), date(2021, 1, 1)]);
    }

    #[test]
    fn generation_is_repeatable_and_increasing() {
        let a = generate(date(2020, 2, 29), date(2024, 2, 29), Interval::Monthly);
        let b = generate(date(2020, 2, 29), date(2024, 2, 29), Interval::Monthly);
        assert_eq!(a, b);
        assert_eq!(a.len(), 49);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn inverted_range_is_empty() {
        assert!(generate(date(2023, 1, 1), date(2022, 1, 1), Interval::Monthly).is_empty());
    }

    #[test]
    fn parses_interval_names() {
        assert_eq!("Quarterly".parse::<Interval>().unwrap(), Interval::Quarterly);
        assert_eq!("yearly".parse::<Interval>().unwrap(), Interval::Annual);
        assert!(matches!(
            "weekly".parse::<Interval>(),
            Err(ValidationError::InvalidInterval { .. })
        ));
        assert_eq!(Interval::Monthly.default_tolerance_days(), 20);
        assert_eq!(Interval::Quarterly.default_tolerance_days(), 45);
        assert_eq!(Interval::Annual.default_tolerance_days(), 90);
    }
}
