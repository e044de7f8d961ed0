//! Expansion of a service contract into dated visits.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upper bound on visits generated for one contract
pub const MAX_VISITS: usize = 500;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("end date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },

    #[error("schedule would create more than {MAX_VISITS} visits")]
    TooManyVisits,

    #[error("unknown frequency '{0}'")]
    UnknownFrequency(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Weekly,
    Fortnightly,
    Monthly,
    Quarterly,
    HalfYearly,
    Yearly,
}

enum Interval {
    Days(u64),
    Months(u32),
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Weekly => "weekly",
            Frequency::Fortnightly => "fortnightly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::HalfYearly => "half_yearly",
            Frequency::Yearly => "yearly",
        }
    }

    fn interval(&self) -> Interval {
        match self {
            Frequency::Weekly => Interval::Days(7),
            Frequency::Fortnightly => Interval::Days(14),
            Frequency::Monthly => Interval::Months(1),
            Frequency::Quarterly => Interval::Months(3),
            Frequency::HalfYearly => Interval::Months(6),
            Frequency::Yearly => Interval::Months(12),
        }
    }

    /// Date of visit `k` (0-based), always measured from `start`
    fn nth(&self, start: NaiveDate, k: u32) -> Option<NaiveDate> {
        match self.interval() {
            Interval::Days(days) => start.checked_add_days(Days::new(days * u64::from(k))),
            Interval::Months(months) => start.checked_add_months(Months::new(months.checked_mul(k)?)),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly" => Ok(Frequency::Weekly),
            "fortnightly" => Ok(Frequency::Fortnightly),
            "monthly" => Ok(Frequency::Monthly),
            "quarterly" => Ok(Frequency::Quarterly),
            "half_yearly" => Ok(Frequency::HalfYearly),
            "yearly" => Ok(Frequency::Yearly),
            other => Err(ScheduleError::UnknownFrequency(other.to_string())),
        }
    }
}

/// Visit dates from `start` through `end` inclusive.
///
/// Month-based visits are computed as `start + k * interval`, so a contract
/// starting on the 31st visits on the last day of shorter months and returns
/// to the 31st afterwards.
pub fn expand(start: NaiveDate, end: NaiveDate, frequency: Frequency) -> Result<Vec<NaiveDate>, ScheduleError> {
    if end < start {
        return Err(ScheduleError::EndBeforeStart { start, end });
    }

    let mut visits = Vec::new();
    let mut k = 0u32;
    while let Some(date) = frequency.nth(start, k) {
        if date > end {
            break;
        }
        if visits.len() == MAX_VISITS {
            return Err(ScheduleError::TooManyVisits);
        }
        visits.push(date);
        k += 1;
    }
    Ok(visits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monthly_contract_for_a_year_has_twelve_visits() {
        let visits = expand(date(2024, 1, 15), date(2024, 12, 31), Frequency::Monthly).unwrap();
        assert_eq!(visits.len(), 12);
        assert_eq!(visits[0], date(2024, 1, 15));
        assert_eq!(visits[11], date(2024, 12, 15));
    }

    #[test]
    fn end_date_is_inclusive() {
        let visits = expand(date(2024, 1, 1), date(2024, 7, 1), Frequency::Quarterly).unwrap();
        assert_eq!(visits, vec![date(2024, 1, 1), date(2024, 4, 1), date(2024, 7, 1)]);
    }

    #[test]
    fn month_end_start_does_not_drift() {
        let visits = expand(date(2024, 1, 31), date(2024, 4, 30), Frequency::Monthly).unwrap();
        assert_eq!(
            visits,
            vec![date(2024, 1, 31), date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30)]
        );
    }

    #[test]
    fn weekly_and_fortnightly_step_in_days() {
        let weekly = expand(date(2024, 3, 1), date(2024, 3, 31), Frequency::Weekly).unwrap();
        assert_eq!(weekly.len(), 5);
        assert_eq!(weekly[4], date(2024, 3, 29));

        let fortnightly = expand(date(2024, 3, 1), date(2024, 3, 31), Frequency::Fortnightly).unwrap();
        assert_eq!(fortnightly, vec![date(2024, 3, 1), date(2024, 3, 15), date(2024, 3, 29)]);
    }

    #[test]
    fn same_day_contract_has_one_visit() {
        let visits = expand(date(2024, 5, 5), date(2024, 5, 5), Frequency::Yearly).unwrap();
        assert_eq!(visits, vec![date(2024, 5, 5)]);
    }

    #[test]
    fn end_before_start_is_rejected() {
        let err = expand(date(2024, 5, 5), date(2024, 5, 4), Frequency::Monthly).unwrap_err();
        assert!(matches!(err, ScheduleError::EndBeforeStart { .. }));
    }

    #[test]
    fn runaway_schedules_are_capped() {
        let err = expand(date(2000, 1, 1), date(2030, 1, 1), Frequency::Weekly).unwrap_err();
        assert_eq!(err, ScheduleError::TooManyVisits);
    }

    #[test]
    fn frequency_round_trips_through_strings() {
        for f in [Frequency::Weekly, Frequency::HalfYearly, Frequency::Yearly] {
            assert_eq!(f.as_str().parse::<Frequency>().unwrap(), f);
        }
        assert!("daily".parse::<Frequency>().is_err());
    }
}
