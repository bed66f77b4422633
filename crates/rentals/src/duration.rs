//! Lease duration arithmetic.
//!
//! Dates and prices deliberately use different rules for months: the end date
//! moves by calendar months while the price counts 30 days per month. A
//! one-month lease in February is therefore priced for more days than it
//! lasts.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use stockyard_core::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Day,
    Week,
    Month,
}

impl DurationUnit {
    /// Days charged per unit.
    pub fn price_multiplier(self) -> u64 {
        match self {
            DurationUnit::Day => 1,
            DurationUnit::Week => 7,
            DurationUnit::Month => 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalDuration {
    pub value: u32,
    pub unit: DurationUnit,
}

impl RentalDuration {
    pub fn new(value: u32, unit: DurationUnit) -> DomainResult<Self> {
        let duration = Self { value, unit };
        duration.validate()?;
        Ok(duration)
    }

    pub fn days(value: u32) -> Self {
        Self {
            value,
            unit: DurationUnit::Day,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.value == 0 {
            return Err(DomainError::invalid_input("duration value must be at least 1"));
        }
        Ok(())
    }

    /// Number of days this duration is billed for.
    pub fn billed_days(&self) -> u64 {
        u64::from(self.value) * self.unit.price_multiplier()
    }

    pub fn price(&self, daily_rate: u64) -> DomainResult<u64> {
        self.billed_days()
            .checked_mul(daily_rate)
            .ok_or_else(|| DomainError::invalid_input("rental price overflows"))
    }

    /// `from` moved forward by this duration.
    pub fn advance(&self, from: DateTime<Utc>) -> DomainResult<DateTime<Utc>> {
        let moved = match self.unit {
            DurationUnit::Day => from.checked_add_signed(Duration::days(i64::from(self.value))),
            DurationUnit::Week => {
                from.checked_add_signed(Duration::days(7 * i64::from(self.value)))
            }
            DurationUnit::Month => from.checked_add_months(Months::new(self.value)),
        };
        moved.ok_or_else(|| DomainError::invalid_input("rental end date out of range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn weeks_are_seven_days_for_dates_and_price() {
        let d = RentalDuration::new(2, DurationUnit::Week).unwrap();
        assert_eq!(d.advance(at(2025, 3, 1)).unwrap(), at(2025, 3, 15));
        assert_eq!(d.price(10).unwrap(), 140);
    }

    #[test]
    fn months_use_calendar_dates_but_thirty_day_price() {
        let d = RentalDuration::new(1, DurationUnit::Month).unwrap();
        assert_eq!(d.advance(at(2025, 2, 1)).unwrap(), at(2025, 3, 1));
        assert_eq!(d.price(100).unwrap(), 3_000);
    }

    #[test]
    fn month_end_clamps_to_last_day() {
        let d = RentalDuration::new(1, DurationUnit::Month).unwrap();
        assert_eq!(d.advance(at(2025, 1, 31)).unwrap(), at(2025, 2, 28));
    }

    #[test]
    fn zero_value_is_invalid() {
        assert!(matches!(
            RentalDuration::new(0, DurationUnit::Day),
            Err(DomainError::InvalidInput(_))
        ));
    }
}
