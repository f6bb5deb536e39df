// Copyright (C) 2020-2026  The Blockhouse Technology Limited (TBTL).
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public
// License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Calendar construction which rolls over out-of-range components instead of rejecting them.
//!
//! E.g. the zero-based month `12` of year `2023` is January `2024`, and day `0` is the last day of
//! the previous month.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

/// Constructs a date from a year, a **zero-based** month and a day of month.
///
/// Years are taken literally on the proleptic Gregorian calendar; `24` is the year 24, not 1924.
///
/// Returns [`None`] only if the result is outside of the range supported by [`chrono`].
pub(crate) fn lenient_date(year: i64, month: i64, day: i64) -> Option<NaiveDate> {
    let months = year.checked_mul(12)?.checked_add(month)?;
    let year = i32::try_from(months.div_euclid(12)).ok()?;
    let month = u32::try_from(months.rem_euclid(12)).ok()? + 1;

    NaiveDate::from_ymd_opt(year, month, 1)?
        .checked_add_signed(TimeDelta::try_days(day.checked_sub(1)?)?)
}

/// Constructs a date & time from the same components as [`lenient_date`], plus a time of day.
pub(crate) fn lenient_date_time(
    year: i64,
    month: i64,
    day: i64,
    hour: i64,
    minute: i64,
    second: i64,
) -> Option<NaiveDateTime> {
    let seconds = hour
        .checked_mul(3600)?
        .checked_add(minute.checked_mul(60)?)?
        .checked_add(second)?;

    lenient_date(year, month, day)?
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(TimeDelta::try_seconds(seconds)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_lenient_date_in_range() {
        assert_eq!(lenient_date(2024, 2, 4), Some(date(2024, 3, 4)));
        assert_eq!(lenient_date(2024, 1, 29), Some(date(2024, 2, 29)));
    }

    #[test]
    fn test_lenient_date_rolls_over() {
        assert_eq!(lenient_date(2023, 12, 1), Some(date(2024, 1, 1)));
        assert_eq!(lenient_date(2024, -1, 15), Some(date(2023, 12, 15)));
        assert_eq!(lenient_date(2024, 0, 0), Some(date(2023, 12, 31)));
        assert_eq!(lenient_date(2023, 1, 29), Some(date(2023, 3, 1)));
        assert_eq!(lenient_date(2024, 0, 99), Some(date(2024, 4, 8)));
    }

    #[test]
    fn test_lenient_date_time() {
        let expected = date(2024, 3, 4).and_hms_opt(13, 9, 35).unwrap();
        assert_eq!(lenient_date_time(2024, 2, 4, 13, 9, 35), Some(expected));

        let expected = date(2024, 3, 5).and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(lenient_date_time(2024, 2, 4, 24, 0, 0), Some(expected));
    }

    #[test]
    fn test_lenient_date_two_digit_year() {
        assert_eq!(lenient_date(24, 2, 4), Some(date(24, 3, 4)));
        assert_eq!(lenient_date(0, 0, 1), Some(date(0, 1, 1)));
    }

    #[test]
    fn test_lenient_date_out_of_range() {
        assert_eq!(lenient_date(i64::MAX, 0, 1), None);
        assert_eq!(lenient_date(1_000_000, 0, 1), None);
    }
}
