//! Calendar-date normalization shared by the form engine and the server.
//!
//! Dates arrive as `YYYY-MM-DD` (day granularity) or `YYYY-MM` (month
//! granularity) strings and are parsed straight into [`NaiveDate`]. No offset
//! or instant is ever involved, so the calendar day the applicant typed is the
//! calendar day that gets stored, whatever timezone the host runs in.

use chrono::{Local, Months, NaiveDate};
use thiserror::Error;

/// Dates further than this many years past "today" are rejected as
/// implausible input (license and medical-card expirations).
pub const FUTURE_HORIZON_YEARS: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
  #[error("invalid date format {0:?}; expected YYYY-MM-DD or YYYY-MM")]
  InvalidDateFormat(String),

  #[error("invalid calendar date {0:?}")]
  InvalidDate(String),
}

/// Parse `YYYY-MM-DD` or `YYYY-MM` into the exact calendar day it names.
///
/// `YYYY-MM` resolves to the first day of that month. Surrounding whitespace
/// is ignored; anything else that is not exactly four year digits, two month
/// digits and (optionally) two day digits is an
/// [`DateError::InvalidDateFormat`]. Well-formed input naming a day that does
/// not exist (`2025-02-30`, `2025-13-01`) is an [`DateError::InvalidDate`].
pub fn parse_local_date(input: &str) -> Result<NaiveDate, DateError> {
  let trimmed = input.trim();
  let parts: Vec<&str> = trimmed.split('-').collect();

  let (year, month, day) = match parts.as_slice() {
    [y, m, d] if digits(y, 4) && digits(m, 2) && digits(d, 2) => (*y, *m, *d),
    [y, m] if digits(y, 4) && digits(m, 2) => (*y, *m, "01"),
    _ => return Err(DateError::InvalidDateFormat(input.to_owned())),
  };

  // All three components are pure ASCII digits of bounded length here.
  let invalid = || DateError::InvalidDate(input.to_owned());
  let year: i32 = year.parse().map_err(|_| invalid())?;
  let month: u32 = month.parse().map_err(|_| invalid())?;
  let day: u32 = day.parse().map_err(|_| invalid())?;

  NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// Like [`parse_local_date`], but blank input is `Ok(None)`.
pub fn parse_optional_local_date(
  input: &str,
) -> Result<Option<NaiveDate>, DateError> {
  if input.trim().is_empty() {
    return Ok(None);
  }
  parse_local_date(input).map(Some)
}

/// `true` if `date` is no later than `today` plus [`FUTURE_HORIZON_YEARS`].
pub fn within_future_horizon(date: NaiveDate, today: NaiveDate) -> bool {
  match today.checked_add_months(Months::new(12 * FUTURE_HORIZON_YEARS)) {
    Some(limit) => date <= limit,
    None => true,
  }
}

/// Today's date on the host's local calendar.
pub fn today_local() -> NaiveDate { Local::now().date_naive() }

/// Render a date as `YYYY-MM-DD`.
pub fn format_local_date(date: NaiveDate) -> String {
  date.format("%Y-%m-%d").to_string()
}

/// Render a month-granularity date as `YYYY-MM`.
pub fn format_month(date: NaiveDate) -> String {
  date.format("%Y-%m").to_string()
}

fn digits(s: &str, len: usize) -> bool {
  s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
  use chrono::{Datelike, FixedOffset};

  use super::*;

  fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  #[test]
  fn parses_full_date() {
    assert_eq!(parse_local_date("1990-07-04").unwrap(), ymd(1990, 7, 4));
  }

  #[test]
  fn month_form_defaults_to_first_day() {
    assert_eq!(parse_local_date("2021-11").unwrap(), ymd(2021, 11, 1));
  }

  #[test]
  fn surrounding_whitespace_is_ignored() {
    assert_eq!(parse_local_date(" 2020-01-31\n").unwrap(), ymd(2020, 1, 31));
  }

  #[test]
  fn impossible_days_are_invalid_dates() {
    for input in ["2025-02-30", "2025-13-01", "2025-00-10", "2025-04-31", "2023-02-29"] {
      assert!(
        matches!(parse_local_date(input), Err(DateError::InvalidDate(_))),
        "{input} should be an invalid date"
      );
    }
    assert!(parse_local_date("2024-02-29").is_ok());
  }

  #[test]
  fn other_shapes_are_format_errors() {
    for input in [
      "",
      "2025",
      "25-01-01",
      "2025-1-01",
      "2025-01-1",
      "2025/01/01",
      "01-02-2025",
      "2025-01-01T00:00:00Z",
      "2025-01-01-01",
      "２０２５-01-01",
      "+2025-01-01",
    ] {
      assert!(
        matches!(parse_local_date(input), Err(DateError::InvalidDateFormat(_))),
        "{input:?} should be a format error"
      );
    }
  }

  #[test]
  fn optional_blank_is_none() {
    assert_eq!(parse_optional_local_date("   ").unwrap(), None);
    assert_eq!(parse_optional_local_date("2024-05").unwrap(), Some(ymd(2024, 5, 1)));
    assert!(parse_optional_local_date("nope").is_err());
  }

  #[test]
  fn horizon_is_fifty_years_inclusive() {
    let today = ymd(2026, 10, 19);
    assert!(within_future_horizon(ymd(2076, 10, 19), today));
    assert!(!within_future_horizon(ymd(2076, 10, 20), today));
    assert!(!within_future_horizon(ymd(2099, 1, 1), today));
    assert!(within_future_horizon(ymd(1999, 1, 1), today));
  }

  #[test]
  fn formatting_round_trips() {
    let d = ymd(2003, 3, 9);
    assert_eq!(format_local_date(d), "2003-03-09");
    assert_eq!(format_month(d), "2003-03");
    assert_eq!(parse_local_date(&format_local_date(d)).unwrap(), d);
  }

  mod proptests {
    use proptest::prelude::*;

    use super::*;

    fn valid_ymd() -> impl Strategy<Value = (i32, u32, u32)> {
      (1000i32..=9999, 1u32..=12, 1u32..=31).prop_filter(
        "must be a real calendar day",
        |(y, m, d)| NaiveDate::from_ymd_opt(*y, *m, *d).is_some(),
      )
    }

    proptest! {
      #![proptest_config(ProptestConfig::with_cases(500))]

      #[test]
      fn components_survive_every_utc_offset((y, m, d) in valid_ymd()) {
        let input = format!("{y:04}-{m:02}-{d:02}");
        let parsed = parse_local_date(&input).unwrap();
        prop_assert_eq!((parsed.year(), parsed.month(), parsed.day()), (y, m, d));

        // Anchor the day at local midnight in every offset from UTC-12 to
        // UTC+14 and read the calendar day back.
        for hours in -12i32..=14 {
          let offset = FixedOffset::east_opt(hours * 3600).unwrap();
          let anchored = parsed
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_local_timezone(offset)
            .single()
            .unwrap();
          prop_assert_eq!(anchored.date_naive(), parsed);
        }
      }

      #[test]
      fn month_form_is_always_day_one(y in 1000i32..=9999, m in 1u32..=12) {
        let parsed = parse_local_date(&format!("{y:04}-{m:02}")).unwrap();
        prop_assert_eq!(parsed.day(), 1);
        prop_assert_eq!(parsed.month(), m);
        prop_assert_eq!(parsed.year(), y);
      }

      #[test]
      fn out_of_range_days_fail(y in 1000i32..=9999, m in 1u32..=12, d in 29u32..=99) {
        let input = format!("{y:04}-{m:02}-{d:02}");
        let expected_ok = NaiveDate::from_ymd_opt(y, m, d).is_some();
        prop_assert_eq!(parse_local_date(&input).is_ok(), expected_ok);
      }

      #[test]
      fn arbitrary_input_never_panics(s in ".*") {
        let _ = parse_local_date(&s);
      }
    }
  }
}
