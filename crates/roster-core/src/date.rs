//! Lenient date parsing for request parameters.

use chrono::{Days, Local, NaiveDate};

/// Parse a date supplied by a form or API client.
///
/// Accepts `YYYY-MM-DD` and the `DD.MM.YYYY` form. Blank or unparsable input
/// yields `None` rather than an error.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
  let trimmed = input.trim();
  if trimmed.is_empty() {
    return None;
  }
  NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
    .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d.%m.%Y"))
    .ok()
}

/// [`parse_date`] over an optional parameter.
pub fn parse_optional(input: Option<&str>) -> Option<NaiveDate> {
  input.and_then(parse_date)
}

/// The current date in the server's local time zone.
pub fn today() -> NaiveDate { Local::now().date_naive() }

pub fn yesterday(today: NaiveDate) -> NaiveDate {
  today.checked_sub_days(Days::new(1)).unwrap_or(today)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_iso_and_dotted_dates() {
    let expected = NaiveDate::from_ymd_opt(2024, 3, 9);
    assert_eq!(parse_date("2024-03-09"), expected);
    assert_eq!(parse_date(" 09.03.2024 "), expected);
  }

  #[test]
  fn garbage_is_absent() {
    assert_eq!(parse_date(""), None);
    assert_eq!(parse_date("2024-02-30"), None);
    assert_eq!(parse_date("tomorrow"), None);
    assert_eq!(parse_optional(None), None);
  }
}
