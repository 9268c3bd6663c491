//! Best-effort date and datetime detection.
//!
//! After all chunks are materialized, string columns whose leading values
//! look like ISO dates (`2020-01-02`) or datetimes (`2020-01-02T03:04:05`,
//! optional fractional seconds) are re-parsed strictly. Any value that fails
//! silently abandons the conversion and the column stays strings — this is
//! a sniffer, not part of type inference.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::column::Column;

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static DATETIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?$").unwrap());

const SAMPLE: usize = 3;
const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Looks {
    Date,
    DateTime,
}

/// Converts qualifying string columns in place.
pub(crate) fn convert_temporal(columns: &mut [Column]) {
    for column in columns.iter_mut() {
        let looks = match column {
            Column::Str(v) => sample(v.iter().map(String::as_str)),
            Column::StrOpt(v) => sample(v.iter().flatten().map(String::as_str)),
            _ => None,
        };
        let Some(looks) = looks else { continue };
        let converted = match (looks, &*column) {
            (Looks::Date, Column::Str(v)) => parse_all(v, |s| date(s)).map(Column::Date),
            (Looks::Date, Column::StrOpt(v)) => {
                parse_all_opt(v, |s| date(s)).map(Column::DateOpt)
            }
            (Looks::DateTime, Column::Str(v)) => {
                parse_all(v, |s| datetime(s)).map(Column::DateTime)
            }
            (Looks::DateTime, Column::StrOpt(v)) => {
                parse_all_opt(v, |s| datetime(s)).map(Column::DateTimeOpt)
            }
            _ => None,
        };
        match converted {
            Some(c) => *column = c,
            None => log::debug!("temporal conversion abandoned, column stays strings"),
        }
    }
}

/// Inspects the first few non-missing values; every one must agree on the
/// same shape for the conversion to be attempted at all.
fn sample<'a>(values: impl Iterator<Item = &'a str>) -> Option<Looks> {
    let mut looks = None;
    let mut seen = 0;
    for v in values.take(SAMPLE) {
        seen += 1;
        let here = if DATE_RE.is_match(v) {
            Looks::Date
        } else if DATETIME_RE.is_match(v) {
            Looks::DateTime
        } else {
            return None;
        };
        match looks {
            None => looks = Some(here),
            Some(prev) if prev != here => return None,
            Some(_) => {}
        }
    }
    if seen == 0 {
        return None;
    }
    looks
}

fn date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT).ok()
}

fn datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT).ok()
}

fn parse_all<T>(values: &[String], parse: impl Fn(&str) -> Option<T>) -> Option<Vec<T>> {
    values.iter().map(|v| parse(v)).collect()
}

fn parse_all_opt<T>(
    values: &[Option<String>],
    parse: impl Fn(&str) -> Option<T>,
) -> Option<Vec<Option<T>>> {
    values
        .iter()
        .map(|v| match v {
            Some(s) => parse(s).map(Some),
            None => Some(None),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn str_col(values: &[&str]) -> Column {
        Column::Str(values.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn date_column_converts() {
        let mut cols = vec![str_col(&["2020-01-02", "2020-01-03"])];
        convert_temporal(&mut cols);
        let dates = cols[0].as_date().expect("should be a date column");
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2020, 1, 2).unwrap());
    }

    #[test]
    fn datetime_with_and_without_fraction() {
        let mut cols = vec![str_col(&[
            "2020-01-02T03:04:05",
            "2020-01-02T03:04:05.25",
        ])];
        convert_temporal(&mut cols);
        let ts = cols[0].as_datetime().expect("should be a datetime column");
        assert_eq!(ts[0].and_utc().timestamp_subsec_millis(), 0);
        assert_eq!(ts[1].and_utc().timestamp_subsec_millis(), 250);
    }

    #[test]
    fn invalid_value_past_the_sample_abandons() {
        let mut cols = vec![str_col(&[
            "2020-01-02",
            "2020-01-03",
            "2020-01-04",
            "2020-99-99",
        ])];
        convert_temporal(&mut cols);
        assert!(cols[0].as_str().is_some());
    }

    #[test]
    fn non_date_strings_are_left_alone() {
        let mut cols = vec![str_col(&["alpha", "2020-01-02"])];
        convert_temporal(&mut cols);
        assert!(cols[0].as_str().is_some());
    }

    #[test]
    fn nullable_columns_keep_their_missings() {
        let mut cols = vec![Column::StrOpt(vec![
            Some("2020-01-02".to_string()),
            None,
            Some("2020-01-03".to_string()),
        ])];
        convert_temporal(&mut cols);
        let dates = cols[0].as_date_opt().expect("should be a nullable date column");
        assert_eq!(dates[1], None);
        assert_eq!(dates[2], NaiveDate::from_ymd_opt(2020, 1, 3));
    }

    #[test]
    fn all_missing_column_is_untouched() {
        let mut cols = vec![Column::StrOpt(vec![None, None])];
        convert_temporal(&mut cols);
        assert!(cols[0].as_str_opt().is_some());
    }

    #[test]
    fn mixed_date_and_datetime_shapes_abandon() {
        let mut cols = vec![str_col(&["2020-01-02", "2020-01-02T00:00:00"])];
        convert_temporal(&mut cols);
        assert!(cols[0].as_str().is_some());
    }
}
