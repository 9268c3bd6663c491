//! Typed columns and the per-type fillers that extend them.
//!
//! A [`Column`] owns its cells. During the chunk loop only the integer,
//! float, boolean, and string variants (and their nullable forms) exist;
//! date and datetime variants appear in the post-pass when a string column
//! turns out to hold ISO dates. Once a column is promoted to a nullable
//! form it never narrows back.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::cache::StringCache;
use crate::error::{ReadError, Result};
use crate::token::{Token, TokenMatrix, KIND_QSTRING};

/// One materialized column. Nullable forms use a tagged optional per cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Column {
    Int(Vec<i64>),
    IntOpt(Vec<Option<i64>>),
    Float(Vec<f64>),
    FloatOpt(Vec<Option<f64>>),
    Bool(Vec<bool>),
    BoolOpt(Vec<Option<bool>>),
    Str(Vec<String>),
    StrOpt(Vec<Option<String>>),
    Date(Vec<NaiveDate>),
    DateOpt(Vec<Option<NaiveDate>>),
    DateTime(Vec<NaiveDateTime>),
    DateTimeOpt(Vec<Option<NaiveDateTime>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Int(v) => v.len(),
            Column::IntOpt(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::FloatOpt(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::BoolOpt(v) => v.len(),
            Column::Str(v) => v.len(),
            Column::StrOpt(v) => v.len(),
            Column::Date(v) => v.len(),
            Column::DateOpt(v) => v.len(),
            Column::DateTime(v) => v.len(),
            Column::DateTimeOpt(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_nullable(&self) -> bool {
        matches!(
            self,
            Column::IntOpt(_)
                | Column::FloatOpt(_)
                | Column::BoolOpt(_)
                | Column::StrOpt(_)
                | Column::DateOpt(_)
                | Column::DateTimeOpt(_)
        )
    }

    /// Short type tag for diagnostics and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Column::Int(_) => "i64",
            Column::IntOpt(_) => "i64?",
            Column::Float(_) => "f64",
            Column::FloatOpt(_) => "f64?",
            Column::Bool(_) => "bool",
            Column::BoolOpt(_) => "bool?",
            Column::Str(_) => "str",
            Column::StrOpt(_) => "str?",
            Column::Date(_) => "date",
            Column::DateOpt(_) => "date?",
            Column::DateTime(_) => "datetime",
            Column::DateTimeOpt(_) => "datetime?",
        }
    }

    pub fn as_int(&self) -> Option<&[i64]> {
        match self {
            Column::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int_opt(&self) -> Option<&[Option<i64>]> {
        match self {
            Column::IntOpt(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<&[f64]> {
        match self {
            Column::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float_opt(&self) -> Option<&[Option<f64>]> {
        match self {
            Column::FloatOpt(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<&[bool]> {
        match self {
            Column::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool_opt(&self) -> Option<&[Option<bool>]> {
        match self {
            Column::BoolOpt(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&[String]> {
        match self {
            Column::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str_opt(&self) -> Option<&[Option<String>]> {
        match self {
            Column::StrOpt(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&[NaiveDate]> {
        match self {
            Column::Date(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_date_opt(&self) -> Option<&[Option<NaiveDate>]> {
        match self {
            Column::DateOpt(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&[NaiveDateTime]> {
        match self {
            Column::DateTime(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_datetime_opt(&self) -> Option<&[Option<NaiveDateTime>]> {
        match self {
            Column::DateTimeOpt(v) => Some(v),
            _ => None,
        }
    }

    /// Promotes the column to its nullable form in place, copying existing
    /// values. A no-op on columns that are already nullable.
    pub(crate) fn widen(&mut self) {
        let widened = match std::mem::replace(self, Column::Int(Vec::new())) {
            Column::Int(v) => Column::IntOpt(v.into_iter().map(Some).collect()),
            Column::Float(v) => Column::FloatOpt(v.into_iter().map(Some).collect()),
            Column::Bool(v) => Column::BoolOpt(v.into_iter().map(Some).collect()),
            Column::Str(v) => Column::StrOpt(v.into_iter().map(Some).collect()),
            Column::Date(v) => Column::DateOpt(v.into_iter().map(Some).collect()),
            Column::DateTime(v) => Column::DateTimeOpt(v.into_iter().map(Some).collect()),
            nullable => nullable,
        };
        *self = widened;
    }

    /// Appends `nrows` parsed cells from column `col` of the token matrix.
    /// Non-nullable variants rely on the driver having widened the column
    /// before any missing token reaches them.
    pub(crate) fn fill(
        &mut self,
        mem: &[u8],
        tokens: &TokenMatrix,
        col: usize,
        nrows: usize,
        quot: u8,
        cache: &mut StringCache,
        chunk_line: u64,
    ) -> Result<()> {
        for row in 0..nrows {
            let t = tokens.get(col, row);
            let line = chunk_line + row as u64;
            match self {
                Column::Int(v) => {
                    debug_assert!(!t.is_missing());
                    v.push(parse_int(&mem[t.range()], line)?);
                }
                Column::IntOpt(v) => v.push(if t.is_missing() {
                    None
                } else {
                    Some(parse_int(&mem[t.range()], line)?)
                }),
                Column::Float(v) => {
                    debug_assert!(!t.is_missing());
                    v.push(parse_float(&mem[t.range()], line)?);
                }
                Column::FloatOpt(v) => v.push(if t.is_missing() {
                    None
                } else {
                    Some(parse_float(&mem[t.range()], line)?)
                }),
                Column::Bool(v) => {
                    debug_assert!(!t.is_missing());
                    v.push(parse_bool(&mem[t.range()]));
                }
                Column::BoolOpt(v) => v.push(if t.is_missing() {
                    None
                } else {
                    Some(parse_bool(&mem[t.range()]))
                }),
                Column::Str(v) => {
                    debug_assert!(!t.is_missing());
                    v.push(materialize_str(mem, t, quot, cache, line)?);
                }
                Column::StrOpt(v) => v.push(if t.is_missing() {
                    None
                } else {
                    Some(materialize_str(mem, t, quot, cache, line)?)
                }),
                _ => unreachable!("temporal columns are only created after all chunks"),
            }
        }
        Ok(())
    }
}

/// Base-10 integer parse with optional leading sign. Runs of at most 18
/// digits cannot overflow an `i64` and take the accumulate path; longer runs
/// fall back to the full parser, where overflow surfaces as an error.
fn parse_int(bytes: &[u8], line: u64) -> Result<i64> {
    let (neg, digits) = match bytes.first() {
        Some(b'-') => (true, &bytes[1..]),
        Some(b'+') => (false, &bytes[1..]),
        _ => (false, bytes),
    };
    if digits.len() <= 18 {
        let mut n: i64 = 0;
        for &b in digits {
            n = n * 10 + i64::from(b - b'0');
        }
        Ok(if neg { -n } else { n })
    } else {
        let s = std::str::from_utf8(bytes)
            .map_err(|_| ReadError::parse(line, "invalid bytes in integer field"))?;
        s.parse::<i64>()
            .map_err(|_| ReadError::parse(line, format!("integer out of range: {s}")))
    }
}

/// IEEE-754 double parse; `inf`/`infinity`/`nan` in any case are accepted,
/// matching what the tokenizer classified.
fn parse_float(bytes: &[u8], line: u64) -> Result<f64> {
    let s = std::str::from_utf8(bytes)
        .map_err(|_| ReadError::parse(line, "invalid bytes in float field"))?;
    s.parse::<f64>()
        .map_err(|_| ReadError::parse(line, format!("malformed float: {s}")))
}

/// The tokenizer only marks the boolean bit on `true`/`false` literals, so
/// the first letter decides.
fn parse_bool(bytes: &[u8]) -> bool {
    matches!(bytes[0], b't' | b'T')
}

/// Collapses doubled quotes: every byte is copied, except that the byte
/// immediately following a quote byte is skipped.
pub(crate) fn unescape_quotes(bytes: &[u8], quot: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        out.push(bytes[i]);
        i += if bytes[i] == quot { 2 } else { 1 };
    }
    out
}

fn materialize_str(
    mem: &[u8],
    t: Token,
    quot: u8,
    cache: &mut StringCache,
    line: u64,
) -> Result<String> {
    let bytes = &mem[t.range()];
    if t.kind() & KIND_QSTRING != 0 {
        String::from_utf8(unescape_quotes(bytes, quot))
            .map_err(|_| ReadError::parse(line, "field is not valid UTF-8"))
    } else {
        cache
            .materialize(bytes)
            .map_err(|_| ReadError::parse(line, "field is not valid UTF-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_fast_and_slow_paths_agree() -> Result<()> {
        assert_eq!(parse_int(b"0", 1)?, 0);
        assert_eq!(parse_int(b"-42", 1)?, -42);
        assert_eq!(parse_int(b"+7", 1)?, 7);
        assert_eq!(parse_int(b"999999999999999999", 1)?, 999_999_999_999_999_999);
        // 19 digits takes the fallback; this one fits i64.
        assert_eq!(parse_int(b"9223372036854775807", 1)?, i64::MAX);
        assert_eq!(parse_int(b"-9223372036854775808", 1)?, i64::MIN);
        Ok(())
    }

    #[test]
    fn int_overflow_is_reported() {
        let err = parse_int(b"9223372036854775808", 3).unwrap_err();
        assert!(matches!(err, ReadError::Parse { line: 3, .. }));
    }

    #[test]
    fn float_specials() -> Result<()> {
        assert_eq!(parse_float(b"2.5", 1)?, 2.5);
        assert!(parse_float(b"NaN", 1)?.is_nan());
        assert_eq!(parse_float(b"-inf", 1)?, f64::NEG_INFINITY);
        assert_eq!(parse_float(b"Infinity", 1)?, f64::INFINITY);
        Ok(())
    }

    #[test]
    fn unescape_collapses_doubled_quotes() {
        assert_eq!(unescape_quotes(b"he said \"\"hi\"\"", b'"'), b"he said \"hi\"");
        assert_eq!(unescape_quotes(b"\"\"", b'"'), b"\"");
        assert_eq!(unescape_quotes(b"plain", b'"'), b"plain");
    }

    #[test]
    fn widen_preserves_values() {
        let mut c = Column::Int(vec![1, 2]);
        c.widen();
        assert_eq!(c.as_int_opt().unwrap(), &[Some(1), Some(2)]);
        // Widening is idempotent.
        c.widen();
        assert!(c.is_nullable());
    }
}
