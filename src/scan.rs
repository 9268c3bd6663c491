//! The byte-level record tokenizer and its header-line variant.
//!
//! [`scan_record`] walks one logical record through a deterministic
//! finite-state machine, classifying every field into a candidate-kind set
//! (integer / float / boolean / string, with quoted-escape and missing
//! markers) and writing packed tokens into the column-major workspace. It
//! never reads past `lastnl`, the record terminator the source has promised
//! is inside the window; a quoted field that would need bytes beyond it
//! reports [`ScanResult::NeedMore`] so the driver can refill and retry the
//! same record from the same position.
//!
//! The scanner is idempotent with respect to `(mem, pos)`: retrying after a
//! refill produces identical tokens.

use crate::error::{ReadError, Result};
use crate::params::ParserParams;
use crate::token::{
    Token, TokenMatrix, KIND_BOOL, KIND_FLOAT, KIND_INTEGER, KIND_MISSING, KIND_QSTRING,
    KIND_STRING,
};

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ScanResult {
    /// Record complete: scan position just past the terminator, and the
    /// number of fields recorded.
    Record { pos: usize, ncols: usize },
    /// A quoted field runs past `lastnl`. The caller must extend the buffer
    /// and retry the same record.
    NeedMore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Begin,
    Sign,
    Integer,
    IntegerSpace,
    Dot,
    PointFloat,
    FloatSpace,
    Exponent,
    ExponentSign,
    ExponentFloat,
    SpecialFloat,
    Str,
    StrSpace,
    QuoteEnd,
    QuoteEndSpace,
}

#[inline]
fn is_printable(c: u8) -> bool {
    (0x21..=0x7e).contains(&c)
}

#[inline]
fn is_utf8_lead(c: u8) -> bool {
    (0xc0..=0xf7).contains(&c)
}

fn byte_repr(c: u8) -> String {
    if c.is_ascii_graphic() || c == b' ' {
        format!("'{}'", c as char)
    } else {
        format!("0x{c:02x}")
    }
}

/// Validates that the expected continuation bytes of a multi-byte UTF-8
/// sequence follow within the record and returns the index just past them.
fn skip_utf8(mem: &[u8], i: usize, lastnl: usize, line: u64) -> Result<usize> {
    let width = match mem[i] {
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 4,
    };
    if i + width - 1 > lastnl {
        return Err(ReadError::parse(
            line,
            "record ends inside a multi-byte UTF-8 sequence",
        ));
    }
    for k in 1..width {
        if !(0x80..=0xbf).contains(&mem[i + k]) {
            return Err(ReadError::parse(
                line,
                format!(
                    "invalid UTF-8 continuation byte {}",
                    byte_repr(mem[i + k])
                ),
            ));
        }
    }
    Ok(i + width)
}

/// Kind for an unquoted plain-string span: boolean literals get the boolean
/// candidate bit, everything else stays a bare string.
fn string_kind(bytes: &[u8]) -> u8 {
    match bytes.len() {
        1 if matches!(bytes[0], b't' | b'T' | b'f' | b'F') => KIND_BOOL,
        4 if bytes.eq_ignore_ascii_case(b"true") => KIND_BOOL,
        5 if bytes.eq_ignore_ascii_case(b"false") => KIND_BOOL,
        _ => KIND_STRING,
    }
}

/// Kind for a completed quoted span. Quotes opt out of numeric and boolean
/// candidacy; an empty pair with no escapes is a missing.
fn quoted_kind(start: usize, end: usize, qstring: bool) -> u8 {
    if qstring {
        KIND_QSTRING
    } else if start == end {
        KIND_MISSING
    } else {
        KIND_STRING
    }
}

/// Tokenizes one record out of `mem[pos..=lastnl]`.
///
/// Tokens land in `tokens[.., row]`; recording more fields than the matrix
/// is wide is a structural error (the driver widens the matrix by one column
/// when probing for an unnamed leading column). `line` is only used in error
/// messages.
pub(crate) fn scan_record(
    mem: &[u8],
    pos: usize,
    lastnl: usize,
    tokens: &mut TokenMatrix,
    row: usize,
    line: u64,
    params: &ParserParams,
) -> Result<ScanResult> {
    let delim = params.delim;
    let quot = params.quot;
    let trim = params.trim;

    let mut state = State::Begin;
    let mut i = pos;
    let mut start = pos; // 0-based first content byte of the current field
    let mut end = pos; // 0-based exclusive content end, set by *_SPACE / QuoteEnd
    let mut col = 0usize;
    let mut quoted = false;
    let mut qstring = false;
    let mut sf_pat: &[u8] = b"";
    let mut sf_n = 0usize;

    // Writes the token for the field that just ended and steps to the next
    // column. `push!(kind, lo, hi)` then either continues (delimiter) or
    // returns (terminator) at the call site.
    macro_rules! push {
        ($kind:expr, $lo:expr, $hi:expr) => {{
            if col == tokens.ncols() {
                return Err(ReadError::Structure {
                    line,
                    expected: tokens.ncols(),
                    found: col + 1,
                });
            }
            tokens.set(col, row, Token::new($kind, $lo + 1, $hi - $lo));
            col += 1;
        }};
    }

    // Consumes the terminator at `i` (CR+LF as one) and completes the record.
    macro_rules! finish {
        () => {{
            let next = if mem[i] == b'\r' && i + 1 <= lastnl && mem[i + 1] == b'\n' {
                i + 2
            } else {
                i + 1
            };
            return Ok(ScanResult::Record { pos: next, ncols: col });
        }};
    }

    macro_rules! next_field {
        () => {{
            quoted = false;
            qstring = false;
            state = State::Begin;
        }};
    }

    loop {
        debug_assert!(i <= lastnl);
        let c = mem[i];
        match state {
            State::Begin => {
                if c == delim {
                    push!(KIND_MISSING, i, i);
                    next_field!();
                    i += 1;
                } else if c == b'\n' || c == b'\r' {
                    push!(KIND_MISSING, i, i);
                    finish!();
                } else if c == quot {
                    quoted = true;
                    start = i + 1;
                    state = State::Str;
                    i += 1;
                } else if c == b' ' {
                    if trim {
                        i += 1;
                    } else {
                        start = i;
                        state = State::Str;
                        i += 1;
                    }
                } else if c == b'+' || c == b'-' {
                    start = i;
                    state = State::Sign;
                    i += 1;
                } else if c.is_ascii_digit() {
                    start = i;
                    state = State::Integer;
                    i += 1;
                } else if c == b'.' {
                    start = i;
                    state = State::Dot;
                    i += 1;
                } else if c == b'n' || c == b'N' {
                    start = i;
                    sf_pat = b"nan";
                    sf_n = 1;
                    state = State::SpecialFloat;
                    i += 1;
                } else if c == b'i' || c == b'I' {
                    start = i;
                    sf_pat = b"infinity";
                    sf_n = 1;
                    state = State::SpecialFloat;
                    i += 1;
                } else if is_printable(c) {
                    start = i;
                    state = State::Str;
                    i += 1;
                } else if is_utf8_lead(c) {
                    start = i;
                    i = skip_utf8(mem, i, lastnl, line)?;
                    state = State::Str;
                } else {
                    return Err(ReadError::parse(
                        line,
                        format!("unexpected character {} at start of field", byte_repr(c)),
                    ));
                }
            }

            State::Sign => {
                if c == delim {
                    push!(KIND_STRING, start, i);
                    next_field!();
                    i += 1;
                } else if c == b'\n' || c == b'\r' {
                    push!(KIND_STRING, start, i);
                    finish!();
                } else if c.is_ascii_digit() {
                    state = State::Integer;
                    i += 1;
                } else if c == b'.' {
                    state = State::Dot;
                    i += 1;
                } else if c == b'n' || c == b'N' {
                    sf_pat = b"nan";
                    sf_n = 1;
                    state = State::SpecialFloat;
                    i += 1;
                } else if c == b'i' || c == b'I' {
                    sf_pat = b"infinity";
                    sf_n = 1;
                    state = State::SpecialFloat;
                    i += 1;
                } else if c == b' ' {
                    if trim {
                        end = i;
                        state = State::StrSpace;
                    } else {
                        state = State::Str;
                    }
                    i += 1;
                } else if c == quot {
                    return Err(ReadError::parse(
                        line,
                        "unexpected quote inside an unquoted field",
                    ));
                } else if is_printable(c) {
                    state = State::Str;
                    i += 1;
                } else if is_utf8_lead(c) {
                    i = skip_utf8(mem, i, lastnl, line)?;
                    state = State::Str;
                } else {
                    return Err(ReadError::parse(
                        line,
                        format!("unexpected character {}", byte_repr(c)),
                    ));
                }
            }

            State::Integer => {
                if c == delim {
                    push!(KIND_INTEGER | KIND_FLOAT, start, i);
                    next_field!();
                    i += 1;
                } else if c == b'\n' || c == b'\r' {
                    push!(KIND_INTEGER | KIND_FLOAT, start, i);
                    finish!();
                } else if c.is_ascii_digit() {
                    i += 1;
                } else if c == b'.' {
                    state = State::PointFloat;
                    i += 1;
                } else if c == b'e' || c == b'E' {
                    state = State::Exponent;
                    i += 1;
                } else if c == b' ' {
                    if trim {
                        end = i;
                        state = State::IntegerSpace;
                    } else {
                        state = State::Str;
                    }
                    i += 1;
                } else if c == quot {
                    return Err(ReadError::parse(
                        line,
                        "unexpected quote inside an unquoted field",
                    ));
                } else if is_printable(c) {
                    state = State::Str;
                    i += 1;
                } else if is_utf8_lead(c) {
                    i = skip_utf8(mem, i, lastnl, line)?;
                    state = State::Str;
                } else {
                    return Err(ReadError::parse(
                        line,
                        format!("unexpected character {}", byte_repr(c)),
                    ));
                }
            }

            State::IntegerSpace => {
                if c == delim {
                    push!(KIND_INTEGER | KIND_FLOAT, start, end);
                    next_field!();
                    i += 1;
                } else if c == b'\n' || c == b'\r' {
                    push!(KIND_INTEGER | KIND_FLOAT, start, end);
                    finish!();
                } else if c == b' ' {
                    i += 1;
                } else if c == quot {
                    return Err(ReadError::parse(
                        line,
                        "unexpected quote inside an unquoted field",
                    ));
                } else if is_printable(c) {
                    state = State::Str;
                    i += 1;
                } else if is_utf8_lead(c) {
                    i = skip_utf8(mem, i, lastnl, line)?;
                    state = State::Str;
                } else {
                    return Err(ReadError::parse(
                        line,
                        format!("unexpected character {}", byte_repr(c)),
                    ));
                }
            }

            State::Dot => {
                if c == delim {
                    push!(KIND_STRING, start, i);
                    next_field!();
                    i += 1;
                } else if c == b'\n' || c == b'\r' {
                    push!(KIND_STRING, start, i);
                    finish!();
                } else if c.is_ascii_digit() {
                    state = State::PointFloat;
                    i += 1;
                } else if c == b' ' {
                    if trim {
                        end = i;
                        state = State::StrSpace;
                    } else {
                        state = State::Str;
                    }
                    i += 1;
                } else if c == quot {
                    return Err(ReadError::parse(
                        line,
                        "unexpected quote inside an unquoted field",
                    ));
                } else if is_printable(c) {
                    state = State::Str;
                    i += 1;
                } else if is_utf8_lead(c) {
                    i = skip_utf8(mem, i, lastnl, line)?;
                    state = State::Str;
                } else {
                    return Err(ReadError::parse(
                        line,
                        format!("unexpected character {}", byte_repr(c)),
                    ));
                }
            }

            State::PointFloat | State::ExponentFloat => {
                if c == delim {
                    push!(KIND_FLOAT, start, i);
                    next_field!();
                    i += 1;
                } else if c == b'\n' || c == b'\r' {
                    push!(KIND_FLOAT, start, i);
                    finish!();
                } else if c.is_ascii_digit() {
                    i += 1;
                } else if (c == b'e' || c == b'E') && state == State::PointFloat {
                    state = State::Exponent;
                    i += 1;
                } else if c == b' ' {
                    if trim {
                        end = i;
                        state = State::FloatSpace;
                    } else {
                        state = State::Str;
                    }
                    i += 1;
                } else if c == quot {
                    return Err(ReadError::parse(
                        line,
                        "unexpected quote inside an unquoted field",
                    ));
                } else if is_printable(c) {
                    state = State::Str;
                    i += 1;
                } else if is_utf8_lead(c) {
                    i = skip_utf8(mem, i, lastnl, line)?;
                    state = State::Str;
                } else {
                    return Err(ReadError::parse(
                        line,
                        format!("unexpected character {}", byte_repr(c)),
                    ));
                }
            }

            State::FloatSpace => {
                if c == delim {
                    push!(KIND_FLOAT, start, end);
                    next_field!();
                    i += 1;
                } else if c == b'\n' || c == b'\r' {
                    push!(KIND_FLOAT, start, end);
                    finish!();
                } else if c == b' ' {
                    i += 1;
                } else if c == quot {
                    return Err(ReadError::parse(
                        line,
                        "unexpected quote inside an unquoted field",
                    ));
                } else if is_printable(c) {
                    state = State::Str;
                    i += 1;
                } else if is_utf8_lead(c) {
                    i = skip_utf8(mem, i, lastnl, line)?;
                    state = State::Str;
                } else {
                    return Err(ReadError::parse(
                        line,
                        format!("unexpected character {}", byte_repr(c)),
                    ));
                }
            }

            State::Exponent | State::ExponentSign => {
                if c == delim {
                    push!(KIND_STRING, start, i);
                    next_field!();
                    i += 1;
                } else if c == b'\n' || c == b'\r' {
                    push!(KIND_STRING, start, i);
                    finish!();
                } else if c.is_ascii_digit() {
                    state = State::ExponentFloat;
                    i += 1;
                } else if (c == b'+' || c == b'-') && state == State::Exponent {
                    state = State::ExponentSign;
                    i += 1;
                } else if c == b' ' {
                    if trim {
                        end = i;
                        state = State::StrSpace;
                    } else {
                        state = State::Str;
                    }
                    i += 1;
                } else if c == quot {
                    return Err(ReadError::parse(
                        line,
                        "unexpected quote inside an unquoted field",
                    ));
                } else if is_printable(c) {
                    state = State::Str;
                    i += 1;
                } else if is_utf8_lead(c) {
                    i = skip_utf8(mem, i, lastnl, line)?;
                    state = State::Str;
                } else {
                    return Err(ReadError::parse(
                        line,
                        format!("unexpected character {}", byte_repr(c)),
                    ));
                }
            }

            State::SpecialFloat => {
                let complete = sf_n == sf_pat.len() || (sf_pat.len() == 8 && sf_n == 3);
                if c == delim {
                    push!(if complete { KIND_FLOAT } else { KIND_STRING }, start, i);
                    next_field!();
                    i += 1;
                } else if c == b'\n' || c == b'\r' {
                    push!(if complete { KIND_FLOAT } else { KIND_STRING }, start, i);
                    finish!();
                } else if sf_n < sf_pat.len() && c.eq_ignore_ascii_case(&sf_pat[sf_n]) {
                    sf_n += 1;
                    i += 1;
                } else if c == b' ' {
                    if trim {
                        end = i;
                        state = if complete {
                            State::FloatSpace
                        } else {
                            State::StrSpace
                        };
                    } else {
                        state = State::Str;
                    }
                    i += 1;
                } else if c == quot {
                    return Err(ReadError::parse(
                        line,
                        "unexpected quote inside an unquoted field",
                    ));
                } else if is_printable(c) {
                    state = State::Str;
                    i += 1;
                } else if is_utf8_lead(c) {
                    i = skip_utf8(mem, i, lastnl, line)?;
                    state = State::Str;
                } else {
                    return Err(ReadError::parse(
                        line,
                        format!("unexpected character {}", byte_repr(c)),
                    ));
                }
            }

            State::Str if quoted => {
                if c == quot {
                    end = i;
                    state = State::QuoteEnd;
                    i += 1;
                } else if c == b'\n' || c == b'\r' {
                    if i == lastnl {
                        // The quoted field continues past the window's last
                        // terminator; the driver must buffer more bytes.
                        return Ok(ScanResult::NeedMore);
                    }
                    i += 1;
                } else if c == b' ' || c == b'\t' || is_printable(c) {
                    i += 1;
                } else if is_utf8_lead(c) {
                    i = skip_utf8(mem, i, lastnl, line)?;
                } else {
                    return Err(ReadError::parse(
                        line,
                        format!("unexpected character {} inside quoted field", byte_repr(c)),
                    ));
                }
            }

            State::Str => {
                if c == delim {
                    push!(string_kind(&mem[start..i]), start, i);
                    next_field!();
                    i += 1;
                } else if c == b'\n' || c == b'\r' {
                    push!(string_kind(&mem[start..i]), start, i);
                    finish!();
                } else if c == b' ' {
                    if trim {
                        end = i;
                        state = State::StrSpace;
                    }
                    i += 1;
                } else if c == quot {
                    return Err(ReadError::parse(
                        line,
                        "unexpected quote inside an unquoted field",
                    ));
                } else if is_printable(c) {
                    i += 1;
                } else if is_utf8_lead(c) {
                    i = skip_utf8(mem, i, lastnl, line)?;
                } else {
                    return Err(ReadError::parse(
                        line,
                        format!("unexpected character {}", byte_repr(c)),
                    ));
                }
            }

            State::StrSpace => {
                if c == delim {
                    push!(string_kind(&mem[start..end]), start, end);
                    next_field!();
                    i += 1;
                } else if c == b'\n' || c == b'\r' {
                    push!(string_kind(&mem[start..end]), start, end);
                    finish!();
                } else if c == b' ' {
                    i += 1;
                } else if c == quot {
                    return Err(ReadError::parse(
                        line,
                        "unexpected quote inside an unquoted field",
                    ));
                } else if is_printable(c) {
                    state = State::Str;
                    i += 1;
                } else if is_utf8_lead(c) {
                    i = skip_utf8(mem, i, lastnl, line)?;
                    state = State::Str;
                } else {
                    return Err(ReadError::parse(
                        line,
                        format!("unexpected character {}", byte_repr(c)),
                    ));
                }
            }

            State::QuoteEnd => {
                if c == delim {
                    push!(quoted_kind(start, end, qstring), start, end);
                    next_field!();
                    i += 1;
                } else if c == b'\n' || c == b'\r' {
                    push!(quoted_kind(start, end, qstring), start, end);
                    finish!();
                } else if c == quot {
                    // Doubled quote: the field reopens with an escape inside.
                    qstring = true;
                    state = State::Str;
                    i += 1;
                } else if c == b' ' && trim {
                    state = State::QuoteEndSpace;
                    i += 1;
                } else {
                    return Err(ReadError::parse(
                        line,
                        format!("unexpected character {} after closing quote", byte_repr(c)),
                    ));
                }
            }

            State::QuoteEndSpace => {
                if c == delim {
                    push!(quoted_kind(start, end, qstring), start, end);
                    next_field!();
                    i += 1;
                } else if c == b'\n' || c == b'\r' {
                    push!(quoted_kind(start, end, qstring), start, end);
                    finish!();
                } else if c == b' ' {
                    i += 1;
                } else {
                    return Err(ReadError::parse(
                        line,
                        format!("unexpected character {} after closing quote", byte_repr(c)),
                    ));
                }
            }
        }
    }
}

/// Scans the header line into an ordered token list.
///
/// Shares the record scanner's lexical rules but produces only plain,
/// escaped, or empty string tokens, and fails fast on a quoted name that
/// spans lines. Returns the tokens and the position just past the header's
/// terminator.
pub(crate) fn scan_header(
    mem: &[u8],
    lastnl: usize,
    line: u64,
    params: &ParserParams,
) -> Result<(Vec<Token>, usize)> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum H {
        Begin,
        Field,
        FieldSpace,
        QuoteEnd,
        QuoteEndSpace,
    }

    let delim = params.delim;
    let quot = params.quot;
    let trim = params.trim;

    let mut out = Vec::new();
    let mut state = H::Begin;
    let mut i = 0usize;
    let mut start = 0usize;
    let mut end = 0usize;
    let mut quoted = false;
    let mut qstring = false;

    macro_rules! push {
        ($kind:expr, $lo:expr, $hi:expr) => {
            out.push(Token::new($kind, $lo + 1, $hi - $lo))
        };
    }
    macro_rules! finish {
        () => {{
            let next = if mem[i] == b'\r' && i + 1 <= lastnl && mem[i + 1] == b'\n' {
                i + 2
            } else {
                i + 1
            };
            return Ok((out, next));
        }};
    }

    loop {
        debug_assert!(i <= lastnl);
        let c = mem[i];
        match state {
            H::Begin => {
                if c == delim {
                    push!(KIND_MISSING, i, i);
                } else if c == b'\n' || c == b'\r' {
                    push!(KIND_MISSING, i, i);
                    finish!();
                } else if c == quot {
                    quoted = true;
                    qstring = false;
                    start = i + 1;
                    state = H::Field;
                } else if c == b' ' && trim {
                    // consume leading spaces
                } else if is_utf8_lead(c) {
                    start = i;
                    i = skip_utf8(mem, i, lastnl, line)?;
                    state = H::Field;
                    continue;
                } else if is_printable(c) || c == b' ' {
                    start = i;
                    state = H::Field;
                } else {
                    return Err(ReadError::parse(
                        line,
                        format!("unexpected character {} in header", byte_repr(c)),
                    ));
                }
                i += 1;
            }

            H::Field if quoted => {
                if c == quot {
                    end = i;
                    state = H::QuoteEnd;
                } else if c == b'\n' || c == b'\r' {
                    return Err(ReadError::parse(
                        line,
                        "multi-line quoted strings are not allowed in the header",
                    ));
                } else if c == b' ' || c == b'\t' || is_printable(c) {
                    // content
                } else if is_utf8_lead(c) {
                    i = skip_utf8(mem, i, lastnl, line)?;
                    continue;
                } else {
                    return Err(ReadError::parse(
                        line,
                        format!("unexpected character {} in header", byte_repr(c)),
                    ));
                }
                i += 1;
            }

            H::Field => {
                if c == delim {
                    push!(KIND_STRING, start, i);
                    quoted = false;
                    qstring = false;
                    state = H::Begin;
                } else if c == b'\n' || c == b'\r' {
                    push!(KIND_STRING, start, i);
                    finish!();
                } else if c == b' ' {
                    if trim {
                        end = i;
                        state = H::FieldSpace;
                    }
                } else if c == quot {
                    return Err(ReadError::parse(
                        line,
                        "unexpected quote inside an unquoted header name",
                    ));
                } else if is_utf8_lead(c) {
                    i = skip_utf8(mem, i, lastnl, line)?;
                    continue;
                } else if !is_printable(c) {
                    return Err(ReadError::parse(
                        line,
                        format!("unexpected character {} in header", byte_repr(c)),
                    ));
                }
                i += 1;
            }

            H::FieldSpace => {
                if c == delim {
                    push!(KIND_STRING, start, end);
                    quoted = false;
                    qstring = false;
                    state = H::Begin;
                } else if c == b'\n' || c == b'\r' {
                    push!(KIND_STRING, start, end);
                    finish!();
                } else if c == b' ' {
                    // more trailing space
                } else if c == quot {
                    return Err(ReadError::parse(
                        line,
                        "unexpected quote inside an unquoted header name",
                    ));
                } else if is_utf8_lead(c) {
                    i = skip_utf8(mem, i, lastnl, line)?;
                    state = H::Field;
                    continue;
                } else if is_printable(c) {
                    state = H::Field;
                } else {
                    return Err(ReadError::parse(
                        line,
                        format!("unexpected character {} in header", byte_repr(c)),
                    ));
                }
                i += 1;
            }

            H::QuoteEnd => {
                if c == delim {
                    push!(quoted_kind(start, end, qstring), start, end);
                    quoted = false;
                    qstring = false;
                    state = H::Begin;
                } else if c == b'\n' || c == b'\r' {
                    push!(quoted_kind(start, end, qstring), start, end);
                    finish!();
                } else if c == quot {
                    qstring = true;
                    state = H::Field;
                } else if c == b' ' && trim {
                    state = H::QuoteEndSpace;
                } else {
                    return Err(ReadError::parse(
                        line,
                        format!("unexpected character {} after closing quote", byte_repr(c)),
                    ));
                }
                i += 1;
            }

            H::QuoteEndSpace => {
                if c == delim {
                    push!(quoted_kind(start, end, qstring), start, end);
                    quoted = false;
                    qstring = false;
                    state = H::Begin;
                } else if c == b'\n' || c == b'\r' {
                    push!(quoted_kind(start, end, qstring), start, end);
                    finish!();
                } else if c == b' ' {
                    // more trailing space
                } else {
                    return Err(ReadError::parse(
                        line,
                        format!("unexpected character {} after closing quote", byte_repr(c)),
                    ));
                }
                i += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ParserParams {
        ParserParams::new(b',')
    }

    fn scan(input: &[u8], ncols: usize) -> Result<(TokenMatrix, ScanResult)> {
        let mut m = TokenMatrix::new(ncols, 1);
        let lastnl = input
            .iter()
            .rposition(|&b| b == b'\n' || b == b'\r')
            .expect("test input must be terminated");
        let r = scan_record(input, 0, lastnl, &mut m, 0, 1, &params())?;
        Ok((m, r))
    }

    fn field<'a>(mem: &'a [u8], m: &TokenMatrix, col: usize) -> &'a [u8] {
        &mem[m.get(col, 0).range()]
    }

    #[test]
    fn classifies_numeric_fields() -> Result<()> {
        let mem = b"42,-7,3.5,1e-3,.5,+.25\n";
        let (m, r) = scan(mem, 6)?;
        assert_eq!(r, ScanResult::Record { pos: mem.len(), ncols: 6 });
        assert_eq!(m.get(0, 0).kind(), KIND_INTEGER | KIND_FLOAT);
        assert_eq!(m.get(1, 0).kind(), KIND_INTEGER | KIND_FLOAT);
        assert_eq!(m.get(2, 0).kind(), KIND_FLOAT);
        assert_eq!(m.get(3, 0).kind(), KIND_FLOAT);
        assert_eq!(m.get(4, 0).kind(), KIND_FLOAT);
        assert_eq!(m.get(5, 0).kind(), KIND_FLOAT);
        assert_eq!(field(mem, &m, 3), b"1e-3");
        Ok(())
    }

    #[test]
    fn numeric_lookalikes_stay_strings() -> Result<()> {
        let mem = b"1e,+,.,12a,1.2.3\n";
        let (m, _) = scan(mem, 5)?;
        for c in 0..5 {
            assert_eq!(m.get(c, 0).kind(), KIND_STRING, "column {c}");
        }
        Ok(())
    }

    #[test]
    fn special_floats() -> Result<()> {
        let mem = b"NaN,-inf,Infinity,nani\n";
        let (m, _) = scan(mem, 4)?;
        assert_eq!(m.get(0, 0).kind(), KIND_FLOAT);
        assert_eq!(m.get(1, 0).kind(), KIND_FLOAT);
        assert_eq!(m.get(2, 0).kind(), KIND_FLOAT);
        assert_eq!(m.get(3, 0).kind(), KIND_STRING);
        Ok(())
    }

    #[test]
    fn boolean_literals() -> Result<()> {
        let mem = b"true,FALSE,t,F,truex\n";
        let (m, _) = scan(mem, 5)?;
        for c in 0..4 {
            assert_eq!(m.get(c, 0).kind(), KIND_BOOL, "column {c}");
        }
        assert_eq!(m.get(4, 0).kind(), KIND_STRING);
        Ok(())
    }

    #[test]
    fn missing_fields() -> Result<()> {
        let mem = b",\"\",x\n";
        let (m, r) = scan(mem, 3)?;
        assert_eq!(r, ScanResult::Record { pos: mem.len(), ncols: 3 });
        assert!(m.get(0, 0).is_missing());
        assert!(m.get(1, 0).is_missing());
        assert_eq!(m.get(2, 0).kind(), KIND_STRING);
        Ok(())
    }

    #[test]
    fn quoted_fields_and_escapes() -> Result<()> {
        let mem = b"\"a,b\",\"he said \"\"hi\"\"\",\"123\"\n";
        let (m, _) = scan(mem, 3)?;
        assert_eq!(m.get(0, 0).kind(), KIND_STRING);
        assert_eq!(field(mem, &m, 0), b"a,b");
        assert_eq!(m.get(1, 0).kind(), KIND_QSTRING);
        assert_eq!(field(mem, &m, 1), b"he said \"\"hi\"\"");
        // Quoting opts out of numeric candidacy.
        assert_eq!(m.get(2, 0).kind(), KIND_STRING);
        Ok(())
    }

    #[test]
    fn trimming_around_fields() -> Result<()> {
        let mem = b"  7 , x y ,  \"q\"  \n";
        let (m, _) = scan(mem, 3)?;
        assert_eq!(m.get(0, 0).kind(), KIND_INTEGER | KIND_FLOAT);
        assert_eq!(field(mem, &m, 0), b"7");
        assert_eq!(field(mem, &m, 1), b"x y");
        assert_eq!(field(mem, &m, 2), b"q");
        Ok(())
    }

    #[test]
    fn trim_disabled_keeps_spaces() -> Result<()> {
        let mem = b" 7 ,x\n";
        let mut m = TokenMatrix::new(2, 1);
        let mut p = params();
        p.trim = false;
        scan_record(mem, 0, 5, &mut m, 0, 1, &p)?;
        assert_eq!(m.get(0, 0).kind(), KIND_STRING);
        assert_eq!(&mem[m.get(0, 0).range()], b" 7 ");
        Ok(())
    }

    #[test]
    fn crlf_and_cr_terminate() -> Result<()> {
        let mem = b"1,2\r\nrest";
        let (m, r) = scan(mem, 2)?;
        assert_eq!(r, ScanResult::Record { pos: 5, ncols: 2 });
        assert_eq!(m.get(1, 0).kind(), KIND_INTEGER | KIND_FLOAT);

        let mem = b"1,2\rrest\n";
        let mut m = TokenMatrix::new(2, 1);
        let r = scan_record(mem, 0, 8, &mut m, 0, 1, &params())?;
        assert_eq!(r, ScanResult::Record { pos: 4, ncols: 2 });
        Ok(())
    }

    #[test]
    fn quoted_newline_is_content() -> Result<()> {
        let mem = b"\"a\nb\",c\n";
        let (m, r) = scan(mem, 2)?;
        assert_eq!(r, ScanResult::Record { pos: mem.len(), ncols: 2 });
        assert_eq!(field(mem, &m, 0), b"a\nb");
        Ok(())
    }

    #[test]
    fn quoted_field_past_lastnl_requests_more() -> Result<()> {
        let mem = b"\"open\n";
        let mut m = TokenMatrix::new(1, 1);
        let r = scan_record(mem, 0, 5, &mut m, 0, 1, &params())?;
        assert_eq!(r, ScanResult::NeedMore);
        Ok(())
    }

    #[test]
    fn too_many_columns_is_structural() {
        let mem = b"1,2,3\n";
        let mut m = TokenMatrix::new(2, 1);
        let err = scan_record(mem, 0, 5, &mut m, 0, 7, &params()).unwrap_err();
        assert!(matches!(err, ReadError::Structure { line: 7, .. }));
    }

    #[test]
    fn garbage_after_closing_quote_is_a_parse_error() {
        let mem = b"\"a\"x,b\n";
        let mut m = TokenMatrix::new(2, 1);
        let err = scan_record(mem, 0, 6, &mut m, 0, 3, &params()).unwrap_err();
        assert!(matches!(err, ReadError::Parse { line: 3, .. }));
    }

    #[test]
    fn utf8_content_in_strings() -> Result<()> {
        let mem = "héllo,wörld\n".as_bytes();
        let (m, _) = scan(mem, 2)?;
        assert_eq!(field(mem, &m, 0), "héllo".as_bytes());
        assert_eq!(field(mem, &m, 1), "wörld".as_bytes());
        Ok(())
    }

    #[test]
    fn broken_utf8_lead_is_a_parse_error() {
        let mem = b"a\xc3,b\n";
        let mut m = TokenMatrix::new(2, 1);
        let err = scan_record(mem, 0, 4, &mut m, 0, 1, &params()).unwrap_err();
        assert!(matches!(err, ReadError::Parse { .. }));
    }

    #[test]
    fn header_tokens_in_order() -> Result<()> {
        let mem = b"a, b ,\"c,d\",\n";
        let (toks, next) = scan_header(mem, mem.len() - 1, 1, &params())?;
        assert_eq!(next, mem.len());
        assert_eq!(toks.len(), 4);
        assert_eq!(&mem[toks[0].range()], b"a");
        assert_eq!(&mem[toks[1].range()], b"b");
        assert_eq!(&mem[toks[2].range()], b"c,d");
        assert!(toks[3].is_missing());
        Ok(())
    }

    #[test]
    fn header_rejects_multiline_quotes() {
        let mem = b"\"a\nb\",c\n";
        let err = scan_header(mem, mem.len() - 1, 1, &params()).unwrap_err();
        assert!(matches!(err, ReadError::Parse { .. }));
    }
}
