//! Immutable parser configuration.
//!
//! There is no global configuration anywhere in the crate: a validated
//! [`ParserParams`] value is passed explicitly through every layer. The
//! allowed delimiter and quote byte sets are compile-time rules.

use crate::error::{ReadError, Result};

/// Default refill target: 1 MiB per chunk.
pub const DEFAULT_CHUNKSIZE: usize = 1 << 20;

/// Chunk sizes must stay below 2^36 so token start offsets always fit.
const MAX_CHUNKSIZE: u64 = 1 << 36;

/// Immutable reader configuration, validated before any I/O happens.
#[derive(Debug, Clone)]
pub(crate) struct ParserParams {
    /// Field delimiter byte.
    pub delim: u8,
    /// Quote byte.
    pub quot: u8,
    /// Trim ASCII spaces around unquoted fields.
    pub trim: bool,
    /// Number of leading lines to discard before the header.
    pub skip: u64,
    /// Explicit column names; when set, no header line is consumed.
    pub colnames: Option<Vec<String>>,
    /// Refill target in bytes; 0 disables chunking and slurps the stream.
    pub chunksize: usize,
}

impl ParserParams {
    pub(crate) fn new(delim: u8) -> ParserParams {
        ParserParams {
            delim,
            quot: b'"',
            trim: true,
            skip: 0,
            colnames: None,
            chunksize: DEFAULT_CHUNKSIZE,
        }
    }

    /// Applies the §3 validation rules. Letters and digits can never act as
    /// structure bytes; tab is legal as a delimiter only.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.delim == self.quot {
            return Err(ReadError::Config(format!(
                "delimiter and quote are both {:?}",
                self.delim as char
            )));
        }
        if !delim_allowed(self.delim) {
            return Err(ReadError::Config(format!(
                "invalid delimiter {:?}: expected tab or punctuation",
                self.delim as char
            )));
        }
        if !quot_allowed(self.quot) {
            return Err(ReadError::Config(format!(
                "invalid quote {:?}: expected punctuation",
                self.quot as char
            )));
        }
        if self.trim && (self.delim == b' ' || self.quot == b' ') {
            return Err(ReadError::Config(
                "whitespace trimming conflicts with a space delimiter or quote".into(),
            ));
        }
        if self.chunksize as u64 >= MAX_CHUNKSIZE {
            return Err(ReadError::Config(format!(
                "chunksize {} exceeds the addressable window (2^36 bytes)",
                self.chunksize
            )));
        }
        if let Some(names) = &self.colnames {
            if names.is_empty() {
                return Err(ReadError::Config("explicit column names are empty".into()));
            }
        }
        Ok(())
    }
}

/// Printable ASCII excluding letters and digits; tab additionally allowed.
fn delim_allowed(b: u8) -> bool {
    b == b'\t' || quot_allowed(b)
}

fn quot_allowed(b: u8) -> bool {
    (0x20..=0x7e).contains(&b) && !b.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(ParserParams::new(b',').validate().is_ok());
        assert!(ParserParams::new(b'\t').validate().is_ok());
        assert!(ParserParams::new(b'|').validate().is_ok());
    }

    #[test]
    fn delim_equal_to_quote_rejected() {
        let mut p = ParserParams::new(b'"');
        p.quot = b'"';
        assert!(matches!(p.validate(), Err(ReadError::Config(_))));
    }

    #[test]
    fn alphanumeric_structure_bytes_rejected() {
        assert!(ParserParams::new(b'a').validate().is_err());
        assert!(ParserParams::new(b'7').validate().is_err());
        let mut p = ParserParams::new(b',');
        p.quot = b'q';
        assert!(p.validate().is_err());
    }

    #[test]
    fn trim_with_space_delim_rejected() {
        let mut p = ParserParams::new(b' ');
        assert!(p.validate().is_err());
        p.trim = false;
        assert!(p.validate().is_ok());
    }

    #[test]
    fn oversized_chunksize_rejected() {
        let mut p = ParserParams::new(b',');
        p.chunksize = 1 << 36;
        assert!(p.validate().is_err());
        p.chunksize = (1 << 36) - 1;
        assert!(p.validate().is_ok());
    }
}
