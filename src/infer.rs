//! Per-column type aggregation and inference.
//!
//! After a chunk is tokenized, each column's token kinds are folded into an
//! 8-bit classification: bits 0–3 hold the running intersection of the
//! candidate sets of non-missing tokens, bit 4 is a sticky "saw a missing"
//! flag. Missing tokens carry a full candidate nibble, so the fold needs no
//! branch on missing — the intersection is a plain AND.

use crate::column::Column;
use crate::token::{TokenMatrix, KIND_BOOL, KIND_FLOAT, KIND_INTEGER, KIND_MISSING};

/// Fresh classification: every candidate alive, no missing seen.
const FRESH: u8 = 0b0000_1111;
const MISSING_BIT: u8 = 0b0001_0000;

/// Folds the kinds of `nrows` tokens in column `col` into a classification
/// byte.
pub(crate) fn aggregate(tokens: &TokenMatrix, col: usize, nrows: usize) -> u8 {
    let mut y = FRESH;
    for row in 0..nrows {
        let x = tokens.get(col, row).kind();
        y = (y | (u8::from(x == KIND_MISSING) << 4)) & (x | MISSING_BIT);
    }
    y
}

#[inline]
pub(crate) fn saw_missing(class: u8) -> bool {
    class & MISSING_BIT != 0
}

/// Concrete type admitted by a first-chunk classification, in priority
/// order integer → float → boolean → string.
///
/// A classification with the full candidate nibble means every token was
/// missing: there is no evidence at all, and the column defaults to string.
/// Later chunks cannot promote it back to a narrower type.
pub(crate) fn decide(class: u8) -> (Column, bool) {
    let cand = class & FRESH;
    let column = if cand == FRESH {
        Column::Str(Vec::new())
    } else if cand & KIND_INTEGER != 0 {
        Column::Int(Vec::new())
    } else if cand & KIND_FLOAT != 0 {
        Column::Float(Vec::new())
    } else if cand & KIND_BOOL != 0 {
        Column::Bool(Vec::new())
    } else {
        Column::Str(Vec::new())
    };
    (column, saw_missing(class))
}

/// Whether a later chunk's classification still admits the column's
/// committed type. String columns admit anything.
pub(crate) fn admissible(column: &Column, class: u8) -> bool {
    let cand = class & FRESH;
    match column {
        Column::Int(_) | Column::IntOpt(_) => cand & KIND_INTEGER != 0,
        Column::Float(_) | Column::FloatOpt(_) => cand & KIND_FLOAT != 0,
        Column::Bool(_) | Column::BoolOpt(_) => cand & KIND_BOOL != 0,
        _ => true,
    }
}
