//! Streaming delimited-text reader that materializes typed columnar tables.
//!
//! gridiron ingests CSV/TSV-like byte streams — local files, URLs fetched
//! through an external downloader, subprocess stdout, or any `io::Read` —
//! transparently decompresses gzip/zstd/xz, tokenizes the bytes through a
//! finite-state byte machine, infers per-column types by intersecting
//! per-row candidate sets, and hands back a [`Table`] of typed columns
//! (integer, float, boolean, string, date, datetime, each optionally
//! nullable).
//!
//! ## Quick start
//!
//! ```no_run
//! # fn main() -> gridiron::Result<()> {
//! let table = gridiron::read_csv("trades.csv")?;
//! let prices = table.column_by_name("price").unwrap().as_float().unwrap();
//! println!("{} rows, first price {}", table.nrows(), prices[0]);
//! # Ok(())
//! # }
//! ```
//!
//! Options go through [`ReaderBuilder`]:
//!
//! ```no_run
//! # fn main() -> gridiron::Result<()> {
//! let table = gridiron::ReaderBuilder::new(b'|')
//!     .trim(false)
//!     .skip(1)
//!     .chunksize(0) // slurp the whole stream in one pass
//!     .read_path("export.psv")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees
//!
//! - Output rows preserve input order exactly.
//! - A column containing missings materializes as the nullable form of its
//!   inferred type; a column without missings is never nullable.
//! - Files differing only in their line terminators (LF, CR, CR+LF, mixed)
//!   produce identical output.
//! - Reading is single-threaded and synchronous; the only suspension points
//!   are refills against the upstream stream.
//!
//! ## Feature flags
//!
//! - `compression-gzip` — transparent gzip input (default)
//! - `compression-zstd` — transparent zstd input (default)
//! - `compression-xz` — transparent xz input (default)

mod cache;
pub mod column;
mod compression;
pub mod error;
mod infer;
mod params;
pub mod reader;
mod scan;
mod source;
pub mod table;
mod temporal;
mod token;

pub use column::Column;
pub use error::{ReadError, Result};
pub use params::DEFAULT_CHUNKSIZE;
pub use reader::{read_csv, read_delimited, read_tsv, ReaderBuilder};
pub use table::Table;
