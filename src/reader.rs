//! Entry points and the chunked read driver.
//!
//! [`ReaderBuilder`] carries the reader options; the free functions
//! [`read_csv`], [`read_tsv`], and [`read_delimited`] are thin façades with
//! the conventional delimiters. Sources are dispatched by shape: a string
//! matching `scheme://` is fetched through an external downloader, anything
//! else is opened as a local path; subprocess stdout and arbitrary readers
//! are accepted directly.
//!
//! The driver is the §-by-§ composition of the lower layers: validate the
//! parameters, sniff and wrap compression, skip lines, scan the header, probe
//! the first record for an unnamed leading column, then loop
//! tokenize → aggregate → widen → fill until the stream drains, and finish
//! with the temporal post-pass.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::LazyLock;

use regex::Regex;

use crate::cache::StringCache;
use crate::column::Column;
use crate::compression;
use crate::error::{ReadError, Result};
use crate::infer;
use crate::params::ParserParams;
use crate::scan::{self, ScanResult};
use crate::source::Source;
use crate::table::Table;
use crate::token::TokenMatrix;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\w+://").unwrap());

/// Reads a comma-separated source with default options.
pub fn read_csv(source: &str) -> Result<Table> {
    ReaderBuilder::csv().read_source(source)
}

/// Reads a tab-separated source with default options.
pub fn read_tsv(source: &str) -> Result<Table> {
    ReaderBuilder::tsv().read_source(source)
}

/// Reads a delimited source with an explicit delimiter byte.
pub fn read_delimited(source: &str, delim: u8) -> Result<Table> {
    ReaderBuilder::new(delim).read_source(source)
}

/// Configurable reader, in the builder style of the `csv` ecosystem.
///
/// # Examples
///
/// ```no_run
/// use gridiron::ReaderBuilder;
/// # fn main() -> gridiron::Result<()> {
/// let table = ReaderBuilder::csv()
///     .skip(2)
///     .chunksize(4 << 20)
///     .read_path("measurements.csv.gz")?;
/// println!("{} rows x {} cols", table.nrows(), table.ncols());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReaderBuilder {
    params: ParserParams,
}

impl ReaderBuilder {
    /// A reader with an explicit delimiter byte.
    pub fn new(delim: u8) -> ReaderBuilder {
        ReaderBuilder {
            params: ParserParams::new(delim),
        }
    }

    /// Comma-delimited reader.
    pub fn csv() -> ReaderBuilder {
        ReaderBuilder::new(b',')
    }

    /// Tab-delimited reader.
    pub fn tsv() -> ReaderBuilder {
        ReaderBuilder::new(b'\t')
    }

    /// Quote byte. Default `"`.
    pub fn quot(mut self, quot: u8) -> ReaderBuilder {
        self.params.quot = quot;
        self
    }

    /// Trim ASCII spaces around unquoted fields. Default on.
    pub fn trim(mut self, trim: bool) -> ReaderBuilder {
        self.params.trim = trim;
        self
    }

    /// Number of leading lines to discard. Default 0.
    pub fn skip(mut self, skip: u64) -> ReaderBuilder {
        self.params.skip = skip;
        self
    }

    /// Explicit column names; when set, no header line is consumed and the
    /// first line after `skip` is data.
    pub fn colnames<I, S>(mut self, names: I) -> ReaderBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params.colnames = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Refill target in bytes; 0 reads the whole stream into one buffer.
    /// Default 1 MiB.
    pub fn chunksize(mut self, bytes: usize) -> ReaderBuilder {
        self.params.chunksize = bytes;
        self
    }

    /// Reads a local file.
    pub fn read_path(&self, path: impl AsRef<Path>) -> Result<Table> {
        let file = File::open(path.as_ref())?;
        self.read_from(file)
    }

    /// Fetches a URL through an external downloader (`curl`, then `wget`).
    pub fn read_url(&self, url: &str) -> Result<Table> {
        self.read_stream(open_url(url)?)
    }

    /// Parses the stdout of a subprocess. A non-zero exit status surfaces as
    /// an I/O error once the stream drains.
    pub fn read_command(&self, command: Command) -> Result<Table> {
        self.read_stream(Box::new(ChildStream::spawn(command)?))
    }

    /// Parses any byte reader (in-memory buffers, sockets, ...).
    pub fn read_from<R: Read + 'static>(&self, reader: R) -> Result<Table> {
        self.read_stream(Box::new(reader))
    }

    /// Dispatches on source shape: `scheme://` goes through the downloader,
    /// anything else is a local path.
    pub fn read_source(&self, source: &str) -> Result<Table> {
        if URL_RE.is_match(source) {
            self.read_url(source)
        } else {
            self.read_path(source)
        }
    }

    fn read_stream(&self, reader: Box<dyn Read>) -> Result<Table> {
        let params = &self.params;
        params.validate()?;

        let reader = compression::sniff_reader(reader)?;
        let mut src = Source::new(reader, params.chunksize);

        src.skip_lines(params.skip)?;
        let mut line: u64 = params.skip + 1;

        // Header: explicit names, or scanned off the first remaining line.
        let mut names = match &params.colnames {
            Some(explicit) => explicit.clone(),
            None => {
                let Some(lastnl) = src.buffer_lines()? else {
                    return Err(ReadError::parse(line, "no column names found in the header"));
                };
                let (names, next) = {
                    let mem = src.mem();
                    let (toks, next) = scan::scan_header(mem, lastnl, line, params)?;
                    if toks.len() == 1 && toks[0].len() == 0 {
                        return Err(ReadError::parse(
                            line,
                            "no column names found in the header",
                        ));
                    }
                    let mut names = Vec::with_capacity(toks.len());
                    for t in &toks {
                        names.push(header_name(mem, *t, params.quot, line)?);
                    }
                    (names, next)
                };
                src.advance(next);
                line += 1;
                names
            }
        };
        rename_unnamed(&mut names);
        let mut ncols = names.len();

        // Probe the first data record with one spare column slot: one extra
        // field means an unnamed leading (row-name) column.
        let first_window = loop {
            match src.buffer_lines()? {
                None => {
                    // Header-only input: zero rows, all-string columns.
                    let columns = vec![Column::Str(Vec::new()); ncols];
                    return Ok(Table::new(names, columns));
                }
                Some(lastnl) => {
                    let mut peek = TokenMatrix::new(ncols + 1, 1);
                    let scanned = scan::scan_record(src.mem(), 0, lastnl, &mut peek, 0, line, params);
                    match scanned {
                        Ok(ScanResult::Record { ncols: seen, .. }) => {
                            if seen == ncols + 1 {
                                names.insert(0, "UNNAMED_0".to_string());
                                ncols += 1;
                            } else if seen < ncols {
                                return Err(ReadError::Structure {
                                    line,
                                    expected: ncols,
                                    found: seen,
                                });
                            }
                            break lastnl;
                        }
                        Ok(ScanResult::NeedMore) => {
                            if src.at_eof() {
                                return Err(ReadError::parse(
                                    line,
                                    "quoted field is never closed",
                                ));
                            }
                            src.grow();
                        }
                        Err(ReadError::Structure { line, found, .. }) => {
                            return Err(ReadError::Structure {
                                line,
                                expected: ncols,
                                found,
                            });
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        };

        // Rows per chunk, estimated from the newline density of the current
        // window; CR-only files fall back to counting CRs.
        let chunk_rows = {
            let mem = &src.mem()[..=first_window];
            let lf = mem.iter().filter(|&&b| b == b'\n').count();
            let nl = if lf > 0 {
                lf
            } else {
                mem.iter().filter(|&&b| b == b'\r').count()
            };
            nl.max(5)
        };

        let mut tokens = TokenMatrix::new(ncols, chunk_rows);
        let mut columns: Vec<Column> = Vec::new();
        let mut caches: Vec<StringCache> = (0..ncols).map(|_| StringCache::new()).collect();

        loop {
            let Some(lastnl) = src.buffer_lines()? else { break };

            // Tokenize as many complete records as fit the matrix.
            let (consumed, nrows, need_more) = {
                let mem = src.mem();
                let mut pos = 0usize;
                let mut nrows = 0usize;
                let mut need_more = false;
                while nrows < chunk_rows && pos <= lastnl {
                    let record_line = line + nrows as u64;
                    match scan::scan_record(mem, pos, lastnl, &mut tokens, nrows, record_line, params)? {
                        ScanResult::Record { pos: next, ncols: seen } => {
                            if seen != ncols {
                                return Err(ReadError::Structure {
                                    line: record_line,
                                    expected: ncols,
                                    found: seen,
                                });
                            }
                            pos = next;
                            nrows += 1;
                        }
                        ScanResult::NeedMore => {
                            need_more = true;
                            break;
                        }
                    }
                }
                (pos, nrows, need_more)
            };

            if nrows == 0 {
                // A single record outsized the window.
                if need_more && src.at_eof() {
                    return Err(ReadError::parse(line, "quoted field is never closed"));
                }
                src.grow();
                continue;
            }

            // Classify, reconcile with the committed types, then fill.
            {
                let mem = src.mem();
                for c in 0..ncols {
                    let class = infer::aggregate(&tokens, c, nrows);
                    if columns.len() == c {
                        let (mut column, nullable) = infer::decide(class);
                        if nullable {
                            column.widen();
                        }
                        columns.push(column);
                    } else {
                        if !infer::admissible(&columns[c], class) {
                            return Err(ReadError::TypeGuess {
                                column: names[c].clone(),
                                message: format!(
                                    "a value at or after line {line} does not fit the \
                                     inferred type {}",
                                    columns[c].type_name()
                                ),
                            });
                        }
                        if infer::saw_missing(class) && !columns[c].is_nullable() {
                            columns[c].widen();
                        }
                    }
                    columns[c].fill(mem, &tokens, c, nrows, params.quot, &mut caches[c], line)?;
                }
            }

            log::debug!("chunk materialized: {nrows} rows, {consumed} bytes");
            src.advance(consumed);
            line += nrows as u64;
        }

        if columns.is_empty() {
            columns = vec![Column::Str(Vec::new()); ncols];
        }

        crate::temporal::convert_temporal(&mut columns);
        Ok(Table::new(names, columns))
    }
}

/// Materializes one header token, unescaping doubled quotes. Missing tokens
/// become empty names, renamed later.
fn header_name(mem: &[u8], t: crate::token::Token, quot: u8, line: u64) -> Result<String> {
    use crate::token::KIND_QSTRING;
    if t.is_missing() {
        return Ok(String::new());
    }
    let bytes = &mem[t.range()];
    if t.kind() & KIND_QSTRING != 0 {
        String::from_utf8(crate::column::unescape_quotes(bytes, quot))
            .map_err(|_| ReadError::parse(line, "header name is not valid UTF-8"))
    } else {
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ReadError::parse(line, "header name is not valid UTF-8"))
    }
}

/// Replaces empty names with `UNNAMED_{i}`. Idempotent: existing
/// `UNNAMED_{i}` names are left untouched.
fn rename_unnamed(names: &mut [String]) {
    for (i, name) in names.iter_mut().enumerate() {
        if name.is_empty() {
            *name = format!("UNNAMED_{i}");
        }
    }
}

/// Subprocess stdout as a readable stream. The exit status is checked when
/// the stream drains so downstream errors (a failed download, a dying
/// producer) are not silently truncated output.
struct ChildStream {
    child: Child,
    stdout: ChildStdout,
    reaped: bool,
}

impl ChildStream {
    fn spawn(mut command: Command) -> Result<ChildStream> {
        let mut child = command
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReadError::Environment("subprocess has no stdout".into()))?;
        Ok(ChildStream {
            child,
            stdout,
            reaped: false,
        })
    }
}

impl Read for ChildStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.stdout.read(buf)?;
        if n == 0 && !self.reaped {
            self.reaped = true;
            let status = self.child.wait()?;
            if !status.success() {
                return Err(std::io::Error::other(format!(
                    "subprocess exited with {status}"
                )));
            }
        }
        Ok(n)
    }
}

/// Spawns the first available downloader for `url`. Absence of both tools is
/// an environment error, not an I/O error.
fn open_url(url: &str) -> Result<Box<dyn Read>> {
    let attempts: [(&str, &[&str]); 2] = [
        ("curl", &["--location", "--silent", "--show-error", "--fail"]),
        ("wget", &["--quiet", "--output-document", "-"]),
    ];
    for (tool, args) in attempts {
        let mut command = Command::new(tool);
        command.args(args).arg(url);
        match ChildStream::spawn(command) {
            Ok(stream) => return Ok(Box::new(stream)),
            Err(ReadError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        }
    }
    Err(ReadError::Environment(format!(
        "cannot fetch {url}: no downloader found (install curl or wget)"
    )))
}
