//! Transparent decompression framing.
//!
//! The first bytes of the stream are sniffed against the gzip, xz, and zstd
//! magic numbers; on a match the appropriate decoder is interposed and the
//! rest of the crate only ever sees plain text. Detection is content-based
//! only — sources are often pipes or downloads with no trustworthy filename.
//!
//! Each codec sits behind a default-on feature flag; with a codec compiled
//! out, its magic is simply not recognized and the stream passes through.

use std::io::{Cursor, ErrorKind, Read};

use crate::error::Result;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const XZ_MAGIC: [u8; 6] = [0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Codec {
    #[cfg(feature = "compression-gzip")]
    Gzip,
    #[cfg(feature = "compression-xz")]
    Xz,
    #[cfg(feature = "compression-zstd")]
    Zstd,
}

fn detect(head: &[u8]) -> Option<Codec> {
    #[cfg(feature = "compression-gzip")]
    if head.starts_with(&GZIP_MAGIC) {
        return Some(Codec::Gzip);
    }
    #[cfg(feature = "compression-xz")]
    if head.starts_with(&XZ_MAGIC) {
        return Some(Codec::Xz);
    }
    #[cfg(feature = "compression-zstd")]
    if head.starts_with(&ZSTD_MAGIC) {
        return Some(Codec::Zstd);
    }
    let _ = head;
    None
}

/// Sniffs the stream head and wraps the reader with the matching
/// decompressor, or returns it untouched (with the sniffed bytes restored).
pub(crate) fn sniff_reader(mut inner: Box<dyn Read>) -> Result<Box<dyn Read>> {
    let mut head = [0u8; 6];
    let mut filled = 0;
    while filled < head.len() {
        match inner.read(&mut head[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    let codec = detect(&head[..filled]);
    let restored: Box<dyn Read> = Box::new(Cursor::new(head[..filled].to_vec()).chain(inner));
    match codec {
        #[cfg(feature = "compression-gzip")]
        Some(Codec::Gzip) => {
            log::debug!("gzip magic detected, interposing decoder");
            Ok(Box::new(flate2::read::GzDecoder::new(restored)))
        }
        #[cfg(feature = "compression-xz")]
        Some(Codec::Xz) => {
            log::debug!("xz magic detected, interposing decoder");
            Ok(Box::new(xz2::read::XzDecoder::new(restored)))
        }
        #[cfg(feature = "compression-zstd")]
        Some(Codec::Zstd) => {
            log::debug!("zstd magic detected, interposing decoder");
            Ok(Box::new(zstd::stream::read::Decoder::new(restored)?))
        }
        #[allow(unreachable_patterns)]
        _ => Ok(restored),
    }
}
