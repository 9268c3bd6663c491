//! Bounded de-duplicating string cache.
//!
//! Delimited files are full of repeated field values (enum-like columns,
//! shared prefixes in identifiers). The cache maps a field's raw bytes to an
//! already-materialized `String` so a hit skips UTF-8 validation. It is a
//! pure optimization: disabling it never changes output.
//!
//! Eight direct-mapped slots keyed by an FNV-1a fingerprint; collisions
//! simply replace the slot. Every 4096 lookups the hit rate is checked and
//! the cache turns itself off for the rest of the column when hits fall
//! below 10% — the check is irrevocable.

const SLOTS: usize = 8;
const CHECK_INTERVAL: u64 = 4096;

pub(crate) struct StringCache {
    slots: [Option<(u64, String)>; SLOTS],
    enabled: bool,
    hits: u64,
    misses: u64,
}

fn fingerprint(bytes: &[u8]) -> u64 {
    // FNV-1a
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        h ^= u64::from(b);
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}

impl StringCache {
    pub(crate) fn new() -> StringCache {
        StringCache {
            slots: Default::default(),
            enabled: true,
            hits: 0,
            misses: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn counters(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    #[cfg(test)]
    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Materializes `bytes` as an owned string, reusing a cached value when
    /// the exact bytes were seen recently.
    pub(crate) fn materialize(&mut self, bytes: &[u8]) -> Result<String, std::str::Utf8Error> {
        if !self.enabled {
            return std::str::from_utf8(bytes).map(str::to_owned);
        }
        let fp = fingerprint(bytes);
        let slot = (fp % SLOTS as u64) as usize;
        if let Some((cached_fp, cached)) = &self.slots[slot] {
            if *cached_fp == fp && cached.as_bytes() == bytes {
                self.hits += 1;
                let out = cached.clone();
                self.checkpoint();
                return Ok(out);
            }
        }
        self.misses += 1;
        let fresh = std::str::from_utf8(bytes)?.to_owned();
        self.slots[slot] = Some((fp, fresh.clone()));
        self.checkpoint();
        Ok(fresh)
    }

    fn checkpoint(&mut self) {
        let total = self.hits + self.misses;
        if total % CHECK_INTERVAL == 0 && 10 * self.hits < total {
            self.enabled = false;
            log::debug!(
                "string cache disabled after {total} lookups ({} hits)",
                self.hits
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_values_hit() {
        let mut c = StringCache::new();
        assert_eq!(c.materialize(b"alpha").unwrap(), "alpha");
        assert_eq!(c.materialize(b"alpha").unwrap(), "alpha");
        assert_eq!(c.counters(), (1, 1));
    }

    #[test]
    fn distinct_values_miss_without_corruption() {
        let mut c = StringCache::new();
        for i in 0..100 {
            let v = format!("value-{i}");
            assert_eq!(c.materialize(v.as_bytes()).unwrap(), v);
        }
        assert_eq!(c.materialize(b"value-99").unwrap(), "value-99");
    }

    #[test]
    fn low_hit_rate_disables_cache() {
        let mut c = StringCache::new();
        for i in 0..CHECK_INTERVAL {
            let v = format!("unique-{i}");
            c.materialize(v.as_bytes()).unwrap();
        }
        assert!(!c.is_enabled());
        // Still correct after disabling.
        assert_eq!(c.materialize(b"unique-0").unwrap(), "unique-0");
        assert_eq!(c.counters().1, CHECK_INTERVAL);
    }

    #[test]
    fn high_hit_rate_stays_enabled() {
        let mut c = StringCache::new();
        for _ in 0..2 * CHECK_INTERVAL {
            c.materialize(b"same").unwrap();
        }
        assert!(c.is_enabled());
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        let mut c = StringCache::new();
        assert!(c.materialize(b"\xc0\xaf").is_err());
    }
}
