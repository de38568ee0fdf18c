//! Routing of intermediate keys to reduce buckets.
//!
//! Every worker of a job must send a given key to the same bucket, otherwise a
//! reduce task would miss part of its input. The hash therefore has no
//! per-process seed.

use std::hash::Hasher;

use fnv::FnvHasher;

/// FNV-1a hash of `key`, masked to a non-negative 31-bit value.
pub fn ihash(key: &str) -> u32 {
    let mut hasher = FnvHasher::default();
    hasher.write(key.as_bytes());
    (hasher.finish() & 0x7fff_ffff) as u32
}

/// The reduce bucket `key` belongs to, in `[0, n_reduce)`.
///
/// `n_reduce` must be non-zero.
pub fn bucket(key: &str, n_reduce: usize) -> usize {
    ihash(key) as usize % n_reduce
}
