//! Resolves byte-range hints into the set of chunk ids they touch.

use std::collections::BTreeSet;

/// Convert `(offset, length)` hints into the set of chunk ids they cover.
///
/// Uses `end = start + (length-1) / chunk_size`, which undercounts when a
/// hint straddles a chunk boundary from a non-aligned offset. This is
/// preserved rather than "fixed" - callers are expected to supply
/// chunk-aligned hints (see DESIGN.md).
pub fn chunks_from_hints(hints: &[(u64, u64)], chunk_size: u64) -> BTreeSet<u64> {
    let mut chunks = BTreeSet::new();
    for &(offset, length) in hints {
        if length == 0 {
            continue;
        }
        let start_chunk = offset / chunk_size;
        let end_chunk = start_chunk + (length - 1) / chunk_size;
        for chunk_id in start_chunk..=end_chunk {
            chunks.insert(chunk_id);
        }
    }
    chunks
}
