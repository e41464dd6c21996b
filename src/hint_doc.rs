//! A convenience collaborator that turns an external sparse-diff hint
//! document into the `(offset, length)` tuples the core consumes. This is
//! not part of the core: the core only ever sees the resulting tuples (see
//! `Archive::backup`'s `hints` parameter).
//!
//! The shape recognised here is a minimal JSON array, analogous to the
//! `rbd diff --format=json` output this design is informed by:
//! `[{"offset": u64, "length": u64, "exists": bool}, ...]`, filtered to
//! `exists == true` entries.

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Deserialize)]
struct HintEntry {
    offset: u64,
    length: u64,
    exists: bool,
}

/// Parse a JSON hint document into `(offset, length)` tuples, keeping only
/// entries marked `exists: true`.
pub fn parse_json_hints(document: &str) -> Result<Vec<(u64, u64)>> {
    let entries: Vec<HintEntry> = serde_json::from_str(document)
        .map_err(|e| Error::HintDocument(e.to_string()))?;
    Ok(entries
        .into_iter()
        .filter(|entry| entry.exists)
        .map(|entry| (entry.offset, entry.length))
        .collect())
}
