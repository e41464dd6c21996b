//! The in-memory index for one level: chunk-id -> descriptor, plus the
//! logical image size the level's index represents. Text-serialisable to
//! the newline-delimited format described in `Index::read`/`Index::write`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::chunk::{Chunk, ChunkStatus};
use crate::error::{Error, Result};

pub struct Index {
    chunk_size: u64,
    size: u64,
    chunks: BTreeMap<u64, Chunk>,
}

impl Index {
    pub fn new(chunk_size: u64) -> Self {
        Self {
            chunk_size,
            size: 0,
            chunks: BTreeMap::new(),
        }
    }

    fn next_offset(&self) -> u64 {
        (self.chunks.len() as u64) * self.chunk_size
    }

    /// Get an existing chunk descriptor or create a fresh one. This is the
    /// sole mechanism by which offsets are assigned (invariant I1): a new
    /// descriptor's offset is `chunk_size * (current cardinality)`.
    pub fn get(&mut self, chunk_id: u64) -> &mut Chunk {
        if !self.chunks.contains_key(&chunk_id) {
            let offset = self.next_offset();
            self.chunks.insert(chunk_id, Chunk::new_at(offset));
        }
        self.chunks.get_mut(&chunk_id).unwrap()
    }

    pub fn has(&self, chunk_id: u64) -> bool {
        self.chunks.contains_key(&chunk_id)
    }

    pub fn get_meta(&self, chunk_id: u64) -> Option<&Chunk> {
        self.chunks.get(&chunk_id)
    }

    /// Chunk ids in ascending order.
    pub fn chunk_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.chunks.keys().copied()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn set_size(&mut self, size: u64) -> Result<()> {
        if size < self.size {
            return Err(Error::ShrinkUnsupported {
                current: self.size,
                requested: size,
            });
        }
        self.size = size;
        Ok(())
    }

    /// Write this index to `path` as newline-delimited text, keys in
    /// ascending chunk-id order (falls out of the `BTreeMap`'s natural
    /// iteration order).
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        writeln!(file, "{}", self.size)?;
        for (chunk_id, chunk) in &self.chunks {
            writeln!(
                file,
                "{}|{}|{}|{}|{}",
                chunk_id,
                chunk.checksum,
                chunk.offset,
                chunk.length,
                chunk.status.to_code(),
            )?;
        }
        Ok(())
    }

    /// Read an index from `path`. A missing file is not handled here - the
    /// level decides whether an absent index means "start empty".
    pub fn read(path: &Path, chunk_size: u64) -> Result<Self> {
        let file = File::open(path)?;
        let mut lines = BufReader::new(file).lines();

        let size_line = lines
            .next()
            .ok_or_else(|| Error::Index("missing size line".to_string()))??;
        let size: u64 = size_line
            .trim()
            .parse()
            .map_err(|_| Error::Index(format!("invalid size '{}'", size_line)))?;

        let mut chunks = BTreeMap::new();
        for line in lines {
            let line = line?;
            let fields: Vec<&str> = line.trim_end_matches('\n').split('|').collect();
            if fields.len() != 5 {
                return Err(Error::Index(format!(
                    "expected 5 fields, got {} in '{}'",
                    fields.len(),
                    line
                )));
            }
            let chunk_id: u64 = fields[0]
                .parse()
                .map_err(|_| Error::Index(format!("invalid chunk id '{}'", fields[0])))?;
            let checksum = fields[1].to_string();
            let offset: u64 = fields[2]
                .parse()
                .map_err(|_| Error::Index(format!("invalid offset '{}'", fields[2])))?;
            let length: u64 = fields[3]
                .parse()
                .map_err(|_| Error::Index(format!("invalid length '{}'", fields[3])))?;
            let status_code: u8 = fields[4]
                .parse()
                .map_err(|_| Error::Index(format!("invalid status '{}'", fields[4])))?;
            let status = ChunkStatus::from_code(status_code)
                .ok_or_else(|| Error::Index(format!("unknown status code {}", status_code)))?;
            chunks.insert(
                chunk_id,
                Chunk {
                    checksum,
                    offset,
                    length,
                    status,
                },
            );
        }

        Ok(Self {
            chunk_size,
            size,
            chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_descriptor_offsets_follow_insertion_rank() {
        let mut index = Index::new(1024);
        assert_eq!(index.get(5).offset, 0);
        assert_eq!(index.get(2).offset, 1024);
        // Re-fetching an existing id reuses its offset.
        assert_eq!(index.get(5).offset, 0);
    }

    #[test]
    fn round_trip_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idx");

        let mut index = Index::new(4096);
        index.set_size(9000).unwrap();
        index.get(0).checksum = "abcd".to_string();
        index.get(0).length = 4096;
        index.get(2).checksum = "".to_string();
        index.get(2).length = 808;
        index.write(&path).unwrap();

        let reloaded = Index::read(&path, 4096).unwrap();
        assert_eq!(reloaded.size(), 9000);
        assert_eq!(reloaded.chunk_ids().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(reloaded.get_meta(0).unwrap().checksum, "abcd");
        assert_eq!(reloaded.get_meta(2).unwrap().checksum, "");

        let reserialized_path = dir.path().join("idx2");
        reloaded.write(&reserialized_path).unwrap();
        let original = std::fs::read_to_string(&path).unwrap();
        let roundtripped = std::fs::read_to_string(&reserialized_path).unwrap();
        assert_eq!(original, roundtripped);
    }

    #[test]
    fn shrink_is_rejected() {
        let mut index = Index::new(4096);
        index.set_size(100).unwrap();
        assert!(index.set_size(50).is_err());
    }
}
