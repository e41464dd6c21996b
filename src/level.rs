//! A level: a `(data file, index)` pair backing a single generation,
//! opened/closed like a lexically scoped resource.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, error};

use crate::chunk::Chunk;
use crate::digest::hex_digest;
use crate::error::{Error, Result};
use crate::index::Index;

pub struct Level {
    data_path: PathBuf,
    index_path: PathBuf,
    chunk_size: u64,
    data: std::fs::File,
    index: Index,
    closed: bool,
}

impl Level {
    /// Open a level, creating the data file if absent. An absent index file
    /// means an empty index, not an error.
    pub fn open(data_path: &Path, index_path: &Path, chunk_size: u64) -> Result<Self> {
        let data = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(data_path)?;

        let index = match Index::read(index_path, chunk_size) {
            Ok(index) => index,
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Index::new(chunk_size)
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            data_path: data_path.to_path_buf(),
            index_path: index_path.to_path_buf(),
            chunk_size,
            data,
            index,
            closed: false,
        })
    }

    /// Flush the index to disk and sync the data file. Always call this on
    /// every exit path (success or error) of an operation that opened the
    /// level.
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        self.closed = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.data.sync_all()?;
        self.index.write(&self.index_path)?;
        Ok(())
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn size(&self) -> u64 {
        self.index.size()
    }

    pub fn set_size(&mut self, size: u64) -> Result<()> {
        self.index.set_size(size)
    }

    pub fn has(&self, chunk_id: u64) -> bool {
        self.index.has(chunk_id)
    }

    pub fn chunk_ids(&self) -> Vec<u64> {
        self.index.chunk_ids().collect()
    }

    pub fn read_meta(&self, chunk_id: u64) -> Result<&Chunk> {
        self.index
            .get_meta(chunk_id)
            .ok_or(Error::ChunkNotFound(chunk_id))
    }

    /// Write `data` to `chunk_id`. Requires `data.len() <= chunk_size`.
    /// Offsets are assigned (for new chunk ids) or reused (for existing
    /// ones) by the index - there is no read-before-write and no free list.
    pub fn write(&mut self, chunk_id: u64, data: &[u8]) -> Result<()> {
        if data.len() as u64 > self.chunk_size {
            return Err(Error::ChunkTooLarge {
                len: data.len(),
                chunk_size: self.chunk_size,
            });
        }
        let checksum = hex_digest(data);
        let offset = self.index.get(chunk_id).offset;
        self.data.seek(SeekFrom::Start(offset))?;
        self.data.write_all(data)?;
        let chunk = self.index.get(chunk_id);
        chunk.checksum = checksum;
        chunk.length = data.len() as u64;
        debug!("wrote chunk {} ({} bytes) at offset {}", chunk_id, data.len(), offset);
        Ok(())
    }

    /// Read a chunk's payload and verify its checksum. In strict mode a
    /// mismatch fails with `ChunkChecksumWrong`; otherwise it is logged at
    /// error severity and the (corrupt) bytes are returned anyway.
    pub fn read(&mut self, chunk_id: u64, strict: bool) -> Result<Vec<u8>> {
        let chunk = self.read_meta(chunk_id)?.clone();
        self.data.seek(SeekFrom::Start(chunk.offset))?;
        let mut buf = vec![0u8; chunk.length as usize];
        self.data.read_exact(&mut buf)?;
        let actual = hex_digest(&buf);
        if actual != chunk.checksum {
            if strict {
                return Err(Error::ChunkChecksumWrong(chunk_id));
            }
            error!(
                "checksum for chunk {} in {} does not match (expected {}, got {})",
                chunk_id,
                self.data_path.display(),
                chunk.checksum,
                actual
            );
        }
        Ok(buf)
    }

    /// Clear a chunk's stored checksum, marking it known-bad. The data
    /// bytes are untouched; this is metadata-only.
    pub fn invalidate_chunk(&mut self, chunk_id: u64) {
        self.index.get(chunk_id).checksum = String::new();
    }
}

impl Drop for Level {
    /// Best-effort flush if `close` was never called (e.g. a panic unwound
    /// past it). Errors here are logged, not propagated - `close` is the
    /// supported way to observe flush failures.
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.flush() {
                error!("failed to flush level {} on drop: {}", self.index_path.display(), e);
            }
        }
    }
}
