//! Seekable byte stream abstractions over the image being backed up or
//! restored. No streaming API is required - just read/write/seek.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::Result;

/// A seekable, readable source image (the thing being backed up).
pub trait Source: Read + Seek {}
impl<T: Read + Seek> Source for T {}

/// A seekable, writable target image (the thing being restored into).
pub trait Target: Write + Seek {}
impl<T: Write + Seek> Target for T {}

/// Determine a seekable stream's byte length by seeking to the end, then
/// restore the original position.
pub fn stream_len<S: Seek>(stream: &mut S) -> Result<u64> {
    let current = stream.stream_position()?;
    let len = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(current))?;
    Ok(len)
}
