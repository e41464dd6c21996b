//! The levelled chunk store: naming scheme, level enumeration, and the
//! backup/restore/scrub protocols that tie a Base level to its history of
//! overlay levels.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, error, info};
use rand::Rng;

use crate::digest::hex_digest;
use crate::error::{Error, Result};
use crate::hints::chunks_from_hints;
use crate::io::{stream_len, Source, Target};
use crate::level::Level;

/// An archive: the ordered collection of levels (one Base, zero or more
/// numbered overlays) backing a single named backup within a directory.
pub struct Archive {
    dir: PathBuf,
    name: String,
    chunk_size: u64,
}

impl Archive {
    pub fn new(dir: &Path, name: &str, chunk_size: u64) -> Result<Self> {
        if name.contains(".data.") || name.contains(".index.") {
            return Err(Error::ReservedNameInBackupName(name.to_string()));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            name: name.to_string(),
            chunk_size,
        })
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    fn base_prefix(&self) -> String {
        format!("{}..", self.name)
    }

    pub fn base_data_path(&self) -> PathBuf {
        self.dir.join(format!("{}data", self.base_prefix()))
    }

    pub fn base_index_path(&self) -> PathBuf {
        self.dir.join(format!("{}index", self.base_prefix()))
    }

    pub fn overlay_data_path(&self, level: i64) -> PathBuf {
        self.dir.join(format!("{}data.{}", self.base_prefix(), level))
    }

    pub fn overlay_index_path(&self, level: i64) -> PathBuf {
        self.dir.join(format!("{}index.{}", self.base_prefix(), level))
    }

    fn level_path_pair(&self, level: Option<i64>) -> (PathBuf, PathBuf) {
        match level {
            None => (self.base_data_path(), self.base_index_path()),
            Some(n) => (self.overlay_data_path(n), self.overlay_index_path(n)),
        }
    }

    /// Scan the directory for this backup's overlay levels. Extracts the
    /// final dot-separated token of each `<name>..*.N` entry and parses it
    /// as an integer; the Base files (`<name>..data`, `<name>..index`) have
    /// no such trailing numeric token and are not counted.
    pub fn existing_levels(&self) -> Result<Vec<i64>> {
        let prefix = self.base_prefix();
        let mut levels = Vec::new();
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(levels),
            Err(e) => return Err(e.into()),
        };
        for entry in read_dir {
            let entry = entry?;
            let file_name = entry.file_name();
            let file_name = match file_name.to_str() {
                Some(s) => s,
                None => continue,
            };
            let remainder = match file_name.strip_prefix(prefix.as_str()) {
                Some(r) => r,
                None => continue,
            };
            if let Some(dot) = remainder.rfind('.') {
                if let Ok(n) = remainder[dot + 1..].parse::<i64>() {
                    levels.push(n);
                }
            }
        }
        levels.sort_unstable();
        levels.dedup();
        Ok(levels)
    }

    pub fn next_level(&self) -> Result<i64> {
        Ok(self.existing_levels()?.into_iter().max().map_or(0, |n| n + 1))
    }

    /// Run a full/incremental backup of `source` into this archive,
    /// optionally restricted to the chunks touched by `hints`. The very
    /// first backup of an archive has nothing to displace, so it writes
    /// only Base - no overlay `0` is created until a second backup evicts
    /// something from it.
    pub fn backup<S: Source>(&self, source: &mut S, hints: Option<&[(u64, u64)]>) -> Result<()> {
        let base_exists = self.base_index_path().exists();
        let mut base = Level::open(&self.base_data_path(), &self.base_index_path(), self.chunk_size)?;

        let mut overlay = if base_exists {
            let next = self.next_level()?;
            debug!(
                "backup: base={} next overlay={}",
                self.base_data_path().display(),
                next
            );
            Some(Level::open(
                &self.overlay_data_path(next),
                &self.overlay_index_path(next),
                self.chunk_size,
            )?)
        } else {
            debug!("backup: base={} (initial backup, no overlay)", self.base_data_path().display());
            None
        };

        let result = Self::run_backup(&mut base, overlay.as_mut(), source, hints, self.chunk_size);

        let close_base = base.close();
        let close_overlay = overlay.map(|o| o.close()).transpose();
        result?;
        close_base?;
        close_overlay?;

        info!("backup complete");
        Ok(())
    }

    fn run_backup<S: Source>(
        base: &mut Level,
        mut overlay: Option<&mut Level>,
        source: &mut S,
        hints: Option<&[(u64, u64)]>,
        chunk_size: u64,
    ) -> Result<()> {
        let source_size = stream_len(source)?;

        // Preserve the pre-promotion size on the overlay before growing Base.
        if let Some(ov) = overlay.as_mut() {
            ov.set_size(base.size())?;
        }
        base.set_size(source_size)?;

        if let Some(hints) = hints {
            for &(offset, length) in hints {
                if offset + length > source_size {
                    return Err(Error::HintsOutOfRange {
                        offset,
                        length,
                        size: source_size,
                    });
                }
            }
        }

        let chunk_count = (source_size + chunk_size - 1) / chunk_size;
        let read_chunks: Vec<u64> = match hints {
            Some(hints) => chunks_from_hints(hints, chunk_size).into_iter().collect(),
            None => (0..chunk_count).collect(),
        };

        for chunk_id in read_chunks {
            let chunk_offset = chunk_id * chunk_size;
            let this_len = source_size.saturating_sub(chunk_offset).min(chunk_size) as usize;
            if this_len == 0 {
                return Err(Error::UnexpectedEOF(chunk_id));
            }
            source.seek(SeekFrom::Start(chunk_offset))?;
            let mut data = vec![0u8; this_len];
            match source.read_exact(&mut data) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Err(Error::UnexpectedEOF(chunk_id));
                }
                Err(e) => return Err(e.into()),
            }

            let new_digest = hex_digest(&data);
            let unchanged = match base.read_meta(chunk_id) {
                Ok(existing) => existing.checksum == new_digest,
                Err(_) => false,
            };
            if unchanged {
                debug!("chunk {} unchanged, skipping", chunk_id);
                continue;
            }

            if base.has(chunk_id) {
                // Base trusts its own stored checksum here (non-strict read);
                // corruption is surfaced as a log, not a hard failure, so one
                // bad chunk in Base does not abort the whole backup.
                let old_data = base.read(chunk_id, false)?;
                if let Some(ov) = overlay.as_mut() {
                    ov.write(chunk_id, &old_data)?;
                }
            }
            base.write(chunk_id, &data)?;
        }

        Ok(())
    }

    /// Restore `level` (or the latest Base image if `None`) into `target`.
    pub fn restore<T: Target>(&self, target: &mut T, level: Option<i64>) -> Result<()> {
        let existing = self.existing_levels()?;
        if let Some(g) = level {
            if !existing.contains(&g) {
                return Err(Error::LevelNotFound(g));
            }
        }

        // Walk order: overlay_g, overlay_{g+1}, ..., overlay_newest, Base.
        let walk: Vec<Option<i64>> = match level {
            None => vec![None],
            Some(g) => {
                let mut overlays: Vec<i64> = existing.into_iter().filter(|&n| n >= g).collect();
                overlays.sort_unstable();
                let mut walk: Vec<Option<i64>> = overlays.into_iter().map(Some).collect();
                walk.push(None);
                walk
            }
        };

        let mut levels = Vec::with_capacity(walk.len());
        for lvl in &walk {
            let (data_path, index_path) = self.level_path_pair(*lvl);
            levels.push(Level::open(&data_path, &index_path, self.chunk_size)?);
        }

        let result = Self::run_restore(&mut levels, target, self.chunk_size);

        let mut close_err = None;
        for lvl in levels {
            if let Err(e) = lvl.close() {
                if close_err.is_none() {
                    close_err = Some(e);
                }
            }
        }
        result?;
        if let Some(e) = close_err {
            return Err(e);
        }
        Ok(())
    }

    fn run_restore<T: Target>(levels: &mut [Level], target: &mut T, chunk_size: u64) -> Result<()> {
        let logical_size = levels[0].size();
        let chunk_count = (logical_size + chunk_size - 1) / chunk_size;

        for chunk_id in 0..chunk_count {
            let level_index = levels
                .iter()
                .position(|lvl| lvl.has(chunk_id))
                .ok_or(Error::ChunkMissing(chunk_id))?;
            let data = levels[level_index].read(chunk_id, false)?;
            target.seek(SeekFrom::Start(chunk_id * chunk_size))?;
            target.write_all(&data)?;
        }
        Ok(())
    }

    /// Verify a level's chunks against their own stored checksums,
    /// invalidating any that fail.
    pub fn scrub(&self, level: Option<i64>) -> Result<u64> {
        self.check_level_exists(level)?;
        let (data_path, index_path) = self.level_path_pair(level);
        let mut lvl = Level::open(&data_path, &index_path, self.chunk_size)?;

        let result = Self::run_scrub(&mut lvl);

        let close_res = lvl.close();
        let checked = result?;
        close_res?;
        Ok(checked)
    }

    fn run_scrub(level: &mut Level) -> Result<u64> {
        let mut checked = 0u64;
        for chunk_id in level.chunk_ids() {
            match level.read(chunk_id, true) {
                Ok(_) => {}
                Err(Error::ChunkChecksumWrong(id)) => {
                    error!("scrub: checksum for chunk {} does not match", id);
                    level.invalidate_chunk(id);
                }
                Err(e) => return Err(e),
            }
            checked += 1;
        }
        info!("scrub completed, {} chunks checked", checked);
        Ok(checked)
    }

    /// Verify a level's chunks against both their own checksums and the
    /// corresponding bytes in `source`, sampling a `percentile` of chunks.
    pub fn deep_scrub<S: Source>(&self, source: &mut S, level: Option<i64>, percentile: u8) -> Result<u64> {
        self.check_level_exists(level)?;
        info!("performing deep scrub with {}% chunk checks", percentile);
        let (data_path, index_path) = self.level_path_pair(level);
        let mut lvl = Level::open(&data_path, &index_path, self.chunk_size)?;

        let result = Self::run_deep_scrub(&mut lvl, source, percentile);

        let close_res = lvl.close();
        let checked = result?;
        close_res?;
        Ok(checked)
    }

    fn run_deep_scrub<S: Source>(level: &mut Level, source: &mut S, percentile: u8) -> Result<u64> {
        let mut rng = rand::thread_rng();
        let mut checked = 0u64;

        for chunk_id in level.chunk_ids() {
            if percentile < 100 && rng.gen_range(1..=100) > percentile as u32 {
                continue;
            }
            match level.read(chunk_id, true) {
                Err(Error::ChunkChecksumWrong(id)) => {
                    error!("deep scrub: checksum for chunk {} does not match", id);
                    // Only a source mismatch below invalidates. See DESIGN.md.
                }
                Err(e) => return Err(e),
                Ok(backup_data) => {
                    // Reads the source at the chunk's *level* offset, not at
                    // chunk_id * chunk_size. See DESIGN.md.
                    let chunk = level.read_meta(chunk_id)?.clone();
                    source.seek(SeekFrom::Start(chunk.offset))?;
                    let mut source_data = vec![0u8; chunk.length as usize];
                    source.read_exact(&mut source_data)?;
                    if backup_data != source_data {
                        error!("deep scrub: source data for chunk {} does not match", chunk_id);
                        level.invalidate_chunk(chunk_id);
                    }
                }
            }
            checked += 1;
        }
        info!("deep scrub completed, {} chunks checked", checked);
        Ok(checked)
    }

    fn check_level_exists(&self, level: Option<i64>) -> Result<()> {
        if let Some(g) = level {
            if !self.existing_levels()?.contains(&g) {
                return Err(Error::LevelNotFound(g));
            }
        }
        Ok(())
    }
}
