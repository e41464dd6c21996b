use thiserror::Error;

/// Domain-level failures raised by the chunk store.
///
/// `ChunkNotFound` is also used internally as a recoverable signal (backup
/// eviction, restore walk) via plain `Option`/`Index::has` checks - it only
/// crosses this boundary on the public `Level::read`/`Level::read_meta` API.
#[derive(Error, Debug)]
pub enum Error {
    #[error("backup name '{0}' contains a reserved substring ('.data.' or '.index.')")]
    ReservedNameInBackupName(String),

    #[error("hint range (offset {offset}, length {length}) extends past source size {size}")]
    HintsOutOfRange { offset: u64, length: u64, size: u64 },

    #[error("cannot shrink level size from {current} to {requested}")]
    ShrinkUnsupported { current: u64, requested: u64 },

    #[error("chunk data of {len} bytes exceeds chunk size {chunk_size}")]
    ChunkTooLarge { len: usize, chunk_size: u64 },

    #[error("chunk {0} not found")]
    ChunkNotFound(u64),

    #[error("checksum for chunk {0} does not match")]
    ChunkChecksumWrong(u64),

    #[error("chunk {0} not found in any level")]
    ChunkMissing(u64),

    #[error("level {0} not found")]
    LevelNotFound(i64),

    #[error("unexpected EOF reading source at chunk {0}")]
    UnexpectedEOF(u64),

    #[error("malformed index: {0}")]
    Index(String),

    #[error("malformed hint document: {0}")]
    HintDocument(String),

    #[error("malformed configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
