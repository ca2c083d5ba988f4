use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Header missing or unparseable, rank inconsistency, or unknown
    /// compressor id at open time.
    #[error("failed to open array at '{key}': {reason}")]
    OpenFailed { key: String, reason: String },

    /// A region offset/shape exceeds the array bounds, or a rank mismatch
    /// between a call and the array.
    #[error("region out of range: {reason}")]
    OutOfRange { reason: String },

    /// Caller buffer length or element dtype does not match the requested
    /// region.
    #[error("buffer mismatch: {reason}")]
    BufferMismatch { reason: String },

    /// A decompressed chunk's size did not match the expected chunk byte
    /// size.
    #[error("corrupt chunk at key '{key}': {reason}")]
    CorruptChunk { key: String, reason: String },

    /// A failure from the underlying key-value store.
    #[error("store error for key '{key}': {source}")]
    StoreError {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn open_failed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::OpenFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn out_of_range(reason: impl Into<String>) -> Self {
        Error::OutOfRange {
            reason: reason.into(),
        }
    }

    pub fn buffer_mismatch(reason: impl Into<String>) -> Self {
        Error::BufferMismatch {
            reason: reason.into(),
        }
    }

    pub fn corrupt_chunk(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::CorruptChunk {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn store(key: impl Into<String>, source: std::io::Error) -> Self {
        Error::StoreError {
            key: key.into(),
            source,
        }
    }
}
