use std::io;
use thiserror::Error;

/// Errors raised while decoding or encoding a sampler file.
///
/// Structural errors are fatal for the file being processed. Checksum
/// mismatches never show up here; they are reported through the
/// [`Notifier`](crate::notify::Notifier) instead.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Truncated input: needed {needed} bytes at offset {offset} but only {available} available")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Chunk size mismatch in '{tag}': declared {declared} bytes, found {actual}")]
    ChunkSizeMismatch {
        tag: String,
        declared: u64,
        actual: u64,
    },

    #[error("Chunk '{tag}' is {length} bytes long but at least {minimum} are required")]
    ChunkTooShort {
        tag: String,
        length: usize,
        minimum: usize,
    },

    #[error("Unexpected tag: expected '{expected}' but found '{found}'")]
    UnexpectedTag { expected: String, found: String },

    #[error("Unsupported {what} version 0x{found:X} (maximum supported is 0x{max:X})")]
    UnsupportedVersion {
        what: &'static str,
        found: u32,
        max: u32,
    },

    #[error("Decompressed size mismatch: expected {expected} bytes, produced {actual}")]
    DecompressionSizeMismatch { expected: usize, actual: usize },

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Found {found} embedded samples but the dictionary names {expected}")]
    SampleCountMismatch { expected: usize, found: usize },

    #[error("Unresolved {what} reference: index {index} but only {available} available")]
    UnresolvedReference {
        what: &'static str,
        index: usize,
        available: usize,
    },

    #[error("Invalid key range: low_key ({0}) must be <= high_key ({1})")]
    InvalidKeyRange(u8, u8),

    #[error("Invalid velocity range: low_vel ({0}) must be <= high_vel ({1})")]
    InvalidVelocityRange(u8, u8),

    #[error("Invalid value {1} for parameter '{0}'")]
    InvalidParameterValue(String, i32),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Unknown file format")]
    UnknownFormat,
}

pub type Result<T> = std::result::Result<T, FormatError>;

impl From<binrw::Error> for FormatError {
    fn from(err: binrw::Error) -> Self {
        match err {
            binrw::Error::Io(err) => FormatError::Io(err),
            binrw::Error::BadMagic { found, .. } => FormatError::UnexpectedTag {
                expected: "magic".to_string(),
                found: format!("{found:?}"),
            },
            other => FormatError::InvalidData(other.to_string()),
        }
    }
}

/// Renders a tag for error messages, replacing non-printable bytes.
pub(crate) fn tag_name(tag: &[u8]) -> String {
    tag.iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
        .collect()
}
