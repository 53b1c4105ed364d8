use thiserror::Error;

/// Everything that can go wrong while reading or writing a PSD / PSB file.
///
/// The set is closed on purpose: callers match on it to decide whether a
/// failure is recoverable (an unknown tagged block, a single corrupt channel)
/// or fatal (a bad signature, a truncated stream).
#[derive(Debug, Error)]
pub enum PsdError {
    /// A four byte magic value did not match what the format requires at
    /// that offset.
    #[error("invalid signature: expected one of {expected:?}, found {found:?}")]
    InvalidSignature {
        /// The signatures that would have been accepted
        expected: &'static [&'static str],
        /// The four bytes actually present
        found: [u8; 4],
    },

    /// The header version was neither 1 (psd) nor 2 (psb).
    #[error("unsupported file version {version}, must be 1 (psd) or 2 (psb)")]
    UnsupportedVersion {
        /// The version value read from the header
        version: u16,
    },

    /// A dimension or count is outside the documented limits.
    #[error("{what} out of bounds: {value} (allowed {min}..={max})")]
    BoundsViolation {
        /// What was being validated
        what: &'static str,
        /// The offending value
        value: i64,
        /// Inclusive lower bound
        min: i64,
        /// Inclusive upper bound
        max: i64,
    },

    /// A scoped length block measured more bytes than its width can encode.
    #[error("section of {size} bytes overflows a {width}-bit length field")]
    OverflowingLength {
        /// The measured, padded byte count
        size: u64,
        /// The width of the length field in bits
        width: u8,
    },

    /// A writer was asked to pad backwards or an alignment could not be met.
    #[error("padding violation: {0}")]
    PaddingViolation(String),

    /// A string was not valid UTF-8 / UTF-16.
    #[error("invalid string encoding: {0}")]
    InvalidEncoding(String),

    /// A descriptor contained an OS type key that was not recognized and no
    /// known key could be found within the scan window.
    #[error("corrupt descriptor: {0}")]
    CorruptDescriptor(String),

    /// A tagged block key was not recognized. Only surfaced in strict mode,
    /// otherwise unknown blocks are preserved verbatim.
    #[error("unknown tagged block key {key:?}")]
    UnknownTaggedBlock {
        /// The four character code of the block
        key: [u8; 4],
    },

    /// A channel failed to compress or decompress. Sibling channels in the
    /// same layer are unaffected.
    #[error("channel compression error: {0}")]
    CompressionError(String),

    /// A smart object layer references a UUID that has no entry in the
    /// linked layer store.
    #[error("smart object references missing linked layer {uuid}")]
    MissingLinkedLayer {
        /// The dangling UUID
        uuid: String,
    },

    /// An underlying I/O operation failed.
    #[error("io error: {0}")]
    IoError(std::io::Error),

    /// The stream ended before a read could complete.
    #[error("unexpected end of file")]
    UnexpectedEof,

    /// The progress callback asked for the operation to stop.
    #[error("operation cancelled")]
    Cancelled,
}

impl From<std::io::Error> for PsdError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            PsdError::UnexpectedEof
        } else {
            PsdError::IoError(err)
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PsdError>;
