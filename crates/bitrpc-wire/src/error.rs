use std::fmt;

/// Errors raised while reading from a [`crate::StreamReader`].
///
/// These map directly onto the stream-layer failures in the wire spec: a
/// reader either runs out of bytes, finds text that isn't UTF-8, or finds a
/// length prefix that would read past the frame it was handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Fewer bytes remained than the field being read requires.
    Truncated {
        /// Bytes required to satisfy the read.
        needed: usize,
        /// Bytes actually remaining.
        available: usize,
    },
    /// A length-prefixed text field was not valid UTF-8.
    InvalidUtf8,
    /// A length-prefixed blob's length would read past the frame boundary.
    LengthExceedsFrame {
        /// The length the prefix declared.
        declared: usize,
        /// Bytes actually remaining in the frame.
        available: usize,
    },
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Truncated { needed, available } => write!(
                f,
                "truncated stream: needed {needed} bytes, {available} available"
            ),
            WireError::InvalidUtf8 => write!(f, "invalid UTF-8 in text field"),
            WireError::LengthExceedsFrame { declared, available } => write!(
                f,
                "length prefix {declared} exceeds {available} bytes remaining in frame"
            ),
        }
    }
}

impl std::error::Error for WireError {}
