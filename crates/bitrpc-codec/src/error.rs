use std::fmt;

use bitrpc_wire::WireError;

/// Errors from encoding or decoding a single message.
///
/// All variants are fatal for the frame that produced them: the dispatch
/// layer closes the connection rather than attempting to resynchronize,
/// since a malformed field boundary leaves no reliable place to resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Propagated unchanged from the stream buffer layer.
    Wire(WireError),
    /// A presence bit was set for a field id the schema doesn't have.
    UnknownField { field_id: usize },
    /// The peer's mask word count doesn't match what this schema expects.
    SchemaMismatch {
        expected_words: usize,
        actual_words: usize,
    },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Wire(e) => write!(f, "{e}"),
            CodecError::UnknownField { field_id } => {
                write!(f, "unknown field id {field_id} set in presence mask")
            }
            CodecError::SchemaMismatch {
                expected_words,
                actual_words,
            } => write!(
                f,
                "mask word count mismatch: schema expects {expected_words}, peer sent {actual_words}"
            ),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<WireError> for CodecError {
    fn from(e: WireError) -> Self {
        CodecError::Wire(e)
    }
}
