use std::fmt;

/// Errors from the global type-tag registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A tag was registered twice with handlers whose `type_hash` disagree.
    DuplicateTag {
        tag: String,
        existing_hash: u32,
        new_hash: u32,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateTag {
                tag,
                existing_hash,
                new_hash,
            } => write!(
                f,
                "type tag {tag:?} already registered with hash {existing_hash:#010x}, \
                 cannot re-register with differing hash {new_hash:#010x}"
            ),
        }
    }
}

impl std::error::Error for RegistryError {}
