use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::error::RegistryError;

/// Process-wide registry of type tags to their handler's `type_hash`.
///
/// Generated code calls [`register`] once per message type (and once per
/// scalar/compound type it names) during process init, before any codec
/// traffic flows. The registry only tracks tag -> hash pairs for uniqueness
/// and fingerprint cross-checks; actual dispatch is static, via Rust generics
/// monomorphized over each message/handler type, not a runtime lookup table
/// of type-erased handlers.
pub struct TagRegistry {
    tags: RwLock<HashMap<String, u32>>,
}

impl TagRegistry {
    fn new() -> Self {
        Self {
            tags: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static TagRegistry {
        static GLOBAL: OnceLock<TagRegistry> = OnceLock::new();
        GLOBAL.get_or_init(TagRegistry::new)
    }

    /// Register `tag` as naming a type whose handler hashes to `type_hash`.
    ///
    /// Idempotent: registering the same tag with the same hash again is a
    /// no-op. Registering the same tag with a different hash is an error —
    /// this normally means two schema versions disagree about what a tag
    /// means.
    pub fn register(&self, tag: &str, type_hash: u32) -> Result<(), RegistryError> {
        let mut tags = self.tags.write();
        match tags.get(tag) {
            Some(&existing) if existing == type_hash => Ok(()),
            Some(&existing) => Err(RegistryError::DuplicateTag {
                tag: tag.to_string(),
                existing_hash: existing,
                new_hash: type_hash,
            }),
            None => {
                tracing::debug!(tag, type_hash = format!("{type_hash:#010x}"), "type tag registered");
                tags.insert(tag.to_string(), type_hash);
                Ok(())
            }
        }
    }

    /// The hash a tag was registered under, if any.
    pub fn lookup(&self, tag: &str) -> Option<u32> {
        self.tags.read().get(tag).copied()
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}
