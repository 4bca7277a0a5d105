use std::hash::Hash;

use bitrpc_wire::{StreamReader, StreamWriter};
use indexmap::IndexMap;

use crate::handler::TypeHandler;
use crate::hash::fnv1a_32;

/// `map<K,V>`: a `u32` entry count followed by alternating key/value pairs.
/// Entries are written in insertion order and read back preserving that
/// order, so round-tripping a map is byte-identical regardless of `K`'s
/// native hash order. Default value is the empty map.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapHandler<KH, VH> {
    key: KH,
    value: VH,
}

impl<KH, VH> MapHandler<KH, VH> {
    pub fn new(key: KH, value: VH) -> Self {
        Self { key, value }
    }
}

impl<KH, VH> TypeHandler for MapHandler<KH, VH>
where
    KH: TypeHandler,
    KH::Value: Eq + Hash,
    VH: TypeHandler<Error = KH::Error>,
{
    type Value = IndexMap<KH::Value, VH::Value>;
    type Error = KH::Error;

    fn is_default(&self, value: &Self::Value) -> bool {
        value.is_empty()
    }

    fn write(&self, value: &Self::Value, writer: &mut StreamWriter) {
        writer.write_u32(value.len() as u32);
        for (k, v) in value {
            self.key.write(k, writer);
            self.value.write(v, writer);
        }
    }

    fn read(&self, reader: &mut StreamReader) -> Result<Self::Value, Self::Error> {
        let count = reader.read_u32().map_err(Into::into)? as usize;
        let mut map = IndexMap::with_capacity(count.min(1 << 20));
        for _ in 0..count {
            let k = self.key.read(reader)?;
            let v = self.value.read(reader)?;
            map.insert(k, v);
        }
        Ok(map)
    }

    fn type_hash(&self) -> u32 {
        fnv1a_32(&format!(
            "map<{:#010x},{:#010x}>",
            self.key.type_hash(),
            self.value.type_hash()
        ))
    }
}
