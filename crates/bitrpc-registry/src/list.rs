use bitrpc_wire::{StreamReader, StreamWriter};

use crate::handler::TypeHandler;
use crate::hash::fnv1a_32;

/// `list<T>`: a `u32` element count followed by each element via `T`'s
/// handler. Default value is the empty list.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListHandler<H> {
    element: H,
}

impl<H> ListHandler<H> {
    pub fn new(element: H) -> Self {
        Self { element }
    }
}

impl<H: TypeHandler> TypeHandler for ListHandler<H> {
    type Value = Vec<H::Value>;
    type Error = H::Error;

    fn is_default(&self, value: &Self::Value) -> bool {
        value.is_empty()
    }

    fn write(&self, value: &Self::Value, writer: &mut StreamWriter) {
        writer.write_u32(value.len() as u32);
        for item in value {
            self.element.write(item, writer);
        }
    }

    fn read(&self, reader: &mut StreamReader) -> Result<Self::Value, Self::Error> {
        let count = reader.read_u32().map_err(Into::into)? as usize;
        let mut items = Vec::with_capacity(count.min(1 << 20));
        for _ in 0..count {
            items.push(self.element.read(reader)?);
        }
        Ok(items)
    }

    fn type_hash(&self) -> u32 {
        fnv1a_32(&format!("list<{:#010x}>", self.element.type_hash()))
    }
}
