//! Type handlers and the global type-tag registry for the BitRPC message
//! codec: scalar handlers, parameterized `list<T>`/`map<K,V>` handlers, and
//! the FNV-1a type-hash helper used to key and cross-check them.
//!
//! Dispatch is static: a handler is a zero-sized (or small) value implementing
//! [`TypeHandler`], selected at compile time through generics, not looked up
//! by tag at runtime. [`TagRegistry`] exists only to catch two schema
//! versions disagreeing about what a tag means.

mod error;
mod handler;
mod hash;
mod list;
mod map;
mod tag;

pub use error::RegistryError;
pub use handler::{
    BoolHandler, BytesHandler, F32Handler, F64Handler, I32Handler, I64Handler, StringHandler,
    TimestampHandler, TypeHandler,
};
pub use hash::fnv1a_32;
pub use list::ListHandler;
pub use map::MapHandler;
pub use tag::TagRegistry;
