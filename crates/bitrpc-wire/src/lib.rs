//! Little-endian stream buffer primitives: the leaf layer of the BitRPC wire
//! codec. Everything above this crate (mask, registry, message codec, RPC
//! framing) is built out of [`StreamWriter`]/[`StreamReader`].

mod error;
mod reader;
mod writer;

pub use error::WireError;
pub use reader::StreamReader;
pub use writer::StreamWriter;
