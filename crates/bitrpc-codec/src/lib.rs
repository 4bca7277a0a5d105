//! Message schema model and presence-mask codec (§4.4 of the wire protocol):
//! the layer that ties [`bitrpc_mask`] and [`bitrpc_registry`] together into
//! the per-message-type write/read algorithm generated code implements
//! against.

mod error;
mod message;
mod schema;

pub use error::CodecError;
pub use message::{Message, MessageHandler};
pub use schema::{FieldDescriptor, FieldType, MessageSchema, SchemaError, SchemaRegistry};
