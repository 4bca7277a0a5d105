//! Bit-mask-presence RPC.
//!
//! A schema-driven RPC system whose wire codec transmits only the fields of
//! a message that differ from their type's default, prefixed by a compact
//! presence bitmask. This crate re-exports the per-layer crates
//! (`bitrpc-wire`, `bitrpc-mask`, `bitrpc-registry`, `bitrpc-codec`,
//! `bitrpc-rpc`) for consumers who'd rather depend on one crate than five.
//! Generated per-message code depends on [`codec`] and [`registry`]
//! directly; application code wiring up a client or server depends on
//! [`rpc`].

pub use bitrpc_codec as codec;
pub use bitrpc_mask as mask;
pub use bitrpc_registry as registry;
pub use bitrpc_rpc as rpc;
pub use bitrpc_wire as wire;

pub use bitrpc_codec::{CodecError, FieldDescriptor, FieldType, Message, MessageHandler, MessageSchema};
pub use bitrpc_mask::{BitMask, BitMaskPool, PooledMask};
pub use bitrpc_registry::TypeHandler;
pub use bitrpc_rpc::{Client, ClientConfig, Router, RpcError, ServerConfig};
pub use bitrpc_wire::{StreamReader, StreamWriter, WireError};
