//! Length-prefixed frame transport, method dispatch, and client/server
//! runtime (§4.5, §5): the layer that turns a byte stream plus a
//! [`bitrpc_codec::Message`]-based request/response pair into a
//! correlated, concurrent RPC call.

mod client;
mod error;
mod frame;
mod registry;
mod router;
mod server;

pub use client::{Client, ClientConfig};
pub use error::{
    RpcError, DEFAULT_MAX_FRAME_BYTES, STATUS_HANDLER_ERROR, STATUS_OK, STATUS_OVERLOAD,
    STATUS_UNKNOWN_METHOD,
};
pub use frame::{read_frame, write_frame, Frame, FrameKind};
pub use registry::{MethodInfo, ServiceInfo, ServiceRegistry, ServiceRegistryError};
pub use router::{BoxFuture, Invocation, MethodHandler, Router, RouterError};
pub use server::{serve_connection, ServerConfig};
