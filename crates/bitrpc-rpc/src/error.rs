use std::fmt;

use bitrpc_codec::CodecError;

/// Wire-level status codes carried in response frames (§7).
pub const STATUS_OK: u16 = 0;
pub const STATUS_UNKNOWN_METHOD: u16 = 1;
pub const STATUS_HANDLER_ERROR: u16 = 2;
pub const STATUS_OVERLOAD: u16 = 3;

/// Frame size cap used when a caller doesn't supply its own, e.g. a
/// `Client` with no server-side `ServerConfig` to inherit one from.
/// Matches `ServerConfig::default().max_frame_bytes` (SPEC_FULL.md §3.3).
pub const DEFAULT_MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// Errors from the RPC framing and dispatch layer.
#[derive(Debug)]
pub enum RpcError {
    /// Transport I/O failure. Fatal for the connection.
    Io(std::io::Error),
    /// A request or response payload failed to decode. Fatal for the
    /// connection: the peer is assumed malformed, per policy in §7.
    Codec(CodecError),
    /// A frame's header was structurally invalid (bad kind byte, impossible
    /// `total_length`). Fatal for the connection.
    MalformedFrame { reason: String },
    /// A frame's declared payload size exceeds the configured
    /// `max_frame_bytes`. Rejected before the payload is read off the wire,
    /// so the connection is assumed malformed and closed.
    FrameTooLarge { declared: usize, max: usize },
    /// `method_id` has no registered handler. Delivered to the client as a
    /// `status = 1` response; the connection stays open.
    UnknownMethod(u32),
    /// The handler returned an application-level error. Delivered as a
    /// `status = 2` response; the connection stays open.
    HandlerError(String),
    /// The in-flight cap for a connection was exceeded. Delivered as a
    /// `status = 3` response; the client may retry.
    Overload,
    /// The call's deadline expired before a response arrived. The
    /// correlation id remains reserved; a late response is dropped.
    Timeout,
    /// The transport closed while this call was pending.
    ConnectionLost,
}

impl RpcError {
    /// The wire `status` code this error maps to, if it's one that's
    /// delivered as an ordinary response rather than closing the connection.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RpcError::UnknownMethod(_) => Some(STATUS_UNKNOWN_METHOD),
            RpcError::HandlerError(_) => Some(STATUS_HANDLER_ERROR),
            RpcError::Overload => Some(STATUS_OVERLOAD),
            _ => None,
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::Io(e) => write!(f, "transport I/O error: {e}"),
            RpcError::Codec(e) => write!(f, "codec error: {e}"),
            RpcError::MalformedFrame { reason } => write!(f, "malformed frame: {reason}"),
            RpcError::FrameTooLarge { declared, max } => {
                write!(f, "frame payload of {declared} bytes exceeds max_frame_bytes ({max})")
            }
            RpcError::UnknownMethod(id) => write!(f, "unknown method id {id}"),
            RpcError::HandlerError(msg) => write!(f, "handler error: {msg}"),
            RpcError::Overload => write!(f, "connection is over its in-flight call limit"),
            RpcError::Timeout => write!(f, "call deadline expired"),
            RpcError::ConnectionLost => write!(f, "connection lost while call was pending"),
        }
    }
}

impl std::error::Error for RpcError {}

impl From<std::io::Error> for RpcError {
    fn from(e: std::io::Error) -> Self {
        RpcError::Io(e)
    }
}

impl From<CodecError> for RpcError {
    fn from(e: CodecError) -> Self {
        RpcError::Codec(e)
    }
}
