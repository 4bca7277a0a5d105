use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::RpcError;

/// Bytes of frame header following `total_length`: kind(1) + method_id(4) +
/// correlation_id(8) + status(2).
const HEADER_TAIL_LEN: usize = 1 + 4 + 8 + 2;

/// `kind` byte of a [`Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Request,
    Response,
}

impl FrameKind {
    fn to_u8(self) -> u8 {
        match self {
            FrameKind::Request => 0,
            FrameKind::Response => 1,
        }
    }

    fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(FrameKind::Request),
            1 => Some(FrameKind::Response),
            _ => None,
        }
    }
}

/// One frame on the wire: `[u32 total_length][u8 kind][u32 method_id][u64 correlation_id][u16 status][bytes payload]`.
///
/// `total_length` covers everything after itself, through `payload`; it is
/// never stored on `Frame` since it's fully determined by `payload.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub method_id: u32,
    pub correlation_id: u64,
    pub status: u16,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn request(method_id: u32, correlation_id: u64, payload: Vec<u8>) -> Self {
        Self {
            kind: FrameKind::Request,
            method_id,
            correlation_id,
            status: 0,
            payload,
        }
    }

    pub fn response(method_id: u32, correlation_id: u64, status: u16, payload: Vec<u8>) -> Self {
        Self {
            kind: FrameKind::Response,
            method_id,
            correlation_id,
            status,
            payload,
        }
    }
}

/// Write one frame, holding the caller's write lock across the whole call so
/// a frame's bytes are never interleaved with another writer's.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &Frame,
) -> Result<(), RpcError> {
    let total_length = (HEADER_TAIL_LEN + frame.payload.len()) as u32;

    let mut header = Vec::with_capacity(4 + HEADER_TAIL_LEN);
    header.extend_from_slice(&total_length.to_le_bytes());
    header.push(frame.kind.to_u8());
    header.extend_from_slice(&frame.method_id.to_le_bytes());
    header.extend_from_slice(&frame.correlation_id.to_le_bytes());
    header.extend_from_slice(&frame.status.to_le_bytes());

    writer.write_all(&header).await.map_err(RpcError::Io)?;
    if !frame.payload.is_empty() {
        writer.write_all(&frame.payload).await.map_err(RpcError::Io)?;
    }
    writer.flush().await.map_err(RpcError::Io)?;
    Ok(())
}

/// Read one frame, rejecting any frame whose declared payload size exceeds
/// `max_frame_bytes` *before* allocating a buffer for it — a malicious or
/// buggy peer can put an arbitrary `u32` in `total_length`, so the cap must
/// be checked ahead of the `vec![0u8; total_length]` allocation and the
/// `read_exact` that would otherwise follow it unconditionally.
///
/// Returns `Ok(None)` on a clean EOF before any bytes of the next frame are
/// read (graceful connection close); any other truncation is a
/// malformed-peer error.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_frame_bytes: u32,
) -> Result<Option<Frame>, RpcError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(RpcError::Io(e)),
    }
    let total_length = u32::from_le_bytes(len_buf) as usize;

    if total_length < HEADER_TAIL_LEN {
        return Err(RpcError::MalformedFrame {
            reason: format!(
                "total_length {total_length} is shorter than the fixed header tail ({HEADER_TAIL_LEN})"
            ),
        });
    }

    let declared_payload_len = total_length - HEADER_TAIL_LEN;
    if declared_payload_len as u32 > max_frame_bytes {
        return Err(RpcError::FrameTooLarge {
            declared: declared_payload_len,
            max: max_frame_bytes as usize,
        });
    }

    let mut tail = vec![0u8; total_length];
    reader
        .read_exact(&mut tail)
        .await
        .map_err(RpcError::Io)?;

    let kind = FrameKind::from_u8(tail[0]).ok_or_else(|| RpcError::MalformedFrame {
        reason: format!("unknown frame kind byte {:#04x}", tail[0]),
    })?;
    let method_id = u32::from_le_bytes(tail[1..5].try_into().unwrap());
    let correlation_id = u64::from_le_bytes(tail[5..13].try_into().unwrap());
    let status = u16::from_le_bytes(tail[13..15].try_into().unwrap());
    let payload = tail[HEADER_TAIL_LEN..].to_vec();

    Ok(Some(Frame {
        kind,
        method_id,
        correlation_id,
        status,
        payload,
    }))
}
