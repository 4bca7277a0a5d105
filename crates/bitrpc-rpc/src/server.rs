use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio::task::JoinSet;

use crate::error::{RpcError, STATUS_HANDLER_ERROR, STATUS_OK, STATUS_OVERLOAD};
use crate::frame::{read_frame, write_frame, Frame, FrameKind};
use crate::router::{Invocation, Router};

/// Options governing a single server connection.
///
/// `max_frame_bytes` and `max_in_flight_per_conn` are enforced per
/// connection; `handler_timeout`, when set, bounds how long a single
/// handler invocation may run before its response is replaced with an
/// overload-style failure.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_frame_bytes: u32,
    pub max_in_flight_per_conn: usize,
    pub handler_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: 16 * 1024 * 1024,
            max_in_flight_per_conn: 1024,
            handler_timeout: None,
        }
    }
}

/// Serve one connection to completion.
///
/// Runs the read loop on the calling task: reads frames, spawns one task per
/// request so a slow handler never blocks subsequent requests on the same
/// connection (§4.5), and serializes writes to `writer` behind an async
/// mutex shared with every spawned handler task. Returns once the peer
/// closes the connection cleanly or a codec/framing error is encountered
/// (the peer is assumed malformed in the latter case, per §7).
///
/// Handler tasks are tracked in a [`JoinSet`] rather than spawned and
/// forgotten: a `JoinSet` aborts every task still in it when dropped, so
/// when this function returns — for any reason — every handler still
/// running for this connection is cancelled immediately rather than left to
/// finish and write a response through a write half nothing is reading from
/// anymore (§5: "Server handler tasks are cancelled when the connection
/// closes").
pub async fn serve_connection<R, W>(router: Arc<Router>, mut reader: R, writer: W, config: ServerConfig)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer = Arc::new(AsyncMutex::new(writer));
    let in_flight = Arc::new(Semaphore::new(config.max_in_flight_per_conn));
    let mut handlers: JoinSet<()> = JoinSet::new();

    loop {
        // Reap finished handler tasks opportunistically so `handlers` doesn't
        // grow without bound over a long-lived, high-throughput connection.
        while handlers.try_join_next().is_some() {}

        let frame = match read_frame(&mut reader, config.max_frame_bytes).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::info!("connection closed by peer");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "framing error, closing connection");
                return;
            }
        };

        if frame.kind != FrameKind::Request {
            tracing::error!("received a response-kind frame on a server connection, closing");
            return;
        }

        let Some(handler) = router.lookup(frame.method_id) else {
            tracing::warn!(method_id = frame.method_id, "unknown method");
            let response = Frame::response(frame.method_id, frame.correlation_id, crate::error::STATUS_UNKNOWN_METHOD, Vec::new());
            if write_frame(&mut *writer.lock().await, &response).await.is_err() {
                return;
            }
            continue;
        };

        let dispatched = match handler.dispatch(frame.payload) {
            Ok(fut) => fut,
            Err(e) => {
                tracing::error!(error = %e, "request payload failed to decode, closing connection");
                return;
            }
        };

        let Ok(permit) = in_flight.clone().try_acquire_owned() else {
            tracing::warn!(method_id = frame.method_id, "in-flight cap exceeded");
            let response = Frame::response(frame.method_id, frame.correlation_id, STATUS_OVERLOAD, Vec::new());
            if write_frame(&mut *writer.lock().await, &response).await.is_err() {
                return;
            }
            continue;
        };

        let writer = writer.clone();
        let method_id = frame.method_id;
        let correlation_id = frame.correlation_id;
        let handler_timeout = config.handler_timeout;

        handlers.spawn(async move {
            let _permit = permit;
            let invocation = match handler_timeout {
                Some(d) => match tokio::time::timeout(d, dispatched).await {
                    Ok(invocation) => invocation,
                    Err(_) => {
                        tracing::warn!(method_id, correlation_id, "handler timed out");
                        Invocation::HandlerFailed("handler timed out".to_string())
                    }
                },
                None => dispatched.await,
            };

            let response = match invocation {
                Invocation::Ok(payload) => Frame::response(method_id, correlation_id, STATUS_OK, payload),
                Invocation::HandlerFailed(msg) => {
                    tracing::warn!(method_id, correlation_id, error = %msg, "handler returned an error");
                    Frame::response(method_id, correlation_id, STATUS_HANDLER_ERROR, msg.into_bytes())
                }
            };

            let mut w = writer.lock().await;
            let _ = write_frame(&mut *w, &response).await;
        });
    }
}
