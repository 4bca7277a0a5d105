use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{oneshot, Mutex as AsyncMutex};

use bitrpc_codec::{CodecError, Message};

use crate::error::{RpcError, DEFAULT_MAX_FRAME_BYTES};
use crate::frame::{read_frame, write_frame, Frame};

/// Options governing a client's calls.
///
/// `max_in_flight` bounds the number of concurrently pending calls; a call
/// started past that limit waits for a slot to free up rather than failing
/// (unlike the server's `Overload`, which rejects immediately — the client
/// controls its own offered load and can afford to queue locally).
/// `max_frame_bytes` bounds the size of a *response* frame this client will
/// accept: without it, a malicious or buggy server could put an arbitrary
/// `u32` in a frame's `total_length` and force the client to allocate and
/// read that much before anything else is checked.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connect_timeout: Duration,
    pub call_timeout_default: Duration,
    pub max_in_flight: usize,
    pub max_frame_bytes: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            call_timeout_default: Duration::from_secs(30),
            max_in_flight: 4096,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// One call awaiting its matching response.
struct PendingCall {
    tx: oneshot::Sender<Result<Frame, RpcError>>,
}

struct ClientState {
    next_correlation_id: AtomicU64,
    pending: Mutex<HashMap<u64, PendingCall>>,
}

/// A connection to one BitRPC server.
///
/// Spawns a single reader task that demultiplexes responses by correlation
/// id (§4.5); [`Self::call`] assigns the next id, registers a oneshot
/// waiter, writes the request frame under the shared write lock, and awaits
/// the waiter — possibly racing a deadline. On connection loss every
/// still-pending call is failed with [`RpcError::ConnectionLost`].
pub struct Client {
    state: Arc<ClientState>,
    writer: Arc<AsyncMutex<dyn AsyncWrite + Unpin + Send>>,
    config: ClientConfig,
    in_flight: Arc<tokio::sync::Semaphore>,
}

impl Client {
    /// Spawn a client bound to an already-connected stream's read/write
    /// halves. The reader task runs for the lifetime of the returned
    /// `Client` (and a little beyond, until it observes EOF or an error).
    pub fn new<R, W>(reader: R, writer: W, config: ClientConfig) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let state = Arc::new(ClientState {
            next_correlation_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        });

        let reader_state = state.clone();
        let max_frame_bytes = config.max_frame_bytes;
        tokio::spawn(async move {
            Self::read_loop(reader_state, reader, max_frame_bytes).await;
        });

        Self {
            state,
            writer: Arc::new(AsyncMutex::new(writer)),
            in_flight: Arc::new(tokio::sync::Semaphore::new(config.max_in_flight)),
            config,
        }
    }

    async fn read_loop<R: AsyncRead + Unpin>(state: Arc<ClientState>, mut reader: R, max_frame_bytes: u32) {
        loop {
            match read_frame(&mut reader, max_frame_bytes).await {
                Ok(Some(frame)) => {
                    let pending = state.pending.lock().remove(&frame.correlation_id);
                    match pending {
                        Some(call) => {
                            // A dropped receiver (the caller timed out) means
                            // the send is simply discarded: late responses
                            // are dropped, per §5 cancellation semantics.
                            let _ = call.tx.send(Ok(frame));
                        }
                        None => {
                            tracing::debug!(
                                correlation_id = frame.correlation_id,
                                "response for unknown or already-completed correlation id, dropping"
                            );
                        }
                    }
                }
                Ok(None) => {
                    tracing::info!("server closed the connection");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "framing error reading responses, closing connection");
                    break;
                }
            }
        }

        let mut pending = state.pending.lock();
        for (_, call) in pending.drain() {
            let _ = call.tx.send(Err(RpcError::ConnectionLost));
        }
    }

    /// Call `method_id` with `request`, using this client's default
    /// deadline. Decodes the response as `Resp` on success.
    pub async fn call<Req, Resp>(&self, method_id: u32, request: Req) -> Result<Resp, RpcError>
    where
        Req: Message,
        Resp: Message,
    {
        self.call_with_timeout(method_id, request, self.config.call_timeout_default)
            .await
    }

    /// Like [`Self::call`] but with an explicit per-call deadline.
    pub async fn call_with_timeout<Req, Resp>(
        &self,
        method_id: u32,
        request: Req,
        timeout: Duration,
    ) -> Result<Resp, RpcError>
    where
        Req: Message,
        Resp: Message,
    {
        let _permit = self
            .in_flight
            .acquire()
            .await
            .expect("in-flight semaphore is never closed");

        let correlation_id = self.state.next_correlation_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.state
            .pending
            .lock()
            .insert(correlation_id, PendingCall { tx });

        let payload = request.encode();
        let frame = Frame::request(method_id, correlation_id, payload);

        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = write_frame(&mut *writer, &frame).await {
                self.state.pending.lock().remove(&correlation_id);
                return Err(e);
            }
        }

        tracing::debug!(method_id, correlation_id, "call dispatched");

        let outcome = tokio::time::timeout(timeout, rx).await;
        match outcome {
            // The correlation id stays in `state.pending`'s removal path:
            // the reader task is the only place entries are ever removed
            // once inserted, so a timed-out call's id remains reserved
            // until a late response arrives (and is dropped, since `rx` is
            // gone) or the connection closes.
            Err(_) => {
                tracing::warn!(method_id, correlation_id, "call timed out");
                Err(RpcError::Timeout)
            }
            Ok(Err(_)) => Err(RpcError::ConnectionLost),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Ok(Ok(frame))) => {
                decode_response::<Resp>(method_id, correlation_id, frame)
            }
        }
    }

    /// Number of calls currently awaiting a response.
    pub fn pending_call_count(&self) -> usize {
        self.state.pending.lock().len()
    }
}

fn decode_response<Resp: Message>(
    method_id: u32,
    correlation_id: u64,
    frame: Frame,
) -> Result<Resp, RpcError> {
    match frame.status {
        crate::error::STATUS_OK => Resp::decode(&frame.payload)
            .map_err(RpcError::Codec)
            .inspect(|_| tracing::debug!(method_id, correlation_id, "call completed")),
        crate::error::STATUS_UNKNOWN_METHOD => Err(RpcError::UnknownMethod(method_id)),
        crate::error::STATUS_HANDLER_ERROR => {
            let msg = String::from_utf8_lossy(&frame.payload).into_owned();
            Err(RpcError::HandlerError(msg))
        }
        crate::error::STATUS_OVERLOAD => Err(RpcError::Overload),
        other => Err(RpcError::MalformedFrame {
            reason: format!("response carried unrecognized status code {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitrpc_codec::{FieldDescriptor, FieldType};
    use bitrpc_mask::BitMask;
    use bitrpc_registry::{I64Handler, TypeHandler};
    use bitrpc_wire::{StreamReader, StreamWriter};
    use std::sync::OnceLock;

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    struct Nonce {
        value: u64,
    }

    impl Message for Nonce {
        const TYPE_TAG: &'static str = "bitrpc.test.client.Nonce";
        const FIELD_COUNT: usize = 1;

        fn field_descriptors() -> &'static [FieldDescriptor] {
            static FIELDS: OnceLock<Vec<FieldDescriptor>> = OnceLock::new();
            FIELDS.get_or_init(|| vec![FieldDescriptor::new(1, "value", FieldType::I64)])
        }

        fn compute_presence(&self, mask: &mut BitMask) {
            mask.set(0, self.value != 0);
        }

        fn write_present(&self, mask: &BitMask, writer: &mut StreamWriter) {
            if mask.get(0) {
                I64Handler.write(&(self.value as i64), writer);
            }
        }

        fn read_present(mask: &BitMask, reader: &mut StreamReader) -> Result<Self, CodecError> {
            let mut value = Self::default();
            if mask.get(0) {
                value.value = I64Handler.read(reader)? as u64;
            }
            Ok(value)
        }
    }


    #[tokio::test]
    async fn timeout_fires_when_no_response_arrives() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        // The server side is held open but never driven, so the request is
        // accepted by the transport yet no response ever comes back.
        let _keep_server_open = server_io;
        let (client_reader, client_writer) = tokio::io::split(client_io);
        let client = Client::new(client_reader, client_writer, ClientConfig::default());

        let err = client
            .call_with_timeout::<Nonce, Nonce>(1, Nonce::default(), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Timeout));
    }

    #[tokio::test]
    async fn connection_loss_fails_all_pending_calls() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let (client_reader, client_writer) = tokio::io::split(client_io);
        let client = Arc::new(Client::new(client_reader, client_writer, ClientConfig::default()));

        let mut calls = Vec::new();
        for _ in 0..10 {
            let c = client.clone();
            calls.push(tokio::spawn(async move {
                c.call::<Nonce, Nonce>(1, Nonce::default()).await
            }));
        }

        // Give the calls a moment to register as pending, then drop the
        // server side entirely so the reader task observes a clean EOF.
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(server_io);

        for call in calls {
            let result = call.await.unwrap();
            assert!(matches!(result, Err(RpcError::ConnectionLost)));
        }
    }
}
