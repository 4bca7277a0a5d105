use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bitrpc_codec::{CodecError, Message};

/// A future boxed for storage behind a trait object.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of a successful handler invocation (decode succeeded).
pub enum Invocation {
    /// The handler ran and produced a response payload; send it back with
    /// `status = 0`.
    Ok(Vec<u8>),
    /// The handler returned an application-level error; send it back with
    /// `status = 2` and this message as the payload.
    HandlerFailed(String),
}

/// One registered method: decode the request, invoke the application
/// handler, encode the response.
///
/// Codec operations don't suspend (§5): [`Self::dispatch`] decodes the
/// request payload synchronously and returns eagerly with `Err(CodecError)`
/// on a decode failure — the dispatch layer treats that as fatal for the
/// connection (§7), so it must be observable before a handler task is ever
/// spawned. On success it returns a future that runs the application handler
/// and encodes its response; that future is what gets spawned, so a slow
/// handler never blocks the read loop.
pub trait MethodHandler: Send + Sync {
    fn dispatch(&self, payload: Vec<u8>) -> Result<BoxFuture<'static, Invocation>, CodecError>;

    /// Convenience wrapper combining [`Self::dispatch`]'s synchronous decode
    /// step with awaiting the resulting future, for callers that don't need
    /// to observe the two steps separately (e.g. tests).
    fn invoke(&self, payload: Vec<u8>) -> BoxFuture<'static, Result<Invocation, CodecError>> {
        match self.dispatch(payload) {
            Ok(fut) => Box::pin(async move { Ok(fut.await) }),
            Err(e) => Box::pin(async move { Err(e) }),
        }
    }
}

/// Adapts a typed `async fn(Req) -> Result<Resp, String>` to [`MethodHandler`].
struct TypedHandler<Req, Resp, F> {
    func: F,
    _marker: std::marker::PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp, F, Fut> MethodHandler for TypedHandler<Req, Resp, F>
where
    Req: Message + Send + 'static,
    Resp: Message + Send + 'static,
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, String>> + Send + 'static,
{
    fn dispatch(&self, payload: Vec<u8>) -> Result<BoxFuture<'static, Invocation>, CodecError> {
        let req = Req::decode(&payload)?;
        let fut = (self.func)(req);
        Ok(Box::pin(async move {
            match fut.await {
                Ok(resp) => Invocation::Ok(resp.encode()),
                Err(msg) => Invocation::HandlerFailed(msg),
            }
        }))
    }
}

/// Errors registering a method with a [`Router`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterError {
    MethodAlreadyRegistered(u32),
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::MethodAlreadyRegistered(id) => {
                write!(f, "method id {id} is already registered")
            }
        }
    }
}

impl std::error::Error for RouterError {}

/// Maps method ids to handlers. Built once at server startup and shared
/// read-only across connections via `Arc`.
#[derive(Default)]
pub struct Router {
    handlers: HashMap<u32, Arc<dyn MethodHandler>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler `func` for `method_id`, with request/response
    /// types determined by `func`'s signature.
    pub fn method<Req, Resp, F, Fut>(
        &mut self,
        method_id: u32,
        func: F,
    ) -> Result<(), RouterError>
    where
        Req: Message + Send + 'static,
        Resp: Message + Send + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, String>> + Send + 'static,
    {
        if self.handlers.contains_key(&method_id) {
            return Err(RouterError::MethodAlreadyRegistered(method_id));
        }
        self.handlers.insert(
            method_id,
            Arc::new(TypedHandler {
                func,
                _marker: std::marker::PhantomData,
            }),
        );
        Ok(())
    }

    pub fn lookup(&self, method_id: u32) -> Option<Arc<dyn MethodHandler>> {
        self.handlers.get(&method_id).cloned()
    }

    pub fn method_count(&self) -> usize {
        self.handlers.len()
    }
}
