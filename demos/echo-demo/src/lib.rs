//! End-to-end example: one service, `Echo`, with a single method, `echo`,
//! that returns the request's `message` and `nonce` unchanged. Demonstrates
//! a generated `Message` impl and a client/server wired through
//! `bitrpc-rpc`, the way application code consuming generated code would.

use std::sync::OnceLock;

use bitrpc_codec::{CodecError, FieldDescriptor, FieldType, Message};
use bitrpc_mask::BitMask;
use bitrpc_registry::{I64Handler, StringHandler, TypeHandler};
use bitrpc_rpc::Router;
use bitrpc_wire::{StreamReader, StreamWriter};

/// `method_id` for `Echo.echo`, as a generator would assign it: an FNV-1a
/// hash of `"{service}.{method}"`, stable across rebuilds as long as the
/// names don't change.
pub fn echo_method_id() -> u32 {
    bitrpc_registry::fnv1a_32("Echo.echo")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EchoRequest {
    pub message: String,
    pub nonce: u64,
}

impl Message for EchoRequest {
    const TYPE_TAG: &'static str = "echo_demo.EchoRequest";
    const FIELD_COUNT: usize = 2;

    fn field_descriptors() -> &'static [FieldDescriptor] {
        static FIELDS: OnceLock<Vec<FieldDescriptor>> = OnceLock::new();
        FIELDS.get_or_init(|| {
            vec![
                FieldDescriptor::new(1, "message", FieldType::String),
                FieldDescriptor::new(2, "nonce", FieldType::I64),
            ]
        })
    }

    fn compute_presence(&self, mask: &mut BitMask) {
        mask.set(0, !StringHandler.is_default(&self.message));
        mask.set(1, self.nonce != 0);
    }

    fn write_present(&self, mask: &BitMask, writer: &mut StreamWriter) {
        if mask.get(0) {
            StringHandler.write(&self.message, writer);
        }
        if mask.get(1) {
            I64Handler.write(&(self.nonce as i64), writer);
        }
    }

    fn read_present(mask: &BitMask, reader: &mut StreamReader) -> Result<Self, CodecError> {
        let mut value = Self::default();
        if mask.get(0) {
            value.message = StringHandler.read(reader)?;
        }
        if mask.get(1) {
            value.nonce = I64Handler.read(reader)? as u64;
        }
        Ok(value)
    }
}

pub type EchoResponse = EchoRequest;

/// Build a [`Router`] with the `Echo.echo` handler registered, for the
/// server binary to serve connections against.
pub fn build_router() -> Router {
    let mut router = Router::new();
    router
        .method(echo_method_id(), |req: EchoRequest| async move {
            Ok::<EchoResponse, String>(req)
        })
        .expect("echo_method_id is only registered once");
    router
}
