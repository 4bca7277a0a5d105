use bitrpc_wire::{StreamReader, StreamWriter, WireError};

use crate::hash::fnv1a_32;

/// A codec for one logical type: default-detection, write, read, and a
/// stable hash of the type's canonical name.
///
/// Handlers are stateless and `Copy`-cheap; callers hold them by value or by
/// `&'static` reference rather than through a type-erased registry (see the
/// crate-level docs for why dispatch here is static, not reflective).
pub trait TypeHandler {
    type Value;

    /// Error a read can fail with. Scalar and compound handlers over them
    /// fail only with [`WireError`]; a handler delegating to a message's own
    /// codec (see `bitrpc-codec`) fails with that crate's richer error,
    /// which wraps `WireError` via `From`.
    type Error: From<WireError>;

    fn is_default(&self, value: &Self::Value) -> bool;
    fn write(&self, value: &Self::Value, writer: &mut StreamWriter);
    fn read(&self, reader: &mut StreamReader) -> Result<Self::Value, Self::Error>;

    /// FNV-1a hash of this type's canonical name. A registry key and an
    /// optional cross-language fingerprint check, never a wire value.
    fn type_hash(&self) -> u32;
}

macro_rules! scalar_handler {
    ($name:ident, $value:ty, $tag:literal, $write:ident, $read:ident, $is_default:expr) => {
        #[doc = concat!("Handler for the `", $tag, "` scalar type.")]
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl TypeHandler for $name {
            type Value = $value;
            type Error = WireError;

            fn is_default(&self, value: &Self::Value) -> bool {
                #[allow(clippy::redundant_closure_call)]
                $is_default(value)
            }

            fn write(&self, value: &Self::Value, writer: &mut StreamWriter) {
                writer.$write(*value);
            }

            fn read(&self, reader: &mut StreamReader) -> Result<Self::Value, WireError> {
                reader.$read()
            }

            fn type_hash(&self) -> u32 {
                fnv1a_32($tag)
            }
        }
    };
}

scalar_handler!(BoolHandler, bool, "bool", write_bool, read_bool, |v: &bool| !*v);
scalar_handler!(I32Handler, i32, "i32", write_i32, read_i32, |v: &i32| *v == 0);
scalar_handler!(I64Handler, i64, "i64", write_i64, read_i64, |v: &i64| *v == 0);
scalar_handler!(F32Handler, f32, "f32", write_f32, read_f32, |v: &f32| *v == 0.0);
scalar_handler!(F64Handler, f64, "f64", write_f64, read_f64, |v: &f64| *v == 0.0);

/// Handler for the `timestamp` scalar type: signed nanoseconds since the
/// Unix epoch, wire-identical to `i64`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampHandler;

impl TypeHandler for TimestampHandler {
    type Value = i64;
    type Error = WireError;

    fn is_default(&self, value: &Self::Value) -> bool {
        *value == 0
    }

    fn write(&self, value: &Self::Value, writer: &mut StreamWriter) {
        writer.write_i64(*value);
    }

    fn read(&self, reader: &mut StreamReader) -> Result<Self::Value, WireError> {
        reader.read_i64()
    }

    fn type_hash(&self) -> u32 {
        fnv1a_32("timestamp")
    }
}

/// Handler for the `string` scalar type: length-prefixed UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringHandler;

impl TypeHandler for StringHandler {
    type Value = String;
    type Error = WireError;

    fn is_default(&self, value: &Self::Value) -> bool {
        value.is_empty()
    }

    fn write(&self, value: &Self::Value, writer: &mut StreamWriter) {
        writer.write_str(value);
    }

    fn read(&self, reader: &mut StreamReader) -> Result<Self::Value, WireError> {
        reader.read_str()
    }

    fn type_hash(&self) -> u32 {
        fnv1a_32("string")
    }
}

/// Handler for the `bytes` scalar type: length-prefixed raw bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesHandler;

impl TypeHandler for BytesHandler {
    type Value = Vec<u8>;
    type Error = WireError;

    fn is_default(&self, value: &Self::Value) -> bool {
        value.is_empty()
    }

    fn write(&self, value: &Self::Value, writer: &mut StreamWriter) {
        writer.write_bytes(value);
    }

    fn read(&self, reader: &mut StreamReader) -> Result<Self::Value, WireError> {
        reader.read_bytes()
    }

    fn type_hash(&self) -> u32 {
        fnv1a_32("bytes")
    }
}
