//! Stream Adapter: publishes an `ArrowIpcReader` through the Arrow C Data
//! Interface (`spec.md` §4.5).
//!
//! `arrow_array::ffi_stream::FFI_ArrowArrayStream` already implements the
//! exact `get_schema`/`get_next`/`release` contract this module needs
//! (zero-initialization before fallible work, idempotent schema export, EOS
//! signaled by a released `out`), so this is a thin constructor rather than a
//! hand-rolled set of C callbacks.

use arrow_array::ffi_stream::FFI_ArrowArrayStream;

use crate::ipc::ArrowIpcReader;

/// Hand the reader to the consumer as a standard `ArrowArrayStream`.
/// Ownership of `reader` transfers to the returned stream.
pub fn export_stream(reader: ArrowIpcReader) -> FFI_ArrowArrayStream {
    FFI_ArrowArrayStream::new(Box::new(reader))
}
