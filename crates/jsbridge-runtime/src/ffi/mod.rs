//! Foreign Function Interface (FFI) infrastructure
//!
//! Everything that touches the engine's C ABI directly lives here:
//! - C string marshaling in both directions
//! - The per-context native function table
//! - The trampoline the engine calls for every native function
//!
//! # Safety
//!
//! FFI operations involve `unsafe` code and careful memory management.
//! All unsafe code that is not a single engine call is isolated in this
//! module behind safe wrappers.

pub mod callbacks;
pub mod safety;

pub(crate) use rquickjs_sys as qjs;

pub use callbacks::{NativeFn, DEFAULT_FUNCTION_NAME};
pub use safety::{EngineCString, SafeCString};
