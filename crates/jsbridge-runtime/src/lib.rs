//! JSBridge Runtime - safe embedding of a JavaScript engine
//!
//! This library wraps the QuickJS C API with:
//! - Reference-counted script values tied to their engine by lifetime
//! - Script evaluation with structured errors
//! - Rust closures callable from scripts, including re-entrant calls
//! - Engine limits driven by `jsbridge-config`
//!
//! Every engine failure surfaces as an [`Error`]; a native function that
//! fails or panics raises a script exception instead of unwinding into the
//! engine.

/// Runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Public API modules
pub mod api;
pub mod error;
pub mod ffi;
pub mod value;

/// Raw engine bindings, for use with [`Value::from_raw`] and friends
pub use rquickjs_sys as sys;

// Re-export commonly used types
pub use api::{Context, FromJs, IntoJs, MemoryStats, NativeFunctionBuilder, Runtime};
pub use error::{Error, Result};
pub use ffi::NativeFn;
pub use jsbridge_config::EngineConfig;
pub use value::Value;
