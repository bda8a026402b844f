//! Public embedding API
//!
//! This module provides the API for embedding a script engine in Rust
//! applications. It includes:
//! - Engine instances and script evaluation
//! - Value conversion between Rust and script types
//! - Native function registration
//!
//! # Examples
//!
//! ```no_run
//! use jsbridge_runtime::api::Runtime;
//!
//! let runtime = Runtime::new().unwrap();
//!
//! // Evaluate code
//! let result = runtime.eval("1 + 2").unwrap();
//!
//! // Call script functions from Rust
//! runtime.eval("function add(x, y) { return x + y; }").unwrap();
//! let args = [runtime.new_i32(1), runtime.new_i32(2)];
//! let sum = runtime.call_global("add", &args).unwrap();
//! ```

pub mod conversion;
pub mod native;
pub mod runtime;

// Re-export main types for convenience
pub use conversion::{FromJs, IntoJs};
pub use native::NativeFunctionBuilder;
pub use runtime::{Context, MemoryStats, Runtime, NO_EXCEPTION, UNKNOWN_EXCEPTION};
