//! Error taxonomy for the embedding layer
//!
//! Every failure the engine reports (syntax errors, thrown values, non-callable
//! targets) surfaces as one of these variants. Messages carry the rendered
//! script exception so callers never need to query the engine again.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the embedding layer
#[derive(Error, Debug)]
pub enum Error {
    /// Runtime or context creation failed
    #[error("engine initialization failed: {0}")]
    Init(String),

    /// Source text failed to parse or threw during evaluation
    #[error("evaluation of '{label}' failed: {message}")]
    Eval { label: String, message: String },

    /// A value could not be converted to the requested host type
    #[error("cannot convert to {target}: {message}")]
    Conversion {
        target: &'static str,
        message: String,
    },

    /// Property or element access failed
    #[error("property access '{key}' failed: {message}")]
    Property { key: String, message: String },

    /// Invocation failed or the target was not callable
    #[error("call failed: {0}")]
    Call(String),

    /// The engine invoked a native token with no registered callable
    #[error("no native function registered for token {token}")]
    Dispatch { token: i32 },

    /// A script file could not be read
    #[error("cannot read script '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine could not allocate a value
    #[error("out of memory while creating {0}")]
    OutOfMemory(String),

    /// A value from one engine instance was used with another
    #[error("value belongs to a different engine instance")]
    ContextMismatch,

    /// Native function token space of this context is used up
    #[error("native function token space exhausted")]
    TokenSpaceExhausted,

    /// Native function built without an implementation
    #[error("native function '{0}' missing implementation")]
    MissingImplementation(String),

    /// Fixed-arity native function called with the wrong argument count
    #[error("function '{name}' expects {expected} argument{}, got {found}", plural(.expected))]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    /// Free-form failure raised by a native callable
    #[error("{0}")]
    Host(String),

    /// Engine configuration could not be loaded
    #[error(transparent)]
    Config(#[from] jsbridge_config::ConfigError),
}

impl Error {
    /// Failure raised by host code inside a native callable
    pub fn host(message: impl Into<String>) -> Self {
        Error::Host(message.into())
    }

    pub(crate) fn conversion(target: &'static str, message: impl Into<String>) -> Self {
        Error::Conversion {
            target,
            message: message.into(),
        }
    }

    pub(crate) fn property(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Property {
            key: key.into(),
            message: message.into(),
        }
    }
}

fn plural(count: &usize) -> &'static str {
    if *count == 1 {
        ""
    } else {
        "s"
    }
}

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;
