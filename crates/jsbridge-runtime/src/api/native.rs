//! Native function registration and builder
//!
//! This module provides infrastructure for exposing Rust closures to scripts
//! as callable functions. Native functions can be registered with fixed
//! arity (specific argument count) or variadic (any argument count).
//!
//! # Examples
//!
//! ```rust,no_run
//! use jsbridge_runtime::api::native::NativeFunctionBuilder;
//! use jsbridge_runtime::{Error, Runtime};
//!
//! let runtime = Runtime::new().unwrap();
//!
//! // Fixed arity function (2 arguments)
//! NativeFunctionBuilder::new("add")
//!     .with_arity(2)
//!     .with_implementation(|ctx, args| {
//!         let a = args[0].to_number()?;
//!         let b = args[1].to_number()?;
//!         Ok(ctx.new_number(a + b))
//!     })
//!     .register_global(&runtime)
//!     .unwrap();
//!
//! // Variadic function (any number of arguments)
//! NativeFunctionBuilder::new("sum")
//!     .variadic()
//!     .with_implementation(|ctx, args| {
//!         let mut total = 0.0;
//!         for arg in args {
//!             if !arg.is_number() {
//!                 return Err(Error::host("All arguments must be numbers"));
//!             }
//!             total += arg.to_number()?;
//!         }
//!         Ok(ctx.new_number(total))
//!     })
//!     .register_global(&runtime)
//!     .unwrap();
//!
//! assert_eq!(runtime.eval("add(1, sum(2, 3))").unwrap().to_i32().unwrap(), 6);
//! ```

use crate::api::runtime::Context;
use crate::error::{Error, Result};
use crate::ffi::callbacks::{into_native_fn, NativeFn, DEFAULT_FUNCTION_NAME};
use crate::value::Value;
use std::rc::Rc;

/// Builder for constructing native functions with arity validation
///
/// Provides a fluent API for creating functions callable from scripts.
/// Supports both fixed-arity functions (must be called with exact argument
/// count) and variadic functions (can be called with any number of
/// arguments).
pub struct NativeFunctionBuilder {
    name: String,
    arity: Option<usize>,
    implementation: Option<Rc<NativeFn>>,
}

impl NativeFunctionBuilder {
    /// Create a new native function builder with the given name
    ///
    /// The name is visible to scripts as the function's `name` and appears
    /// in arity errors. An empty name is replaced by `<native>`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            name: if name.is_empty() {
                DEFAULT_FUNCTION_NAME.to_string()
            } else {
                name
            },
            arity: None,
            implementation: None,
        }
    }

    /// Set the function's arity (required argument count)
    ///
    /// Calls with too few or too many arguments fail with `Error::Arity`
    /// before the implementation runs. The arity is also reported to scripts
    /// as the function's `length`.
    ///
    /// Cannot be combined with `variadic()`.
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }

    /// Mark this function as variadic (accepts any number of arguments)
    ///
    /// Variadic functions validate argument count and types themselves.
    ///
    /// Cannot be combined with `with_arity()`.
    pub fn variadic(mut self) -> Self {
        self.arity = None;
        self
    }

    /// Set the function implementation
    ///
    /// For fixed-arity functions, the argument count has already been
    /// validated when this closure is called. Returning `Err` or panicking
    /// raises an `InternalError` in the calling script.
    pub fn with_implementation<F>(mut self, implementation: F) -> Self
    where
        F: for<'js> Fn(&'js Context, &[Value<'js>]) -> Result<Value<'js>> + 'static,
    {
        self.implementation = Some(into_native_fn(implementation));
        self
    }

    /// Build the function value in `ctx`
    ///
    /// # Errors
    ///
    /// * `Error::MissingImplementation` if no implementation was provided
    /// * `Error::OutOfMemory` if the engine cannot create the function
    pub fn build(self, ctx: &Context) -> Result<Value<'_>> {
        let implementation = self
            .implementation
            .ok_or_else(|| Error::MissingImplementation(self.name.clone()))?;

        // Wrap implementation with arity validation if fixed arity
        let wrapped: Rc<NativeFn> = match self.arity {
            Some(expected) => {
                let name = self.name.clone();
                into_native_fn(move |ctx, args| {
                    if args.len() != expected {
                        return Err(Error::Arity {
                            name: name.clone(),
                            expected,
                            found: args.len(),
                        });
                    }
                    implementation(ctx, args)
                })
            }
            None => implementation,
        };

        ctx.install_native(&self.name, self.arity.unwrap_or(0), wrapped)
    }

    /// Build the function and bind it as a global under its name
    pub fn register_global(self, ctx: &Context) -> Result<()> {
        let name = self.name.clone();
        let function = self.build(ctx)?;
        ctx.set_global_property(&name, function)
    }
}
