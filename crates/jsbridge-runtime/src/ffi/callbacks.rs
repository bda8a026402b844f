//! Native function dispatch
//!
//! The engine's native-function ABI carries no closure pointer, only a small
//! data array stored on the function object. Every [`Context`] owns a
//! [`Bridge`] mapping integer tokens to host callables; each function object
//! carries its token as an int in that data array. The [`trampoline`] is the
//! one C entry point the engine sees, and it resolves the owning context
//! through the context opaque slot.
//!
//! No Rust panic and no host error ever crosses the trampoline: both are
//! turned into a pending `InternalError` on the engine side.

use crate::api::runtime::Context;
use crate::error::{Error, Result};
use crate::ffi::qjs;
use crate::value::Value;
use std::any::Any;
use std::collections::HashMap;
use std::os::raw::{c_char, c_int};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Host callable invoked from scripts
///
/// Receives the calling context and the call arguments (borrowed, valid for
/// the duration of the call) and returns the call's result.
pub type NativeFn = dyn for<'js> Fn(&'js Context, &[Value<'js>]) -> Result<Value<'js>>;

/// Name reported for functions registered without one
pub const DEFAULT_FUNCTION_NAME: &str = "<native>";

const UNKNOWN_PANIC: &str = "unknown panic in native function";

/// Erase a closure into a shareable [`NativeFn`]
///
/// Passing the closure through this bound lets its argument and return
/// lifetimes be inferred from the signature.
pub(crate) fn into_native_fn<F>(f: F) -> Rc<NativeFn>
where
    F: for<'js> Fn(&'js Context, &[Value<'js>]) -> Result<Value<'js>> + 'static,
{
    Rc::new(f)
}

struct Entry {
    name: String,
    callable: Rc<NativeFn>,
}

/// Token table for one context
///
/// Tokens start at 1, increase monotonically and are never reused.
pub(crate) struct Bridge {
    next_token: i32,
    entries: HashMap<i32, Entry>,
}

impl Bridge {
    pub(crate) fn new() -> Self {
        Self {
            next_token: 1,
            entries: HashMap::new(),
        }
    }

    pub(crate) fn register(&mut self, name: &str, callable: Rc<NativeFn>) -> Result<i32> {
        let token = self.next_token;
        self.next_token = token.checked_add(1).ok_or(Error::TokenSpaceExhausted)?;
        self.entries.insert(
            token,
            Entry {
                name: name.to_string(),
                callable,
            },
        );
        Ok(token)
    }

    /// Drop an entry whose function object was never created
    pub(crate) fn unregister(&mut self, token: i32) {
        self.entries.remove(&token);
    }

    /// Clone the callable out so no borrow of the table outlives the lookup
    pub(crate) fn lookup(&self, token: i32) -> Option<(String, Rc<NativeFn>)> {
        self.entries
            .get(&token)
            .map(|entry| (entry.name.clone(), Rc::clone(&entry.callable)))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Entry point for every native function the engine calls
///
/// # Safety
///
/// Only the engine calls this, with `ctx` being a context whose opaque slot
/// was set by [`Context`], `argv` pointing at `argc` live values and `data`
/// at the slot written by [`token_slot`].
pub(crate) unsafe extern "C" fn trampoline(
    ctx: *mut qjs::JSContext,
    _this: qjs::JSValue,
    argc: c_int,
    argv: *mut qjs::JSValue,
    _magic: c_int,
    data: *mut qjs::JSValue,
) -> qjs::JSValue {
    // Tokens start at 1, so a missing slot resolves to no entry.
    let token = if data.is_null() {
        0
    } else {
        qjs::JS_VALUE_GET_INT(*data)
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| dispatch(ctx, argc, argv, token)));

    let message = match outcome {
        Ok(Ok(raw)) => return raw,
        Ok(Err(err)) => {
            debug!(token, error = %err, "native function failed");
            err.to_string()
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(token, panic = %message, "native function panicked");
            message
        }
    };

    throw_internal_error(ctx, &message)
}

unsafe fn dispatch(
    ctx: *mut qjs::JSContext,
    argc: c_int,
    argv: *mut qjs::JSValue,
    token: i32,
) -> Result<qjs::JSValue> {
    let opaque = qjs::JS_GetContextOpaque(ctx) as *const Context;
    if opaque.is_null() {
        return Err(Error::Dispatch { token });
    }
    let context: &Context = &*opaque;

    let (name, callable) = context
        .bridge()
        .borrow()
        .lookup(token)
        .ok_or(Error::Dispatch { token })?;
    trace!(token, function = %name, argc, "dispatching native function");

    let args: Vec<Value<'_>> = if argc <= 0 || argv.is_null() {
        Vec::new()
    } else {
        std::slice::from_raw_parts(argv, argc as usize)
            .iter()
            .map(|raw| Value::from_raw_borrowed(context, *raw))
            .collect()
    };

    let result = callable(context, &args)?;
    if !std::ptr::eq(result.context(), context) {
        return Err(Error::ContextMismatch);
    }
    Ok(result.into_raw())
}

/// The data slot stored on a function object for `token`
pub(crate) fn token_slot(token: i32) -> qjs::JSValue {
    qjs::JS_MKVAL(qjs::JS_TAG_INT, token)
}

/// Raise `message` as an `InternalError` and return the exception marker
///
/// The engine formats thrown messages into a small fixed buffer, so the
/// error is created empty and its `message` is set from the full text.
pub(crate) unsafe fn throw_internal_error(
    ctx: *mut qjs::JSContext,
    message: &str,
) -> qjs::JSValue {
    qjs::JS_ThrowInternalError(
        ctx,
        b"%s\0".as_ptr() as *const c_char,
        b"\0".as_ptr() as *const c_char,
    );
    let error = qjs::JS_GetException(ctx);
    if !qjs::JS_IsObject(error) {
        return qjs::JS_Throw(ctx, error);
    }

    let text = qjs::JS_NewStringLen(ctx, message.as_ptr() as *const c_char, message.len() as _);
    if qjs::JS_IsException(text) {
        // Out of memory; that exception is already pending.
        qjs::JS_FreeValue(ctx, error);
        return qjs::JS_EXCEPTION;
    }
    qjs::JS_DefinePropertyValueStr(
        ctx,
        error,
        b"message\0".as_ptr() as *const c_char,
        text,
        (qjs::JS_PROP_WRITABLE | qjs::JS_PROP_CONFIGURABLE) as c_int,
    );
    qjs::JS_Throw(ctx, error)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        UNKNOWN_PANIC.to_string()
    }
}
