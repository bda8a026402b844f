//! Safe wrappers for C strings crossing the engine boundary
//!
//! Provides RAII wrappers for strings passed into the engine and for
//! strings the engine hands back.

use crate::ffi::qjs;
use std::borrow::Cow;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr::NonNull;

/// RAII wrapper for C strings passed to the engine
///
/// Automatically deallocates the C string when dropped.
pub struct SafeCString {
    inner: CString,
}

impl SafeCString {
    /// Create a new SafeCString from a Rust string
    pub fn new(s: &str) -> Result<Self, std::ffi::NulError> {
        Ok(Self {
            inner: CString::new(s)?,
        })
    }

    /// Get the raw pointer for C code
    pub fn as_ptr(&self) -> *const c_char {
        self.inner.as_ptr()
    }

    /// Length in bytes, excluding the terminator
    pub fn len(&self) -> usize {
        self.inner.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.as_bytes().is_empty()
    }
}

impl std::ops::Deref for SafeCString {
    type Target = CStr;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// A string owned by the engine, released with `JS_FreeCString` on drop
pub struct EngineCString {
    ctx: NonNull<qjs::JSContext>,
    ptr: NonNull<c_char>,
    len: usize,
}

impl EngineCString {
    /// Render `value` through the engine's string conversion
    ///
    /// Returns `None` when the conversion throws; the exception is then
    /// pending on the context.
    ///
    /// # Safety
    ///
    /// `ctx` must be a live context and `value` a live value of it.
    pub unsafe fn from_value(ctx: NonNull<qjs::JSContext>, value: qjs::JSValue) -> Option<Self> {
        let mut len: qjs::size_t = 0;
        let ptr = qjs::JS_ToCStringLen2(ctx.as_ptr(), &mut len, value, false);
        NonNull::new(ptr as *mut c_char).map(|ptr| Self {
            ctx,
            ptr,
            len: len as usize,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr() as *const u8, self.len) }
    }

    /// Contents as UTF-8; lone surrogates become U+FFFD
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }
}

impl Drop for EngineCString {
    fn drop(&mut self) {
        unsafe { qjs::JS_FreeCString(self.ctx.as_ptr(), self.ptr.as_ptr()) }
    }
}
