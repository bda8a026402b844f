//! Script values with automatic reference management
//!
//! A [`Value`] wraps one engine value handle and borrows the [`Context`] it
//! belongs to, so no value can outlive its engine instance. An owning value
//! holds exactly one engine reference and releases it on drop; a borrowed
//! value (native call arguments) never releases anything.
//!
//! Cloning always duplicates the reference and yields an owning value.

use crate::api::conversion::{FromJs, IntoJs};
use crate::api::runtime::Context;
use crate::error::{Error, Result};
use crate::ffi::qjs;
use crate::ffi::safety::{EngineCString, SafeCString};
use std::fmt;
use std::os::raw::c_int;

/// A script value bound to the context that created it
pub struct Value<'js> {
    raw: qjs::JSValue,
    ctx: &'js Context,
    owned: bool,
}

impl<'js> Value<'js> {
    /// Take ownership of one reference the caller already holds
    ///
    /// # Safety
    ///
    /// `raw` must be a live value of `ctx` and the caller must transfer one
    /// reference to it.
    pub unsafe fn from_raw(ctx: &'js Context, raw: qjs::JSValue) -> Self {
        Self {
            raw,
            ctx,
            owned: true,
        }
    }

    /// Wrap a handle without taking a reference
    ///
    /// # Safety
    ///
    /// `raw` must stay alive for as long as the returned value is used.
    pub unsafe fn from_raw_borrowed(ctx: &'js Context, raw: qjs::JSValue) -> Self {
        Self {
            raw,
            ctx,
            owned: false,
        }
    }

    /// The raw handle; no reference is transferred
    pub fn as_raw(&self) -> qjs::JSValue {
        self.raw
    }

    /// Give up this wrapper and return a handle carrying one reference
    ///
    /// Borrowed values are duplicated first so the caller always owns the
    /// returned reference.
    pub fn into_raw(self) -> qjs::JSValue {
        let raw = if self.owned {
            self.raw
        } else {
            unsafe { qjs::JS_DupValue(self.ctx.as_raw_context(), self.raw) }
        };
        std::mem::forget(self);
        raw
    }

    /// Whether dropping this value releases a reference
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// The context this value belongs to
    pub fn context(&self) -> &'js Context {
        self.ctx
    }

    fn ctx_ptr(&self) -> *mut qjs::JSContext {
        self.ctx.as_raw_context()
    }

    fn tag(&self) -> i32 {
        unsafe { qjs::JS_VALUE_GET_TAG(self.raw) }
    }

    // ===== Type predicates =====

    pub fn is_undefined(&self) -> bool {
        unsafe { qjs::JS_IsUndefined(self.raw) }
    }

    pub fn is_null(&self) -> bool {
        unsafe { qjs::JS_IsNull(self.raw) }
    }

    pub fn is_bool(&self) -> bool {
        unsafe { qjs::JS_IsBool(self.raw) }
    }

    /// Integer or floating point; BigInt is not a number here
    pub fn is_number(&self) -> bool {
        unsafe { qjs::JS_IsNumber(self.raw) }
    }

    pub fn is_string(&self) -> bool {
        unsafe { qjs::JS_IsString(self.raw) }
    }

    pub fn is_symbol(&self) -> bool {
        unsafe { qjs::JS_IsSymbol(self.raw) }
    }

    pub fn is_bigint(&self) -> bool {
        unsafe { qjs::JS_IsBigInt(self.raw) }
    }

    /// Any object, including functions and arrays
    pub fn is_object(&self) -> bool {
        unsafe { qjs::JS_IsObject(self.raw) }
    }

    pub fn is_function(&self) -> bool {
        unsafe { qjs::JS_IsFunction(self.ctx_ptr(), self.raw) }
    }

    pub fn is_array(&self) -> bool {
        if !self.is_object() {
            return false;
        }
        match unsafe { qjs::JS_IsArray(self.ctx_ptr(), self.raw) } {
            r if r > 0 => true,
            0 => false,
            _ => {
                // A revoked proxy throws from the check itself.
                self.ctx.discard_exception();
                false
            }
        }
    }

    /// An instance of `Error` or one of its subclasses
    pub fn is_error(&self) -> bool {
        self.is_object() && unsafe { qjs::JS_IsError(self.ctx_ptr(), self.raw) }
    }

    /// Name of this value's type, without running any script code
    pub fn type_name(&self) -> &'static str {
        match self.tag() {
            qjs::JS_TAG_UNDEFINED => "undefined",
            qjs::JS_TAG_NULL => "null",
            qjs::JS_TAG_BOOL => "bool",
            qjs::JS_TAG_STRING => "string",
            qjs::JS_TAG_SYMBOL => "symbol",
            qjs::JS_TAG_BIG_INT => "bigint",
            qjs::JS_TAG_OBJECT if self.is_function() => "function",
            qjs::JS_TAG_OBJECT if self.is_array() => "array",
            qjs::JS_TAG_OBJECT => "object",
            _ if self.is_number() => "number",
            _ => "unknown",
        }
    }

    // ===== Scalar conversions =====

    /// Truthiness as the script sees it
    pub fn to_bool(&self) -> Result<bool> {
        match unsafe { qjs::JS_ToBool(self.ctx_ptr(), self.raw) } {
            r if r < 0 => Err(Error::conversion("bool", self.ctx.take_exception_message())),
            r => Ok(r != 0),
        }
    }

    /// Numeric coercion followed by ToInt32 wrapping
    pub fn to_i32(&self) -> Result<i32> {
        let mut out = 0_i32;
        if unsafe { qjs::JS_ToInt32(self.ctx_ptr(), &mut out, self.raw) } < 0 {
            return Err(Error::conversion("int32", self.ctx.take_exception_message()));
        }
        Ok(out)
    }

    pub fn to_number(&self) -> Result<f64> {
        let mut out = 0_f64;
        if unsafe { qjs::JS_ToFloat64(self.ctx_ptr(), &mut out, self.raw) } < 0 {
            return Err(Error::conversion("number", self.ctx.take_exception_message()));
        }
        Ok(out)
    }

    /// String coercion; may invoke a script `toString`
    pub fn to_string(&self) -> Result<String> {
        let rendered = unsafe { EngineCString::from_value(self.ctx.raw_context(), self.raw) };
        match rendered {
            Some(s) => Ok(s.to_string_lossy().into_owned()),
            None => Err(Error::conversion("string", self.ctx.take_exception_message())),
        }
    }

    /// Strict typed extraction, see [`FromJs`]
    pub fn get<T: FromJs<'js>>(&self) -> Result<T> {
        T::from_js(self)
    }

    // ===== Properties =====

    pub fn get_property(&self, name: &str) -> Result<Value<'js>> {
        let key = SafeCString::new(name)
            .map_err(|_| Error::property(name, "property name contains a NUL byte"))?;
        let raw = unsafe { qjs::JS_GetPropertyStr(self.ctx_ptr(), self.raw, key.as_ptr()) };
        self.ctx
            .wrap_raw(raw)
            .map_err(|message| Error::property(name, message))
    }

    /// Store `value` under `name`; the caller keeps its own reference
    pub fn set_property<V: IntoJs<'js>>(&self, name: &str, value: V) -> Result<()> {
        let key = SafeCString::new(name)
            .map_err(|_| Error::property(name, "property name contains a NUL byte"))?;
        let value = self.ctx.adopt(value)?;
        let status = unsafe {
            qjs::JS_SetPropertyStr(self.ctx_ptr(), self.raw, key.as_ptr(), value.into_raw())
        };
        if status < 0 {
            return Err(Error::property(name, self.ctx.take_exception_message()));
        }
        Ok(())
    }

    pub fn get_element(&self, index: u32) -> Result<Value<'js>> {
        let raw = unsafe { qjs::JS_GetPropertyUint32(self.ctx_ptr(), self.raw, index) };
        self.ctx
            .wrap_raw(raw)
            .map_err(|message| Error::property(index.to_string(), message))
    }

    pub fn set_element<V: IntoJs<'js>>(&self, index: u32, value: V) -> Result<()> {
        let value = self.ctx.adopt(value)?;
        let status =
            unsafe { qjs::JS_SetPropertyUint32(self.ctx_ptr(), self.raw, index, value.into_raw()) };
        if status < 0 {
            return Err(Error::property(
                index.to_string(),
                self.ctx.take_exception_message(),
            ));
        }
        Ok(())
    }

    /// The `length` property converted with `ToIndex`
    ///
    /// Works on anything with a `length`; there is no array fast path.
    /// Negative lengths and lengths above `u32::MAX` are conversion errors.
    pub fn array_length(&self) -> Result<u32> {
        let length = self.get_property("length")?;
        let mut index = 0_u64;
        if unsafe { qjs::JS_ToIndex(self.ctx_ptr(), &mut index, length.as_raw()) } < 0 {
            return Err(Error::conversion(
                "array length",
                self.ctx.take_exception_message(),
            ));
        }
        u32::try_from(index)
            .map_err(|_| Error::conversion("array length", format!("length {} exceeds u32", index)))
    }

    // ===== Calls =====

    /// Invoke this value as a function with an undefined receiver
    pub fn call(&self, args: &[Value<'js>]) -> Result<Value<'js>> {
        self.invoke(qjs::JS_UNDEFINED, args)
    }

    /// Invoke the method `name` with this value as receiver
    pub fn call_method(&self, name: &str, args: &[Value<'js>]) -> Result<Value<'js>> {
        let method = self.get_property(name)?;
        if !method.is_function() {
            return Err(Error::Call(format!(
                "property '{}' is not a function (found {})",
                name,
                method.type_name()
            )));
        }
        method.invoke(self.raw, args)
    }

    fn invoke(&self, this: qjs::JSValue, args: &[Value<'js>]) -> Result<Value<'js>> {
        if args.iter().any(|arg| !std::ptr::eq(arg.ctx, self.ctx)) {
            return Err(Error::ContextMismatch);
        }
        let argc = c_int::try_from(args.len())
            .map_err(|_| Error::Call(format!("too many arguments ({})", args.len())))?;
        let mut argv: Vec<qjs::JSValue> = args.iter().map(|arg| arg.raw).collect();

        let _entry = self.ctx.enter();
        let raw = unsafe { qjs::JS_Call(self.ctx_ptr(), self.raw, this, argc, argv.as_mut_ptr()) };
        self.ctx.wrap_raw(raw).map_err(Error::Call)
    }

    // ===== Equality =====

    /// Script `===`; values of different contexts are never equal
    pub fn strict_equals(&self, other: &Value<'_>) -> bool {
        std::ptr::eq(self.ctx, other.ctx)
            && unsafe { qjs::JS_IsStrictEqual(self.ctx_ptr(), self.raw, other.raw) }
    }
}

impl Clone for Value<'_> {
    fn clone(&self) -> Self {
        Self {
            raw: unsafe { qjs::JS_DupValue(self.ctx_ptr(), self.raw) },
            ctx: self.ctx,
            owned: true,
        }
    }
}

impl Drop for Value<'_> {
    fn drop(&mut self) {
        if self.owned && !unsafe { qjs::JS_IsUninitialized(self.raw) } {
            unsafe { qjs::JS_FreeValue(self.ctx_ptr(), self.raw) }
        }
    }
}

impl PartialEq for Value<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tuple = f.debug_tuple("Value");
        tuple.field(&self.type_name());
        match self.tag() {
            qjs::JS_TAG_BOOL => {
                tuple.field(&unsafe { qjs::JS_VALUE_GET_BOOL(self.raw) });
            }
            qjs::JS_TAG_INT => {
                tuple.field(&unsafe { qjs::JS_VALUE_GET_INT(self.raw) });
            }
            // Rendering a primitive string never runs script code.
            qjs::JS_TAG_STRING => {
                if let Some(s) =
                    unsafe { EngineCString::from_value(self.ctx.raw_context(), self.raw) }
                {
                    tuple.field(&s.to_string_lossy());
                }
            }
            _ if self.is_number() => {
                tuple.field(&unsafe { qjs::JS_VALUE_GET_FLOAT64(self.raw) });
            }
            _ => {}
        }
        tuple.finish()
    }
}
