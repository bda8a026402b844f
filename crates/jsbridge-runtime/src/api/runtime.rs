//! Engine instances and the operations scripts run against
//!
//! A [`Runtime`] owns one engine runtime together with its single context.
//! Everything else happens through the [`Context`] it dereferences to:
//! evaluation, value construction, globals, native functions, memory and
//! exception introspection. Values borrow the context, so the borrow
//! checker guarantees none of them outlives the engine.
//!
//! # Examples
//!
//! ```no_run
//! use jsbridge_runtime::Runtime;
//!
//! let runtime = Runtime::new().unwrap();
//!
//! // Execute code
//! runtime.eval("var x = 40;").unwrap();
//!
//! // State persists
//! let result = runtime.eval("x + 2").unwrap();
//! assert_eq!(result.to_i32().unwrap(), 42);
//! ```

use crate::api::conversion::IntoJs;
use crate::api::native::NativeFunctionBuilder;
use crate::error::{Error, Result};
use crate::ffi::callbacks::{self, Bridge, NativeFn};
use crate::ffi::qjs;
use crate::ffi::safety::{EngineCString, SafeCString};
use crate::value::Value;
use jsbridge_config::{ConfigLoader, EngineConfig};
use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::fmt;
use std::mem::MaybeUninit;
use std::ops::Deref;
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::ptr::{self, NonNull};
use std::rc::Rc;
use tracing::debug;

/// Returned by [`Context::exception_string`] when nothing is pending
pub const NO_EXCEPTION: &str = "no pending exception";

/// Returned when a pending exception cannot be rendered
pub const UNKNOWN_EXCEPTION: &str = "unknown exception";

/// Snapshot of the engine's allocation counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryStats {
    /// Bytes currently allocated by the engine allocator
    pub malloc_size: i64,
    /// Allocation ceiling, or -1 when unlimited
    pub malloc_limit: i64,
    /// Bytes attributed to live engine structures
    pub memory_used_size: i64,
    pub malloc_count: i64,
    pub atom_count: i64,
    pub string_count: i64,
    pub object_count: i64,
    pub property_count: i64,
    pub shape_count: i64,
    pub function_count: i64,
    pub native_function_count: i64,
    pub array_count: i64,
}

impl From<qjs::JSMemoryUsage> for MemoryStats {
    fn from(usage: qjs::JSMemoryUsage) -> Self {
        Self {
            malloc_size: usage.malloc_size,
            malloc_limit: usage.malloc_limit,
            memory_used_size: usage.memory_used_size,
            malloc_count: usage.malloc_count,
            atom_count: usage.atom_count,
            string_count: usage.str_count,
            object_count: usage.obj_count,
            property_count: usage.prop_count,
            shape_count: usage.shape_count,
            function_count: usage.js_func_count,
            native_function_count: usage.c_func_count,
            array_count: usage.array_count,
        }
    }
}

/// Owner of one engine runtime and its context
///
/// Not copyable. Moving a `Runtime` moves ownership of the engine; the
/// [`Context`] itself stays at a fixed heap address, which native function
/// dispatch relies on.
pub struct Runtime {
    context: Box<Context>,
}

impl Runtime {
    /// Create an engine with the engine's default limits
    ///
    /// # Errors
    ///
    /// `Error::Init` if the runtime or context cannot be allocated.
    pub fn new() -> Result<Self> {
        Self::with_config(&EngineConfig::default())
    }

    /// Create an engine with the limits and evaluation defaults of `config`
    ///
    /// Unset limits keep the engine's defaults.
    pub fn with_config(config: &EngineConfig) -> Result<Self> {
        let rt = NonNull::new(unsafe { qjs::JS_NewRuntime() })
            .ok_or_else(|| Error::Init("runtime allocation failed".to_string()))?;

        let ctx = match NonNull::new(unsafe { qjs::JS_NewContext(rt.as_ptr()) }) {
            Some(ctx) => ctx,
            None => {
                unsafe { qjs::JS_FreeRuntime(rt.as_ptr()) };
                return Err(Error::Init("context allocation failed".to_string()));
            }
        };

        // From here on the Context's Drop releases both handles.
        let context = Box::new(Context {
            rt,
            ctx,
            bridge: RefCell::new(Bridge::new()),
            entry_depth: Cell::new(0),
            strict: config.strict(),
            default_label: config.default_label().to_string(),
        });
        unsafe {
            qjs::JS_SetContextOpaque(ctx.as_ptr(), &*context as *const Context as *mut c_void);
        }

        if let Some(size) = config.max_stack_size() {
            context.set_max_stack_size(size);
        }
        if let Some(limit) = config.memory_limit() {
            context.set_memory_limit(limit);
        }
        if let Some(threshold) = config.gc_threshold() {
            context.set_gc_threshold(threshold);
        }

        debug!(
            strict = context.strict,
            max_stack_size = ?config.max_stack_size(),
            memory_limit = ?config.memory_limit(),
            "engine created"
        );
        Ok(Self { context })
    }

    /// Create an engine configured from `jsbridge.toml` found at or above `dir`
    ///
    /// Global configuration and `JSBRIDGE_*` environment overrides apply as
    /// described in [`jsbridge_config`].
    pub fn from_directory(dir: &Path) -> Result<Self> {
        let config = ConfigLoader::new().load_from_directory(dir)?;
        Self::with_config(&config.engine)
    }

    pub fn context(&self) -> &Context {
        &self.context
    }
}

impl Deref for Runtime {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.context
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.context, f)
    }
}

/// One live execution environment
///
/// Only reachable by reference, through a [`Runtime`] or as the first
/// argument of a native function.
pub struct Context {
    rt: NonNull<qjs::JSRuntime>,
    ctx: NonNull<qjs::JSContext>,
    bridge: RefCell<Bridge>,
    entry_depth: Cell<usize>,
    strict: bool,
    default_label: String,
}

/// Marks a host-initiated entry into the engine
pub(crate) struct EntryGuard<'a> {
    depth: &'a Cell<usize>,
}

impl Drop for EntryGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

impl Context {
    // ===== Raw access =====

    pub fn as_raw_context(&self) -> *mut qjs::JSContext {
        self.ctx.as_ptr()
    }

    pub fn as_raw_runtime(&self) -> *mut qjs::JSRuntime {
        self.rt.as_ptr()
    }

    pub(crate) fn raw_context(&self) -> NonNull<qjs::JSContext> {
        self.ctx
    }

    pub(crate) fn bridge(&self) -> &RefCell<Bridge> {
        &self.bridge
    }

    /// Stack-limit accounting starts at the outermost host entry
    pub(crate) fn enter(&self) -> EntryGuard<'_> {
        let depth = self.entry_depth.get();
        if depth == 0 {
            unsafe { qjs::JS_UpdateStackTop(self.rt.as_ptr()) };
        }
        self.entry_depth.set(depth + 1);
        EntryGuard {
            depth: &self.entry_depth,
        }
    }

    // ===== Evaluation =====

    /// Evaluate `source` as a top-level script under the default label
    ///
    /// # Errors
    ///
    /// `Error::Eval` carrying the rendered exception on a syntax error, an
    /// uncaught throw or stack exhaustion. The context stays usable.
    pub fn eval(&self, source: &str) -> Result<Value<'_>> {
        self.eval_labeled(source, &self.default_label)
    }

    /// Evaluate `source`; `label` only names the source in diagnostics
    pub fn eval_labeled(&self, source: &str, label: &str) -> Result<Value<'_>> {
        let eval_error = |message: String| Error::Eval {
            label: label.to_string(),
            message,
        };
        let source = SafeCString::new(source)
            .map_err(|_| eval_error("source contains a NUL byte".to_string()))?;
        let filename = SafeCString::new(label)
            .map_err(|_| eval_error("label contains a NUL byte".to_string()))?;

        let mut flags = qjs::JS_EVAL_TYPE_GLOBAL;
        if self.strict {
            flags |= qjs::JS_EVAL_FLAG_STRICT;
        }

        let _entry = self.enter();
        let raw = unsafe {
            qjs::JS_Eval(
                self.as_raw_context(),
                source.as_ptr(),
                source.len() as _,
                filename.as_ptr(),
                flags as c_int,
            )
        };
        self.wrap_raw(raw).map_err(eval_error)
    }

    /// Read a script file and evaluate it, labeled with its path
    pub fn eval_file(&self, path: impl AsRef<Path>) -> Result<Value<'_>> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.eval_labeled(&source, &path.display().to_string())
    }

    /// Call the global function `name`
    pub fn call_global<'js>(&'js self, name: &str, args: &[Value<'js>]) -> Result<Value<'js>> {
        let function = self.get_global_property(name)?;
        if !function.is_function() {
            return Err(Error::Call(format!(
                "global '{}' is not a function (found {})",
                name,
                function.type_name()
            )));
        }
        function.call(args)
    }

    // ===== Value construction =====

    pub fn new_undefined(&self) -> Value<'_> {
        unsafe { Value::from_raw(self, qjs::JS_UNDEFINED) }
    }

    pub fn new_null(&self) -> Value<'_> {
        unsafe { Value::from_raw(self, qjs::JS_NULL) }
    }

    pub fn new_bool(&self, value: bool) -> Value<'_> {
        let raw = if value { qjs::JS_TRUE } else { qjs::JS_FALSE };
        unsafe { Value::from_raw(self, raw) }
    }

    pub fn new_number(&self, value: f64) -> Value<'_> {
        unsafe { Value::from_raw(self, qjs::JS_NewFloat64(value)) }
    }

    pub fn new_i32(&self, value: i32) -> Value<'_> {
        unsafe { Value::from_raw(self, qjs::JS_MKVAL(qjs::JS_TAG_INT, value)) }
    }

    pub fn new_string(&self, value: &str) -> Result<Value<'_>> {
        let raw = unsafe {
            qjs::JS_NewStringLen(
                self.as_raw_context(),
                value.as_ptr() as *const c_char,
                value.len() as _,
            )
        };
        self.allocated(raw, "string")
    }

    pub fn new_object(&self) -> Result<Value<'_>> {
        let raw = unsafe { qjs::JS_NewObject(self.as_raw_context()) };
        self.allocated(raw, "object")
    }

    pub fn new_array(&self) -> Result<Value<'_>> {
        let raw = unsafe { qjs::JS_NewArray(self.as_raw_context()) };
        self.allocated(raw, "array")
    }

    /// New array holding a duplicate of each element at increasing indices
    ///
    /// The caller's elements stay independently owned.
    pub fn new_array_from<'js>(&'js self, elements: &[Value<'js>]) -> Result<Value<'js>> {
        let array = self.new_array()?;
        for (index, element) in elements.iter().enumerate() {
            let index = u32::try_from(index)
                .map_err(|_| Error::property(index.to_string(), "array index out of range"))?;
            array.set_element(index, element)?;
        }
        Ok(array)
    }

    fn allocated(&self, raw: qjs::JSValue, what: &str) -> Result<Value<'_>> {
        self.wrap_raw(raw).map_err(|_| Error::OutOfMemory(what.to_string()))
    }

    // ===== Globals =====

    /// The global object
    pub fn global(&self) -> Value<'_> {
        unsafe { Value::from_raw(self, qjs::JS_GetGlobalObject(self.as_raw_context())) }
    }

    pub fn get_global_property(&self, name: &str) -> Result<Value<'_>> {
        self.global().get_property(name)
    }

    pub fn set_global_property<'js, V: IntoJs<'js>>(&'js self, name: &str, value: V) -> Result<()> {
        self.global().set_property(name, value)
    }

    // ===== Native functions =====

    /// Create a script function that dispatches to `implementation`
    ///
    /// The callable is owned by this context and released with it.
    pub fn new_function<F>(&self, name: &str, implementation: F) -> Result<Value<'_>>
    where
        F: for<'js> Fn(&'js Context, &[Value<'js>]) -> Result<Value<'js>> + 'static,
    {
        self.install_native(name, 0, callbacks::into_native_fn(implementation))
    }

    /// Create a function with [`Context::new_function`] and bind it as a global
    pub fn set_global_function<F>(&self, name: &str, implementation: F) -> Result<()>
    where
        F: for<'js> Fn(&'js Context, &[Value<'js>]) -> Result<Value<'js>> + 'static,
    {
        let function = self.new_function(name, implementation)?;
        self.set_global_property(name, function)
    }

    /// Register a global function that requires exactly `arity` arguments
    ///
    /// Calls with another argument count fail with `Error::Arity` before
    /// `implementation` runs.
    pub fn register_function<F>(&self, name: &str, arity: usize, implementation: F) -> Result<()>
    where
        F: for<'js> Fn(&'js Context, &[Value<'js>]) -> Result<Value<'js>> + 'static,
    {
        NativeFunctionBuilder::new(name)
            .with_arity(arity)
            .with_implementation(implementation)
            .register_global(self)
    }

    /// Register a global function accepting any number of arguments
    pub fn register_variadic<F>(&self, name: &str, implementation: F) -> Result<()>
    where
        F: for<'js> Fn(&'js Context, &[Value<'js>]) -> Result<Value<'js>> + 'static,
    {
        NativeFunctionBuilder::new(name)
            .variadic()
            .with_implementation(implementation)
            .register_global(self)
    }

    /// Number of native functions registered with this context
    pub fn native_function_count(&self) -> usize {
        self.bridge.borrow().len()
    }

    pub(crate) fn install_native(
        &self,
        name: &str,
        length: usize,
        callable: Rc<NativeFn>,
    ) -> Result<Value<'_>> {
        let token = self.bridge.borrow_mut().register(name, callable)?;
        match self.create_function_object(name, length, token) {
            Ok(function) => {
                debug!(function = name, token, "registered native function");
                Ok(function)
            }
            Err(err) => {
                self.bridge.borrow_mut().unregister(token);
                Err(err)
            }
        }
    }

    fn create_function_object(&self, name: &str, length: usize, token: i32) -> Result<Value<'_>> {
        // The engine stores `length` in a byte.
        let length = c_int::from(u8::try_from(length).unwrap_or(u8::MAX));
        let mut data = [callbacks::token_slot(token)];
        let raw = unsafe {
            qjs::JS_NewCFunctionData(
                self.as_raw_context(),
                Some(callbacks::trampoline),
                length,
                0,
                data.len() as c_int,
                data.as_mut_ptr(),
            )
        };
        let function = self.allocated(raw, "function")?;

        let name_value = self.new_string(name)?;
        let status = unsafe {
            qjs::JS_DefinePropertyValueStr(
                self.as_raw_context(),
                function.as_raw(),
                b"name\0".as_ptr() as *const c_char,
                name_value.into_raw(),
                qjs::JS_PROP_CONFIGURABLE as c_int,
            )
        };
        if status < 0 {
            return Err(Error::property("name", self.take_exception_message()));
        }
        Ok(function)
    }

    // ===== Memory =====

    /// Run one garbage collection cycle
    ///
    /// Reclaim is best effort; usage is not guaranteed to drop.
    pub fn run_gc(&self) {
        unsafe { qjs::JS_RunGC(self.rt.as_ptr()) }
    }

    /// Bytes currently allocated by the engine
    ///
    /// This is the allocator counter `malloc_size` of [`MemoryStats`], not
    /// the engine's `memory_used_size` estimate of live structures.
    pub fn memory_usage(&self) -> usize {
        usize::try_from(self.memory_stats().malloc_size).unwrap_or(0)
    }

    pub fn memory_stats(&self) -> MemoryStats {
        let mut usage = MaybeUninit::<qjs::JSMemoryUsage>::zeroed();
        unsafe {
            qjs::JS_ComputeMemoryUsage(self.rt.as_ptr(), usage.as_mut_ptr());
            MemoryStats::from(usage.assume_init())
        }
    }

    /// Limit the native stack the engine may use, in bytes
    pub fn set_max_stack_size(&self, bytes: usize) {
        unsafe { qjs::JS_SetMaxStackSize(self.rt.as_ptr(), bytes as _) }
    }

    pub fn set_memory_limit(&self, bytes: usize) {
        unsafe { qjs::JS_SetMemoryLimit(self.rt.as_ptr(), bytes as _) }
    }

    pub fn set_gc_threshold(&self, bytes: usize) {
        unsafe { qjs::JS_SetGCThreshold(self.rt.as_ptr(), bytes as _) }
    }

    // ===== Exceptions =====

    pub fn has_exception(&self) -> bool {
        unsafe { qjs::JS_HasException(self.as_raw_context()) }
    }

    /// Take the pending exception, clearing it
    pub fn get_exception(&self) -> Option<Value<'_>> {
        let raw = unsafe { qjs::JS_GetException(self.as_raw_context()) };
        if unsafe { qjs::JS_IsUninitialized(raw) } {
            None
        } else {
            Some(unsafe { Value::from_raw(self, raw) })
        }
    }

    /// Take and render the pending exception; never fails
    ///
    /// Returns [`NO_EXCEPTION`] when nothing is pending and
    /// [`UNKNOWN_EXCEPTION`] when rendering itself throws.
    pub fn exception_string(&self) -> String {
        match self.get_exception() {
            Some(exception) => self.render_exception(&exception),
            None => NO_EXCEPTION.to_string(),
        }
    }

    /// Raise an `InternalError` with `message` in this context
    ///
    /// Returns the matching host error so a native function can write
    /// `return Err(ctx.throw_error("..."))`.
    pub fn throw_error(&self, message: &str) -> Error {
        unsafe { callbacks::throw_internal_error(self.as_raw_context(), message) };
        Error::host(message)
    }

    pub(crate) fn take_exception_message(&self) -> String {
        match self.get_exception() {
            Some(exception) => self.render_exception(&exception),
            None => UNKNOWN_EXCEPTION.to_string(),
        }
    }

    pub(crate) fn discard_exception(&self) {
        drop(self.get_exception());
    }

    /// `String(exception)` plus the `stack` of error objects
    ///
    /// Any exception raised while rendering is discarded.
    fn render_exception(&self, exception: &Value<'_>) -> String {
        let mut message = match unsafe { EngineCString::from_value(self.ctx, exception.as_raw()) } {
            Some(rendered) => rendered.to_string_lossy().into_owned(),
            None => {
                self.discard_exception();
                return UNKNOWN_EXCEPTION.to_string();
            }
        };

        if exception.is_error() {
            let raw = unsafe {
                qjs::JS_GetPropertyStr(
                    self.as_raw_context(),
                    exception.as_raw(),
                    b"stack\0".as_ptr() as *const c_char,
                )
            };
            // Not wrap_raw: a throwing `stack` getter must not be rendered in turn.
            if unsafe { qjs::JS_IsException(raw) } {
                self.discard_exception();
            } else {
                let stack = unsafe { Value::from_raw(self, raw) };
                if stack.is_string() {
                    if let Some(stack) =
                        unsafe { EngineCString::from_value(self.ctx, stack.as_raw()) }
                    {
                        let stack = stack.to_string_lossy();
                        let stack = stack.trim_end();
                        if !stack.is_empty() {
                            message.push('\n');
                            message.push_str(stack);
                        }
                    }
                }
            }
        }

        message
    }

    /// Own `raw`, or take the pending exception if `raw` is the exception marker
    pub(crate) fn wrap_raw(&self, raw: qjs::JSValue) -> std::result::Result<Value<'_>, String> {
        if unsafe { qjs::JS_IsException(raw) } {
            Err(self.take_exception_message())
        } else {
            Ok(unsafe { Value::from_raw(self, raw) })
        }
    }

    /// Convert into a value of this context
    pub(crate) fn adopt<'js, V: IntoJs<'js>>(&'js self, value: V) -> Result<Value<'js>> {
        let value = value.into_js(self)?;
        if !ptr::eq(value.context(), self) {
            return Err(Error::ContextMismatch);
        }
        Ok(value)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("native_functions", &self.native_function_count())
            .field("strict", &self.strict)
            .field("default_label", &self.default_label)
            .finish()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        let released = self.bridge.get_mut().len();
        self.bridge.get_mut().clear();
        unsafe {
            qjs::JS_SetContextOpaque(self.ctx.as_ptr(), ptr::null_mut());
            qjs::JS_FreeContext(self.ctx.as_ptr());
            qjs::JS_FreeRuntime(self.rt.as_ptr());
        }
        debug!(native_functions = released, "engine destroyed");
    }
}
