//! Type conversion between Rust and script values
//!
//! Provides traits and implementations for bidirectional conversion:
//! - `IntoJs` - Convert Rust types into a [`Value`] of a given context
//! - `FromJs` - Extract Rust types from a [`Value`]
//!
//! `FromJs` is strict: a string is never parsed as a number and a number is
//! never stringified. The coercing conversions (`to_bool`, `to_i32`,
//! `to_number`, `to_string`) live on [`Value`] itself.
//!
//! # Examples
//!
//! ```no_run
//! use jsbridge_runtime::api::{FromJs, IntoJs};
//! use jsbridge_runtime::Runtime;
//!
//! let rt = Runtime::new().unwrap();
//!
//! // Rust to script
//! let number = 42.0.into_js(&rt).unwrap();
//! let text = "hello".into_js(&rt).unwrap();
//!
//! // Script to Rust
//! let n: f64 = FromJs::from_js(&number).unwrap();
//! let s: String = text.get().unwrap();
//! ```

use crate::api::runtime::Context;
use crate::error::{Error, Result};
use crate::value::Value;
use std::collections::HashMap;

/// Trait for extracting Rust types from a script value
pub trait FromJs<'js>: Sized {
    /// Convert from a script value to the Rust type
    ///
    /// # Errors
    ///
    /// Returns `Error::Conversion` if the value has the wrong type.
    fn from_js(value: &Value<'js>) -> Result<Self>;
}

/// Trait for converting Rust types into script values
pub trait IntoJs<'js> {
    /// Convert into a value owned by `ctx`
    ///
    /// # Errors
    ///
    /// Returns `Error::OutOfMemory` if the engine cannot allocate, or
    /// `Error::ContextMismatch` for a value of another context.
    fn into_js(self, ctx: &'js Context) -> Result<Value<'js>>;
}

/// Elements reserved up front when extracting a `Vec`
const PREALLOCATE_LIMIT: u32 = 1024;

fn mismatch(expected: &'static str, value: &Value<'_>) -> Error {
    Error::conversion(expected, format!("found {}", value.type_name()))
}

// Implementations for Value

impl<'js> FromJs<'js> for Value<'js> {
    fn from_js(value: &Value<'js>) -> Result<Self> {
        Ok(value.clone())
    }
}

impl<'js> IntoJs<'js> for Value<'js> {
    fn into_js(self, ctx: &'js Context) -> Result<Value<'js>> {
        if !std::ptr::eq(self.context(), ctx) {
            return Err(Error::ContextMismatch);
        }
        Ok(self)
    }
}

impl<'js> IntoJs<'js> for &Value<'js> {
    fn into_js(self, ctx: &'js Context) -> Result<Value<'js>> {
        self.clone().into_js(ctx)
    }
}

// Implementations for numbers

impl<'js> FromJs<'js> for f64 {
    fn from_js(value: &Value<'js>) -> Result<Self> {
        if !value.is_number() {
            return Err(mismatch("number", value));
        }
        value.to_number()
    }
}

impl<'js> IntoJs<'js> for f64 {
    fn into_js(self, ctx: &'js Context) -> Result<Value<'js>> {
        Ok(ctx.new_number(self))
    }
}

/// Accepts numbers with an exact 32-bit integer value only
impl<'js> FromJs<'js> for i32 {
    fn from_js(value: &Value<'js>) -> Result<Self> {
        let n = f64::from_js(value).map_err(|_| mismatch("int32", value))?;
        if n.fract() != 0.0 || n < i32::MIN as f64 || n > i32::MAX as f64 {
            return Err(Error::conversion("int32", format!("{} is not a 32-bit integer", n)));
        }
        Ok(n as i32)
    }
}

impl<'js> IntoJs<'js> for i32 {
    fn into_js(self, ctx: &'js Context) -> Result<Value<'js>> {
        Ok(ctx.new_i32(self))
    }
}

impl<'js> IntoJs<'js> for u32 {
    fn into_js(self, ctx: &'js Context) -> Result<Value<'js>> {
        Ok(ctx.new_number(self as f64))
    }
}

// Implementations for String

impl<'js> FromJs<'js> for String {
    fn from_js(value: &Value<'js>) -> Result<Self> {
        if !value.is_string() {
            return Err(mismatch("string", value));
        }
        value.to_string()
    }
}

impl<'js> IntoJs<'js> for String {
    fn into_js(self, ctx: &'js Context) -> Result<Value<'js>> {
        ctx.new_string(&self)
    }
}

impl<'js> IntoJs<'js> for &str {
    fn into_js(self, ctx: &'js Context) -> Result<Value<'js>> {
        ctx.new_string(self)
    }
}

impl<'js> IntoJs<'js> for &String {
    fn into_js(self, ctx: &'js Context) -> Result<Value<'js>> {
        ctx.new_string(self)
    }
}

// Implementations for bool

impl<'js> FromJs<'js> for bool {
    fn from_js(value: &Value<'js>) -> Result<Self> {
        if !value.is_bool() {
            return Err(mismatch("bool", value));
        }
        value.to_bool()
    }
}

impl<'js> IntoJs<'js> for bool {
    fn into_js(self, ctx: &'js Context) -> Result<Value<'js>> {
        Ok(ctx.new_bool(self))
    }
}

// Implementations for () (undefined)

impl<'js> FromJs<'js> for () {
    fn from_js(value: &Value<'js>) -> Result<Self> {
        if !value.is_undefined() {
            return Err(mismatch("undefined", value));
        }
        Ok(())
    }
}

impl<'js> IntoJs<'js> for () {
    fn into_js(self, ctx: &'js Context) -> Result<Value<'js>> {
        Ok(ctx.new_undefined())
    }
}

// Implementations for Option<T>; both undefined and null are None

impl<'js, T: FromJs<'js>> FromJs<'js> for Option<T> {
    fn from_js(value: &Value<'js>) -> Result<Self> {
        if value.is_undefined() || value.is_null() {
            return Ok(None);
        }
        T::from_js(value).map(Some)
    }
}

impl<'js, T: IntoJs<'js>> IntoJs<'js> for Option<T> {
    fn into_js(self, ctx: &'js Context) -> Result<Value<'js>> {
        match self {
            None => Ok(ctx.new_null()),
            Some(v) => v.into_js(ctx),
        }
    }
}

// Implementations for Vec<T> (array)

impl<'js, T: FromJs<'js>> FromJs<'js> for Vec<T> {
    fn from_js(value: &Value<'js>) -> Result<Self> {
        if !value.is_array() {
            return Err(mismatch("array", value));
        }
        let len = value.array_length()?;
        // `length` is script-controlled and may describe a sparse array.
        let mut result = Vec::with_capacity(len.min(PREALLOCATE_LIMIT) as usize);
        for index in 0..len {
            result
                .try_reserve(1)
                .map_err(|_| Error::OutOfMemory(format!("vector of {} elements", len)))?;
            let element = value.get_element(index)?;
            match T::from_js(&element) {
                Ok(converted) => result.push(converted),
                Err(Error::Conversion { target, message }) => {
                    return Err(Error::Conversion {
                        target,
                        message: format!("element {}: {}", index, message),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(result)
    }
}

impl<'js, T: IntoJs<'js>> IntoJs<'js> for Vec<T> {
    fn into_js(self, ctx: &'js Context) -> Result<Value<'js>> {
        let array = ctx.new_array()?;
        for (index, item) in self.into_iter().enumerate() {
            let index = u32::try_from(index)
                .map_err(|_| Error::conversion("array", "more than u32::MAX elements"))?;
            array.set_element(index, item)?;
        }
        Ok(array)
    }
}

// Implementations for HashMap<String, T> (plain object)

impl<'js, T: IntoJs<'js>> IntoJs<'js> for HashMap<String, T> {
    fn into_js(self, ctx: &'js Context) -> Result<Value<'js>> {
        let object = ctx.new_object()?;
        for (key, value) in self {
            object.set_property(&key, value)?;
        }
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Runtime;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_number_round_trip() {
        let rt = Runtime::new().unwrap();
        let value = 2.5.into_js(&rt).unwrap();
        assert_eq!(f64::from_js(&value).unwrap(), 2.5);
    }

    #[test]
    fn test_strict_string_extraction() {
        let rt = Runtime::new().unwrap();
        let number = rt.eval("42").unwrap();
        let err = String::from_js(&number).unwrap_err();
        assert!(matches!(err, Error::Conversion { target: "string", .. }));
        // The coercing path still works
        assert_eq!(number.to_string().unwrap(), "42");
    }

    #[test]
    fn test_i32_rejects_fractions() {
        let rt = Runtime::new().unwrap();
        assert_eq!(i32::from_js(&rt.eval("-7").unwrap()).unwrap(), -7);
        assert!(i32::from_js(&rt.eval("1.5").unwrap()).is_err());
        assert!(i32::from_js(&rt.eval("2 ** 40").unwrap()).is_err());
    }

    #[test]
    fn test_option_accepts_undefined_and_null() {
        let rt = Runtime::new().unwrap();
        let none_a: Option<f64> = rt.eval("undefined").unwrap().get().unwrap();
        let none_b: Option<f64> = rt.eval("null").unwrap().get().unwrap();
        let some: Option<f64> = rt.eval("3").unwrap().get().unwrap();
        assert_eq!(none_a, None);
        assert_eq!(none_b, None);
        assert_eq!(some, Some(3.0));
        assert!(Option::<i32>::None.into_js(&rt).unwrap().is_null());
    }

    #[test]
    fn test_vec_round_trip() {
        let rt = Runtime::new().unwrap();
        let array = vec!["a".to_string(), "b".to_string()].into_js(&rt).unwrap();
        assert!(array.is_array());
        let back: Vec<String> = array.get().unwrap();
        assert_eq!(back, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_vec_reports_bad_element() {
        let rt = Runtime::new().unwrap();
        let mixed = rt.eval("[1, 'two', 3]").unwrap();
        match Vec::<f64>::from_js(&mixed) {
            Err(Error::Conversion { message, .. }) => assert!(message.starts_with("element 1")),
            other => panic!("expected conversion error, got {:?}", other),
        }
    }

    #[test]
    fn test_vec_from_huge_sparse_array_is_an_error() {
        let rt = Runtime::new().unwrap();
        let sparse = rt.eval("var a = []; a.length = 2147483647; a").unwrap();
        match Vec::<f64>::from_js(&sparse) {
            Err(Error::Conversion { message, .. }) => assert!(message.starts_with("element 0")),
            other => panic!("expected conversion error, got {:?}", other),
        }
        assert_eq!(rt.eval("1 + 1").unwrap().to_i32().unwrap(), 2);
    }

    #[test]
    fn test_vec_from_sparse_array_beyond_preallocation() {
        let rt = Runtime::new().unwrap();
        let sparse = rt.eval("var b = []; b[4999] = 7; b").unwrap();
        let items: Vec<Option<f64>> = sparse.get().unwrap();
        assert_eq!(items.len(), 5000);
        assert_eq!(items[0], None);
        assert_eq!(items[4999], Some(7.0));
    }

    #[test]
    fn test_hashmap_into_object() {
        let rt = Runtime::new().unwrap();
        let mut map = HashMap::new();
        map.insert("x".to_string(), 1);
        map.insert("y".to_string(), 2);
        let object = map.into_js(&rt).unwrap();
        rt.set_global_property("point", object).unwrap();
        assert_eq!(rt.eval("point.x + point.y").unwrap().to_i32().unwrap(), 3);
    }
}
