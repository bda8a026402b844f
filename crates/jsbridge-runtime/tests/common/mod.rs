//! Shared test utilities
//!
//! Helpers that cut the boilerplate of creating runtimes and asserting on
//! evaluation results.

#![allow(dead_code)]

use jsbridge_runtime::{Error, Runtime};

pub use pretty_assertions::{assert_eq, assert_ne};

/// Route engine logs through the test harness writer
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Create a runtime with default configuration
pub fn runtime() -> Runtime {
    init_tracing();
    Runtime::new().expect("runtime creation failed")
}

/// Assert that source code evaluates to an int32
///
/// # Example
/// ```
/// assert_eval_i32("1 + 2", 3);
/// ```
pub fn assert_eval_i32(source: &str, expected: i32) {
    let rt = runtime();
    eval_i32_in(&rt, source, expected);
}

/// Assert that source code evaluates to a number
pub fn assert_eval_number(source: &str, expected: f64) {
    let rt = runtime();
    match rt.eval(source).and_then(|v| v.to_number()) {
        Ok(n) => assert_eq!(n, expected, "Expected {}, got {}", expected, n),
        Err(e) => panic!("Expected Number({}), got error {}", expected, e),
    }
}

/// Assert that source code evaluates to a string
pub fn assert_eval_string(source: &str, expected: &str) {
    let rt = runtime();
    match rt.eval(source).and_then(|v| v.get::<String>()) {
        Ok(s) => assert_eq!(s, expected),
        Err(e) => panic!("Expected String({:?}), got error {}", expected, e),
    }
}

/// Assert that evaluating `source` in `rt` yields `expected`
pub fn eval_i32_in(rt: &Runtime, source: &str, expected: i32) {
    match rt.eval(source).and_then(|v| v.to_i32()) {
        Ok(n) => assert_eq!(n, expected, "Expected {} from {:?}", expected, source),
        Err(e) => panic!("Expected {} from {:?}, got error {}", expected, source, e),
    }
}

/// Assert that source code fails with an evaluation error mentioning `needle`
pub fn assert_eval_error_contains(rt: &Runtime, source: &str, needle: &str) {
    match rt.eval(source) {
        Err(Error::Eval { message, .. }) => assert!(
            message.contains(needle),
            "Expected error containing {:?}, got {:?}",
            needle,
            message
        ),
        Err(other) => panic!("Expected Eval error, got {:?}", other),
        Ok(v) => panic!("Expected Eval error, got value {:?}", v),
    }
}

/// Assert the runtime still evaluates simple code after a failure
pub fn assert_still_usable(rt: &Runtime) {
    eval_i32_in(rt, "1 + 1", 2);
}
