//! Reentrancy and stack-limit tests
//!
//! Native functions calling back into scripts that call native functions
//! again, and recovery once the engine's stack limit is hit.

mod common;

use common::*;
#[allow(unused_imports)]
use common::{assert_eq, assert_ne};
use jsbridge_runtime::{Error, Runtime};
use rstest::rstest;

fn runtime_with_reentrant_factorial() -> Runtime {
    let rt = runtime();
    rt.register_function("nativeFact", 1, |ctx, args| {
        let n = args[0].to_number()?;
        if n <= 1.0 {
            return Ok(ctx.new_number(1.0));
        }
        let rest = ctx.call_global("scriptFact", &[ctx.new_number(n - 1.0)])?;
        Ok(ctx.new_number(n * rest.to_number()?))
    })
    .unwrap();
    rt.eval("function scriptFact(n) { return nativeFact(n); }")
        .unwrap();
    rt
}

// ============================================================================
// Bounded reentrancy
// ============================================================================

#[rstest]
#[case(1, 1.0)]
#[case(5, 120.0)]
#[case(10, 3_628_800.0)]
#[case(20, 2_432_902_008_176_640_000.0)]
fn test_reentrant_factorial(#[case] n: i32, #[case] expected: f64) {
    let rt = runtime_with_reentrant_factorial();
    let result = rt.eval(&format!("scriptFact({})", n)).unwrap();
    assert_eq!(result.to_number().unwrap(), expected);
}

#[test]
fn test_reentrant_failure_unwinds_every_level() {
    let rt = runtime();
    rt.register_function("descend", 1, |ctx, args| {
        let depth = args[0].to_i32()?;
        if depth == 0 {
            return Err(Error::host("bottom reached"));
        }
        ctx.call_global("descend", &[ctx.new_i32(depth - 1)])
    })
    .unwrap();

    match rt.eval("descend(3)") {
        Err(Error::Eval { message, .. }) => assert!(message.contains("InternalError")),
        other => panic!("expected eval error, got {:?}", other),
    }
    assert!(!rt.has_exception());
    assert_still_usable(&rt);
}

#[test]
fn test_native_reentering_through_nested_eval() {
    let rt = runtime();
    let again = rt
        .new_function("again", |ctx, args| {
            let n = args[0].to_i32()?;
            if n <= 0 {
                return Ok(ctx.new_i32(0));
            }
            let inner = ctx.eval(&format!("again({})", n - 1))?;
            Ok(ctx.new_i32(inner.to_i32()? + 1))
        })
        .unwrap();
    rt.set_global_property("again", again).unwrap();
    let registered = rt.native_function_count();

    eval_i32_in(&rt, "again(50)", 50);

    assert!(matches!(rt.eval("again(1000000)"), Err(Error::Eval { .. })));
    assert!(!rt.has_exception());
    assert_eq!(rt.native_function_count(), registered);
    assert_still_usable(&rt);
    eval_i32_in(&rt, "again(10)", 10);
}

// ============================================================================
// Stack exhaustion
// ============================================================================

#[test]
fn test_unbounded_native_recursion_fails_cleanly() {
    let rt = runtime_with_reentrant_factorial();
    assert!(matches!(
        rt.eval("scriptFact(1e9)"),
        Err(Error::Eval { .. })
    ));
    assert!(!rt.has_exception());
    assert_still_usable(&rt);
    // Smaller depths still work after the overflow.
    assert_eq!(rt.eval("scriptFact(5)").unwrap().to_i32().unwrap(), 120);
}

#[test]
fn test_script_mutual_recursion_overflow() {
    let rt = runtime();
    rt.eval(
        "function isEven(n) { return n === 0 ? true : isOdd(n - 1); }\n\
         function isOdd(n) { return n === 0 ? false : isEven(n - 1); }",
    )
    .unwrap();

    assert!(rt.eval("isEven(10)").unwrap().to_bool().unwrap());
    assert_eval_error_contains(&rt, "isEven(1000000)", "stack");
    assert_still_usable(&rt);
}

#[test]
fn test_reduced_stack_limit() {
    let rt = runtime();
    rt.eval("function depth(n) { return n === 0 ? 0 : 1 + depth(n - 1); }")
        .unwrap();
    eval_i32_in(&rt, "depth(200)", 200);

    rt.set_max_stack_size(16 * 1024);
    assert!(matches!(rt.eval("depth(100000)"), Err(Error::Eval { .. })));

    rt.set_max_stack_size(1024 * 1024);
    eval_i32_in(&rt, "depth(200)", 200);
}

#[test]
fn test_overflow_can_be_caught_by_script() {
    let rt = runtime();
    let result = rt
        .eval(
            "function forever() { return forever(); }\n\
             try { forever(); 'returned' } catch (e) { 'caught' }",
        )
        .unwrap();
    assert_eq!(result.to_string().unwrap(), "caught");
}
