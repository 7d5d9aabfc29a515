//! Integration tests for wasm-lua-core.
//!
//! These tests drive the embedding contract end to end:
//! - WAT translation and compilation
//! - One-step and two-step instantiation
//! - Export enumeration and function calls
//! - Traps, fuel exhaustion and host imports
//! - Handle release ordering

use std::sync::Arc;

use wasm_lua_common::{RuntimeConfig, RuntimeError};
use wasm_lua_core::last_error::take_last_error;
use wasm_lua_core::{
    ExternKind, Handle, HostCallback, ImportObject, Instance, Value, WasmEngine, lock_engine,
    wat_to_binary,
};

const ARITHMETIC: &str = r#"
    (module
        (func (export "add") (param i32 i32) (result i32)
            (i32.add (local.get 0) (local.get 1)))
        (func (export "div") (param i32 i32) (result i32)
            (i32.div_s (local.get 0) (local.get 1)))
        (func (export "mix") (param i64 f32 f64) (result f64 i64)
            (f64.add (f64.promote_f32 (local.get 1)) (local.get 2))
            (local.get 0))
        (func (export "nothing"))
    )
"#;

fn engine() -> WasmEngine {
    WasmEngine::new(&RuntimeConfig::default()).unwrap()
}

fn arithmetic(engine: &WasmEngine) -> Instance {
    let bytes = wat_to_binary(ARITHMETIC).unwrap();
    engine.instantiate_bytes(&bytes, &ImportObject::new()).unwrap()
}

fn call(instance: &Instance, name: &str, args: &[Value]) -> Result<Vec<Value>, RuntimeError> {
    let table = Arc::new(instance.exports().unwrap());
    table.function(name).unwrap().call(args)
}

// ============================================================================
// Test: Export Calls
// ============================================================================

#[test]
fn test_add() {
    let engine = engine();
    let instance = arithmetic(&engine);

    let results = call(&instance, "add", &[Value::I32(1), Value::I32(2)]).unwrap();
    assert_eq!(results, vec![Value::I32(3)]);
}

#[test]
fn test_mixed_kinds_and_multiple_results() {
    let engine = engine();
    let instance = arithmetic(&engine);

    let results = call(
        &instance,
        "mix",
        &[Value::I64(-7), Value::F32(1.5), Value::F64(2.25)],
    )
    .unwrap();
    assert_eq!(results, vec![Value::F64(3.75), Value::I64(-7)]);
}

#[test]
fn test_no_results() {
    let engine = engine();
    let instance = arithmetic(&engine);

    assert!(call(&instance, "nothing", &[]).unwrap().is_empty());
}

#[test]
fn test_two_step_matches_one_step() {
    let engine = engine();
    let bytes = wat_to_binary(ARITHMETIC).unwrap();

    let module = engine.compile(&bytes).unwrap();
    let two_step = engine.instantiate(&module, &ImportObject::new()).unwrap();
    let one_step = engine.instantiate_bytes(&bytes, &ImportObject::new()).unwrap();

    let args = [Value::I32(20), Value::I32(22)];
    assert_eq!(
        call(&two_step, "add", &args).unwrap(),
        call(&one_step, "add", &args).unwrap()
    );
    assert_eq!(two_step.content_hash(), one_step.content_hash());
}

#[test]
fn test_arity_error() {
    let engine = engine();
    let instance = arithmetic(&engine);

    let err = call(&instance, "add", &[Value::I32(1)]).unwrap_err();

    assert!(matches!(
        err,
        RuntimeError::Arity {
            expected: 2,
            actual: 1
        }
    ));
    assert!(err.is_usage_error());
}

#[test]
fn test_extra_arguments_ignored() {
    let engine = engine();
    let instance = arithmetic(&engine);

    let results = call(
        &instance,
        "add",
        &[Value::I32(1), Value::I32(2), Value::F64(99.0)],
    )
    .unwrap();
    assert_eq!(results, vec![Value::I32(3)]);
}

#[test]
fn test_argument_kind_mismatch() {
    let engine = engine();
    let instance = arithmetic(&engine);

    let err = call(&instance, "add", &[Value::I32(1), Value::I64(2)]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "type mismatch for argument #2: expected i32, got i64"
    );
}

// ============================================================================
// Test: Failures
// ============================================================================

#[test]
fn test_compile_empty_bytes() {
    let engine = engine();

    let _guard = lock_engine();
    let err = engine.compile(&[]).unwrap_err();

    assert!(matches!(err, RuntimeError::CompilationFailed { .. }));
    let message = take_last_error().unwrap();
    assert!(!message.is_empty());
}

#[test]
fn test_trap_divide_by_zero() {
    let engine = engine();
    let instance = arithmetic(&engine);

    let _guard = lock_engine();
    let err = call(&instance, "div", &[Value::I32(1), Value::I32(0)]).unwrap_err();

    assert!(err.is_trap());
    assert!(take_last_error().unwrap().contains("divide by zero"));

    let metrics = instance.metrics().unwrap();
    assert_eq!(metrics.calls, 1);
    assert_eq!(metrics.traps, 1);
}

#[test]
fn test_instance_usable_after_trap() {
    let engine = engine();
    let instance = arithmetic(&engine);

    call(&instance, "div", &[Value::I32(1), Value::I32(0)]).unwrap_err();
    let results = call(&instance, "div", &[Value::I32(9), Value::I32(3)]).unwrap();

    assert_eq!(results, vec![Value::I32(3)]);
}

#[test]
fn test_fuel_exhaustion() {
    let mut config = RuntimeConfig::default();
    config.execution.fuel_metering = true;
    config.execution.max_fuel = 10_000;
    let engine = WasmEngine::new(&config).unwrap();

    let bytes = wat_to_binary(
        r#"
        (module
            (func (export "spin")
                (loop $forever (br $forever)))
            (func (export "one") (result i32) (i32.const 1))
        )
    "#,
    )
    .unwrap();
    let instance = engine.instantiate_bytes(&bytes, &ImportObject::new()).unwrap();

    let err = call(&instance, "spin", &[]).unwrap_err();
    assert!(matches!(err, RuntimeError::FuelExhausted));

    // Each call starts with a full budget
    assert_eq!(call(&instance, "one", &[]).unwrap(), vec![Value::I32(1)]);
    assert!(instance.metrics().unwrap().fuel_consumed >= 10_000);
}

#[test]
fn test_unresolved_import() {
    let engine = engine();
    let bytes = wat_to_binary(
        r#"
        (module
            (import "env" "missing" (func))
        )
    "#,
    )
    .unwrap();

    let err = engine
        .instantiate_bytes(&bytes, &ImportObject::new())
        .unwrap_err();

    assert!(matches!(err, RuntimeError::InstantiationFailed { .. }));
    assert!(err.to_string().contains("missing"));
}

#[test]
fn test_start_function_trap() {
    let engine = engine();
    let bytes = wat_to_binary(
        r#"
        (module
            (func $boom unreachable)
            (start $boom)
        )
    "#,
    )
    .unwrap();

    let err = engine
        .instantiate_bytes(&bytes, &ImportObject::new())
        .unwrap_err();
    assert!(err.to_string().contains("unreachable"));
}

// ============================================================================
// Test: Imports
// ============================================================================

const IMPORTING: &str = r#"
    (module
        (import "env" "scale" (func $scale (param i32) (result i32)))
        (func (export "run") (param i32) (result i32)
            (i32.add (call $scale (local.get 0)) (i32.const 1)))
    )
"#;

#[test]
fn test_host_import() {
    let engine = engine();
    let bytes = wat_to_binary(IMPORTING).unwrap();

    let scale: HostCallback = Arc::new(|args: &[Value]| match args {
        [Value::I32(v)] => Ok(vec![Value::I32(v * 10)]),
        other => Err(format!("unexpected arguments: {other:?}")),
    });
    let mut imports = ImportObject::new();
    imports.insert_function("env", "scale", scale);

    let instance = engine.instantiate_bytes(&bytes, &imports).unwrap();
    assert_eq!(
        call(&instance, "run", &[Value::I32(4)]).unwrap(),
        vec![Value::I32(41)]
    );
}

#[test]
fn test_host_import_failure_is_trap() {
    let engine = engine();
    let bytes = wat_to_binary(IMPORTING).unwrap();

    let failing: HostCallback =
        Arc::new(|_: &[Value]| -> Result<Vec<Value>, String> { Err("nope".to_string()) });
    let mut imports = ImportObject::new();
    imports.insert_function("env", "scale", failing);

    let instance = engine.instantiate_bytes(&bytes, &imports).unwrap();
    let err = call(&instance, "run", &[Value::I32(4)]).unwrap_err();

    assert!(err.is_trap());
    assert!(err.to_string().contains("import `env::scale` failed: nope"));
}

#[test]
fn test_reentrant_call_is_busy() {
    let engine = engine();
    let bytes = wat_to_binary(IMPORTING).unwrap();

    // The callback reaches back into the instance that is calling it
    let slot: Arc<parking_lot::Mutex<Option<Instance>>> = Arc::default();
    let inner = Arc::clone(&slot);
    let reenter: HostCallback = Arc::new(move |_: &[Value]| -> Result<Vec<Value>, String> {
        let guard = inner.lock();
        let instance = guard.as_ref().ok_or("not ready")?;
        match instance.exports() {
            Err(RuntimeError::InstanceBusy) => Ok(vec![Value::I32(0)]),
            other => Err(format!("expected busy, got {other:?}")),
        }
    });
    let mut imports = ImportObject::new();
    imports.insert_function("env", "scale", reenter);

    let instance = engine.instantiate_bytes(&bytes, &imports).unwrap();
    *slot.lock() = Some(instance.clone());

    assert_eq!(
        call(&instance, "run", &[Value::I32(4)]).unwrap(),
        vec![Value::I32(1)]
    );
    slot.lock().take();
}

// ============================================================================
// Test: Export Table
// ============================================================================

#[test]
fn test_non_function_exports() {
    let engine = engine();
    let bytes = wat_to_binary(
        r#"
        (module
            (memory (export "memory") 1)
            (global (export "answer") i32 (i32.const 42))
            (table (export "table") 1 funcref)
            (func (export "f"))
        )
    "#,
    )
    .unwrap();
    let instance = engine.instantiate_bytes(&bytes, &ImportObject::new()).unwrap();
    let table = Arc::new(instance.exports().unwrap());

    let kinds: Vec<_> = table
        .iter()
        .map(|export| (export.name().to_string(), export.kind()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("memory".to_string(), ExternKind::Memory),
            ("answer".to_string(), ExternKind::Global),
            ("table".to_string(), ExternKind::Table),
            ("f".to_string(), ExternKind::Function),
        ]
    );

    assert!(table.function("memory").is_none());
    assert!(table.function("f").is_some());
    assert!(table.function("absent").is_none());
}

#[test]
fn test_unsupported_signature_fails_at_call() {
    let engine = engine();
    let bytes = wat_to_binary(
        r#"
        (module
            (func (export "vec") (param v128))
        )
    "#,
    )
    .unwrap();
    let instance = engine.instantiate_bytes(&bytes, &ImportObject::new()).unwrap();
    let table = Arc::new(instance.exports().unwrap());
    let function = table.function("vec").unwrap();

    let err = function.call(&[]).unwrap_err();
    assert!(matches!(err, RuntimeError::UnsupportedType { .. }));
}

// ============================================================================
// Test: Release Ordering
// ============================================================================

#[test]
fn test_function_outlives_instance_handle() {
    let engine = engine();
    let mut handle = Handle::new("instance", arithmetic(&engine));

    let table = Arc::new(handle.get().unwrap().exports().unwrap());
    let add = table.function("add").unwrap();
    drop(table);

    assert!(handle.release());
    assert!(handle.get().is_err());

    assert_eq!(
        add.call(&[Value::I32(2), Value::I32(3)]).unwrap(),
        vec![Value::I32(5)]
    );
}

#[test]
fn test_module_released_before_instance() {
    let engine = engine();
    let bytes = wat_to_binary(ARITHMETIC).unwrap();

    let mut module = Handle::new("module", engine.compile(&bytes).unwrap());
    let instance = engine
        .instantiate(module.get().unwrap(), &ImportObject::new())
        .unwrap();
    module.release();

    assert_eq!(
        call(&instance, "add", &[Value::I32(1), Value::I32(1)]).unwrap(),
        vec![Value::I32(2)]
    );
}
