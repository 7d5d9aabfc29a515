//! Export enumeration and the engine call primitive.
//!
//! An [`ExportTable`] is a snapshot of an instance's exports. It shares
//! ownership of the instance's store, so an [`ExportFunction`] (which holds
//! the table through an `Arc`) stays callable for as long as it is reachable,
//! even after the owning instance handle has been released.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, instrument, warn};
use wasmtime::{Extern, Func, Store, Trap, Val};

use wasm_lua_common::RuntimeError;

use crate::engine::{describe_error, engine_call};
use crate::instance::InstanceState;
use crate::module::ExternKind;
use crate::store::{HostState, calculate_fuel_consumed, get_remaining_fuel, refuel};
use crate::value::{FuncSignature, Value};

/// A single named export.
pub struct Export {
    name: String,
    kind: ExternKind,
    function: Option<ExportedFunc>,
}

struct ExportedFunc {
    func: Func,
    /// The error names the first unsupported value type.
    signature: Result<FuncSignature, String>,
}

impl Export {
    fn new(name: String, ext: Extern, store: &Store<HostState>) -> Self {
        let (kind, function) = match ext {
            Extern::Func(func) => {
                let signature = FuncSignature::from_func_type(&func.ty(store));
                (ExternKind::Function, Some(ExportedFunc { func, signature }))
            }
            Extern::Global(_) => (ExternKind::Global, None),
            Extern::Memory(_) | Extern::SharedMemory(_) => (ExternKind::Memory, None),
            Extern::Table(_) => (ExternKind::Table, None),
            #[allow(unreachable_patterns)]
            _ => panic!("engine reported export `{name}` of unknown kind"),
        };

        Self {
            name,
            kind,
            function,
        }
    }

    /// Export name as declared by the module.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ExternKind {
        self.kind
    }

    pub fn is_function(&self) -> bool {
        self.function.is_some()
    }
}

/// Every export of one instance.
pub struct ExportTable {
    instance: Arc<Mutex<InstanceState>>,
    exports: Vec<Export>,
}

impl ExportTable {
    pub(crate) fn build(instance: Arc<Mutex<InstanceState>>) -> Result<Self, RuntimeError> {
        let exports = {
            let mut guard = instance.try_lock().ok_or(RuntimeError::InstanceBusy)?;
            let InstanceState {
                store,
                instance: wasm_instance,
                ..
            } = &mut *guard;

            let externs: Vec<(String, Extern)> = wasm_instance
                .exports(&mut *store)
                .map(|export| (export.name().to_string(), export.into_extern()))
                .collect();

            externs
                .into_iter()
                .map(|(name, ext)| Export::new(name, ext, &*store))
                .collect::<Vec<_>>()
        };

        debug!(exports = exports.len(), "Export table built");

        Ok(Self { instance, exports })
    }

    pub fn len(&self) -> usize {
        self.exports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }

    /// Iterate exports in the order the engine reports them.
    pub fn iter(&self) -> impl Iterator<Item = &Export> {
        self.exports.iter()
    }

    /// Look up an export by name.
    pub fn get(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|export| export.name == name)
    }

    /// Callable reference to the function export at `index`.
    ///
    /// Returns `None` if `index` is out of range or not a function.
    pub fn function_at(self: &Arc<Self>, index: usize) -> Option<ExportFunction> {
        self.exports
            .get(index)
            .filter(|export| export.is_function())
            .map(|_| ExportFunction {
                table: Arc::clone(self),
                index,
            })
    }

    /// Callable reference to the function export named `name`.
    pub fn function(self: &Arc<Self>, name: &str) -> Option<ExportFunction> {
        let index = self.exports.iter().position(|export| export.name == name)?;
        self.function_at(index)
    }
}

impl std::fmt::Debug for ExportTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.exports.iter().map(|export| (&export.name, export.kind)))
            .finish()
    }
}

/// A function export, bound to the table that keeps it valid.
#[derive(Clone)]
pub struct ExportFunction {
    table: Arc<ExportTable>,
    index: usize,
}

impl ExportFunction {
    fn export(&self) -> &Export {
        &self.table.exports[self.index]
    }

    fn exported(&self) -> &ExportedFunc {
        match &self.export().function {
            Some(function) => function,
            None => unreachable!("ExportFunction always points at a function export"),
        }
    }

    pub fn name(&self) -> &str {
        &self.export().name
    }

    /// Declared parameter and result kinds.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::UnsupportedType`] if the signature uses a type
    /// outside i32/i64/f32/f64.
    pub fn signature(&self) -> Result<&FuncSignature, RuntimeError> {
        self.exported()
            .signature
            .as_ref()
            .map_err(|ty| RuntimeError::unsupported_type(ty.clone()))
    }

    /// Invoke the function.
    ///
    /// Arguments beyond the declared arity are ignored; results come back in
    /// declared order.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::Arity`] if fewer arguments than declared were supplied
    /// - [`RuntimeError::TypeMismatch`] if an argument has the wrong kind
    /// - [`RuntimeError::Trap`] / [`RuntimeError::FuelExhausted`] if execution faults
    /// - [`RuntimeError::InstanceBusy`] on re-entrant use of the same instance
    ///
    /// # Panics
    ///
    /// Panics if the engine returns a value outside the declared signature.
    #[instrument(skip_all, fields(export = %self.name(), args = params.len()))]
    pub fn call(&self, params: &[Value]) -> Result<Vec<Value>, RuntimeError> {
        engine_call("call", || {
            let signature = self.signature()?;
            let declared = signature.params();

            if params.len() < declared.len() {
                return Err(RuntimeError::arity(declared.len(), params.len()));
            }

            let args = params
                .iter()
                .zip(declared)
                .enumerate()
                .map(|(position, (value, kind))| {
                    if value.kind() == *kind {
                        Ok(Val::from(*value))
                    } else {
                        Err(RuntimeError::TypeMismatch {
                            position: position + 1,
                            expected: kind.to_string(),
                            actual: value.kind().to_string(),
                        })
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;

            let mut guard = self
                .table
                .instance
                .try_lock()
                .ok_or(RuntimeError::InstanceBusy)?;
            let state = &mut *guard;

            refuel(&mut state.store, &state.execution)?;
            let initial_fuel = get_remaining_fuel(&state.store).unwrap_or(0);
            let start = Instant::now();

            let mut results: Vec<Val> = signature.results().iter().map(|_| Val::I32(0)).collect();
            let outcome = self
                .exported()
                .func
                .call(&mut state.store, &args, &mut results);

            let fuel_consumed = calculate_fuel_consumed(initial_fuel, &state.store);
            let metrics = &mut state.store.data_mut().metrics;
            metrics.calls += 1;
            metrics.fuel_consumed += fuel_consumed;

            match outcome {
                Ok(()) => {
                    debug!(
                        duration_us = start.elapsed().as_micros(),
                        fuel_consumed, "Export call completed"
                    );
                    Ok(self.collect_results(signature, &results))
                }
                Err(error) => {
                    metrics.traps += 1;
                    let error = classify_call_error(&error);
                    warn!(error = %error, "Export call failed");
                    Err(error)
                }
            }
        })
    }

    fn collect_results(&self, signature: &FuncSignature, results: &[Val]) -> Vec<Value> {
        results
            .iter()
            .zip(signature.results())
            .map(|(val, kind)| match Value::from_val(val) {
                Some(value) if value.kind() == *kind => value,
                _ => panic!(
                    "engine returned a value outside the declared signature of `{}`",
                    self.name()
                ),
            })
            .collect()
    }
}

impl std::fmt::Debug for ExportFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportFunction")
            .field("name", &self.name())
            .field("signature", &self.exported().signature)
            .finish()
    }
}

/// Map a failed call to the error taxonomy.
fn classify_call_error(error: &wasmtime::Error) -> RuntimeError {
    if is_out_of_fuel(error) {
        RuntimeError::FuelExhausted
    } else {
        RuntimeError::trap(describe_error(error))
    }
}

/// Check if an error is due to fuel exhaustion.
fn is_out_of_fuel(error: &wasmtime::Error) -> bool {
    error
        .downcast_ref::<Trap>()
        .is_some_and(|trap| *trap == Trap::OutOfFuel)
}
