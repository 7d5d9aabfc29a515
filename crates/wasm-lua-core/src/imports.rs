//! Host-provided imports.
//!
//! An [`ImportObject`] maps `(module, name)` to a [`HostCallback`]. At
//! instantiation every function import the module declares and the object
//! provides is linked as a host function with the declared signature. Imports
//! the object does not provide are left to the engine, which reports them as
//! unknown and fails the instantiation.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use wasmtime::{Caller, Linker, Val};

use wasm_lua_common::RuntimeError;

use crate::module::CompiledModule;
use crate::store::HostState;
use crate::value::{FuncSignature, Value};

/// Host implementation of a function import.
///
/// Receives the arguments in declared order and returns the results; an
/// `Err` becomes the failure of the guest call that reached the import.
pub type HostCallback = Arc<dyn Fn(&[Value]) -> Result<Vec<Value>, String> + Send + Sync>;

/// Resolved mapping of import name to host implementation.
#[derive(Clone, Default)]
pub struct ImportObject {
    functions: HashMap<(String, String), HostCallback>,
}

impl ImportObject {
    /// Create an empty import object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provide a function import, replacing any previous one with the same name.
    pub fn insert_function(
        &mut self,
        module: impl Into<String>,
        name: impl Into<String>,
        callback: HostCallback,
    ) {
        self.functions
            .insert((module.into(), name.into()), callback);
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Define every provided import that `module` declares on `linker`.
    pub(crate) fn define(
        &self,
        linker: &mut Linker<HostState>,
        module: &CompiledModule,
    ) -> Result<(), RuntimeError> {
        for import in module.imports() {
            let key = (import.module.clone(), import.name.clone());
            let Some(callback) = self.functions.get(&key) else {
                continue;
            };

            let Some(func_type) = import.func_type() else {
                return Err(RuntimeError::import_failed(
                    &import.module,
                    &import.name,
                    format!("module expects a {} import, got a function", import.kind),
                ));
            };

            let signature = FuncSignature::from_func_type(func_type).map_err(|ty| {
                RuntimeError::import_failed(
                    &import.module,
                    &import.name,
                    format!("unsupported value type: {ty}"),
                )
            })?;

            let callback = Arc::clone(callback);
            let (module_name, field_name) = key;
            let label = format!("{module_name}::{field_name}");

            linker
                .func_new(
                    &module_name,
                    &field_name,
                    func_type.clone(),
                    move |_caller: Caller<'_, HostState>, params: &[Val], results: &mut [Val]| {
                        invoke_callback(&callback, &signature, params, results).map_err(
                            |reason| wasmtime::Error::msg(format!("import `{label}` failed: {reason}")),
                        )
                    },
                )
                .map_err(|e| {
                    RuntimeError::import_failed(&import.module, &import.name, e.to_string())
                })?;

            debug!(module = %import.module, name = %import.name, "Host function linked");
        }

        Ok(())
    }
}

/// Run a host callback against engine-typed parameters and result slots.
fn invoke_callback(
    callback: &HostCallback,
    signature: &FuncSignature,
    params: &[Val],
    results: &mut [Val],
) -> Result<(), String> {
    let args = params
        .iter()
        .map(|val| Value::from_val(val).ok_or_else(|| "unsupported argument type".to_string()))
        .collect::<Result<Vec<_>, _>>()?;

    let returned = callback(&args)?;

    if returned.len() != results.len() {
        return Err(format!(
            "expected {} results, got {}",
            results.len(),
            returned.len()
        ));
    }

    for (position, ((slot, value), kind)) in results
        .iter_mut()
        .zip(&returned)
        .zip(signature.results())
        .enumerate()
    {
        if value.kind() != *kind {
            return Err(format!(
                "result #{} must be {kind}, got {}",
                position + 1,
                value.kind()
            ));
        }
        *slot = Val::from(*value);
    }

    Ok(())
}

impl std::fmt::Debug for ImportObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self
            .functions
            .keys()
            .map(|(module, name)| format!("{module}::{name}"))
            .collect();
        names.sort();

        f.debug_struct("ImportObject")
            .field("functions", &names)
            .finish()
    }
}
