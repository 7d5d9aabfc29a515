//! Lua import tables.
//!
//! An import table has the shape `{ [module] = { [name] = function } }`. Each
//! provided Lua function is wrapped as a [`HostCallback`] with the signature
//! the module declares for that import.
//!
//! Lua functions cannot leave the thread of their Lua state, while host
//! callbacks must be `Send + Sync`. The Lua side therefore lives in a
//! thread-local registry and the callback only carries its registry slot.
//! The slot is freed when the instance store that links the callback is
//! dropped on the Lua thread.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use mlua::{
    AnyUserData, Error as LuaError, Function, Lua, MultiValue, Result as LuaResult, Table,
    UserData, Value as LuaValue,
};
use tracing::{debug, trace};

use wasm_lua_common::RuntimeError;
use wasm_lua_core::{
    CompiledModule, ExternKind, FuncSignature, HostCallback, ImportDescriptor, ImportObject, Value,
};

use crate::marshal;

thread_local! {
    static CALLBACKS: RefCell<HashMap<u64, Function>> = RefCell::new(HashMap::new());
}

static NEXT_CALLBACK_ID: AtomicU64 = AtomicU64::new(1);

/// Resolve `imports` against the imports `module` declares.
///
/// Imports the table does not provide are left out; the engine reports them
/// when instantiating.
///
/// # Errors
///
/// Returns [`RuntimeError::ImportFailed`] if a provided value does not fit
/// the declared import.
pub fn build(
    lua: &Lua,
    module: &CompiledModule,
    imports: Option<&Table>,
) -> Result<ImportObject, RuntimeError> {
    let mut object = ImportObject::new();
    let Some(imports) = imports else {
        return Ok(object);
    };

    for import in module.imports() {
        let provided = lookup(imports, &import)
            .map_err(|e| RuntimeError::import_failed(&import.module, &import.name, e.to_string()))?;

        let callback = match (provided, import.kind) {
            (LuaValue::Nil, _) => continue,
            (LuaValue::Function(function), ExternKind::Function) => {
                wrap(lua, &import, function)?
            }
            (other, ExternKind::Function) => {
                return Err(RuntimeError::import_failed(
                    &import.module,
                    &import.name,
                    format!("expected a function, got {}", other.type_name()),
                ));
            }
            (_, kind) => {
                return Err(RuntimeError::import_failed(
                    &import.module,
                    &import.name,
                    format!("{kind} imports cannot be provided from Lua"),
                ));
            }
        };

        object.insert_function(import.module.clone(), import.name.clone(), callback);
    }

    debug!(provided = object.len(), "Import table resolved");
    Ok(object)
}

/// `imports[module][name]`, or nil when either level is absent.
fn lookup(imports: &Table, import: &ImportDescriptor) -> LuaResult<LuaValue> {
    match imports.get::<LuaValue>(import.module.as_str())? {
        LuaValue::Table(names) => names.get(import.name.as_str()),
        LuaValue::Nil => Ok(LuaValue::Nil),
        other => Err(LuaError::RuntimeError(format!(
            "import module `{}` must be a table, got {}",
            import.module,
            other.type_name()
        ))),
    }
}

/// Values returned by a Lua import, already converted to the declared kinds.
struct ImportResults(Vec<Value>);

impl UserData for ImportResults {}

fn wrap(lua: &Lua, import: &ImportDescriptor, user: Function) -> Result<HostCallback, RuntimeError> {
    let fail = |reason: String| RuntimeError::import_failed(&import.module, &import.name, reason);

    let signature: FuncSignature = match import.signature() {
        Some(Ok(signature)) => signature,
        Some(Err(ty)) => return Err(fail(format!("unsupported value type: {ty}"))),
        None => return Err(fail("not a function import".to_string())),
    };

    let label = format!("{}::{}", import.module, import.name);
    let results = signature.results().to_vec();

    // Results are marshaled inside Lua, where the coercion rules are available
    let adapter = lua
        .create_function(move |lua, args: MultiValue| {
            let returned: MultiValue = user.call(args)?;
            if returned.len() < results.len() {
                return Err(LuaError::RuntimeError(format!(
                    "expected {} results, got {}",
                    results.len(),
                    returned.len()
                )));
            }
            let values = marshal::to_wasm_all(lua, returned, &results, &label)?;
            Ok(ImportResults(values))
        })
        .map_err(|e| fail(e.to_string()))?;

    let slot = Arc::new(CallbackSlot::register(adapter));
    Ok(Arc::new(move |args: &[Value]| slot.invoke(args)))
}

/// Registry entry owned by one host callback.
struct CallbackSlot {
    id: u64,
}

impl CallbackSlot {
    fn register(function: Function) -> Self {
        let id = NEXT_CALLBACK_ID.fetch_add(1, Ordering::Relaxed);
        CALLBACKS.with(|callbacks| callbacks.borrow_mut().insert(id, function));
        trace!(id, "Import callback registered");
        Self { id }
    }

    fn invoke(&self, args: &[Value]) -> Result<Vec<Value>, String> {
        let function = CALLBACKS
            .with(|callbacks| callbacks.borrow().get(&self.id).cloned())
            .ok_or_else(|| "Lua callback is not reachable from this thread".to_string())?;

        let args = MultiValue::from_vec(args.iter().copied().map(marshal::to_lua).collect());
        let results: AnyUserData = function.call(args).map_err(|e| describe(&e))?;
        let ImportResults(values) = results.take().map_err(|e| describe(&e))?;

        Ok(values)
    }
}

impl Drop for CallbackSlot {
    fn drop(&mut self) {
        // The registry may already be gone during thread teardown
        let removed = CALLBACKS.try_with(|callbacks| {
            callbacks
                .try_borrow_mut()
                .map(|mut callbacks| callbacks.remove(&self.id))
        });
        if !matches!(removed, Ok(Ok(Some(_)))) {
            debug!(id = self.id, "Import callback slot not freed");
        }
    }
}

/// Error text without the Lua tracebacks added at each callback boundary.
fn describe(error: &LuaError) -> String {
    match error {
        LuaError::CallbackError { cause, .. } => describe(cause),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_lifecycle() {
        let lua = Lua::new();
        let function = lua.create_function(|_, ()| Ok(())).unwrap();

        let slot = CallbackSlot::register(function);
        let id = slot.id;
        assert!(CALLBACKS.with(|callbacks| callbacks.borrow().contains_key(&id)));

        drop(slot);
        assert!(!CALLBACKS.with(|callbacks| callbacks.borrow().contains_key(&id)));
    }

    #[test]
    fn test_describe_unwraps_callback_errors() {
        let error = LuaError::CallbackError {
            traceback: "stack traceback: ...".to_string(),
            cause: Arc::new(LuaError::RuntimeError("boom".to_string())),
        };

        assert_eq!(describe(&error), "boom");
    }

    #[test]
    fn test_invoke_round_trips_through_lua() {
        let lua = Lua::new();
        let function = lua
            .create_function(|_, (a, b): (i64, i64)| {
                Ok(ImportResults(vec![Value::I64(a + b)]))
            })
            .unwrap();

        let slot = CallbackSlot::register(function);
        let results = slot.invoke(&[Value::I32(2), Value::I64(40)]).unwrap();

        assert_eq!(results, vec![Value::I64(42)]);
    }
}
