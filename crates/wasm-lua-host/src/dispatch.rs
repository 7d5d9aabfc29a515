//! Lua calls into WebAssembly export functions.

use mlua::{Function, IntoLuaMulti, Lua, MultiValue, Result as LuaResult};
use tracing::trace;

use wasm_lua_common::RuntimeError;
use wasm_lua_core::{ExportFunction, Value};

use crate::{bridge, marshal};

/// Results of an export call, pushed as multiple Lua values.
pub struct CallResults(pub Vec<Value>);

impl IntoLuaMulti for CallResults {
    fn into_lua_multi(self, _lua: &Lua) -> LuaResult<MultiValue> {
        Ok(MultiValue::from_vec(
            self.0.into_iter().map(marshal::to_lua).collect(),
        ))
    }
}

/// Wrap an export function as a Lua function.
///
/// The closure owns the `ExportFunction`, and with it the export table and
/// the instance store, for as long as Lua can reach it.
pub fn create_function(lua: &Lua, function: ExportFunction) -> LuaResult<Function> {
    lua.create_function(move |lua, args: MultiValue| call(lua, &function, args))
}

/// Call `function` with Lua arguments.
///
/// Fewer arguments than declared raise an error; extra arguments are ignored.
/// Engine failures come back as `nil, message`.
pub fn call(lua: &Lua, function: &ExportFunction, args: MultiValue) -> LuaResult<MultiValue> {
    let signature = function.signature().map_err(|e| bridge::raise(&e))?;
    let declared = signature.params();

    if args.len() < declared.len() {
        let error = RuntimeError::arity(declared.len(), args.len());
        return Err(bridge::raise(&error));
    }

    let params = marshal::to_wasm_all(lua, args, declared, function.name())?;
    trace!(export = function.name(), %signature, "Dispatching call");

    bridge::dual_result(lua, || function.call(&params).map(CallResults))
}
