//! Engine failures as Lua dual results.
//!
//! A bridged operation returns its value on success. A recoverable failure
//! (compile, instantiate, trap) becomes `nil, message`, with the message
//! taken from the last-error register. Usage errors (arity, argument type,
//! released handle) are raised as Lua errors instead.

use mlua::{Error as LuaError, IntoLuaMulti, Lua, MultiValue, Result as LuaResult, Value as LuaValue};
use tracing::debug;

use wasm_lua_common::RuntimeError;
use wasm_lua_core::last_error::take_last_error;
use wasm_lua_core::lock_engine;

/// Run `operation` and convert its outcome into Lua return values.
///
/// The engine lock is held across the operation and the read of the
/// last-error register, so the message always belongs to this failure.
pub fn dual_result<T: IntoLuaMulti>(
    lua: &Lua,
    operation: impl FnOnce() -> Result<T, RuntimeError>,
) -> LuaResult<MultiValue> {
    let _guard = lock_engine();

    // Stale message from a failure nobody read
    take_last_error();

    match operation() {
        Ok(value) => value.into_lua_multi(lua),
        Err(error) if error.is_usage_error() => Err(raise(&error)),
        Err(error) => {
            let message = take_last_error().unwrap_or_else(|| error.to_string());
            debug!(error = %message, trap = error.is_trap(), "Returning engine failure to Lua");
            (LuaValue::Nil, message).into_lua_multi(lua)
        }
    }
}

/// Lua error for a failure that is raised rather than returned.
pub fn raise(error: &RuntimeError) -> LuaError {
    LuaError::RuntimeError(error.to_string())
}
