//! Lua binding for wasm-lua.
//!
//! This crate builds the `wasm` Lua module on top of `wasm-lua-core`:
//! - [`lifecycle`]: Module and instance handles, `compile` and `instantiate`
//! - [`exports`]: Instance exports as a Lua table
//! - [`dispatch`]: Lua calls into export functions
//! - [`marshal`]: Lua values to and from WebAssembly values
//! - [`imports`]: Lua import tables
//! - [`bridge`]: Engine failures as `nil, message` results
//!
//! # Usage
//!
//! ```ignore
//! let lua = mlua::Lua::new();
//! wasm_lua_host::preload(&lua, &RuntimeConfig::default())?;
//! lua.load(r#"
//!     local wasm = require("wasm")
//!     local instance = assert(wasm.instantiate(bytes))
//!     print(instance:exports().add(1, 2))
//! "#).exec()?;
//! ```

pub mod bridge;
pub mod dispatch;
pub mod exports;
pub mod imports;
pub mod lifecycle;
pub mod marshal;

use mlua::{Error as LuaError, Lua, Result as LuaResult, Table};
use tracing::debug;

use wasm_lua_common::RuntimeConfig;
use wasm_lua_core::WasmEngine;

pub use lifecycle::{LuaInstance, LuaModule};

/// Name under which the module is registered in `package.loaded`.
pub const MODULE_NAME: &str = "wasm";

/// Build the `wasm` module table with the default configuration.
pub fn open(lua: &Lua) -> LuaResult<Table> {
    open_with_config(lua, &RuntimeConfig::default())
}

/// Build the `wasm` module table backed by a new engine.
///
/// # Errors
///
/// Fails if the engine cannot be created from `config`.
pub fn open_with_config(lua: &Lua, config: &RuntimeConfig) -> LuaResult<Table> {
    let engine = WasmEngine::new(config).map_err(LuaError::external)?;
    debug!(?engine, "Lua module opened");
    lifecycle::register(lua, engine)
}

/// Make `require("wasm")` return a module built from `config`.
pub fn preload(lua: &Lua, config: &RuntimeConfig) -> LuaResult<()> {
    let module = open_with_config(lua, config)?;
    let loaded: Table = lua.globals().get::<Table>("package")?.get("loaded")?;
    loaded.set(MODULE_NAME, module)
}

/// Entry point for `require("wasm")` from a stock Lua interpreter.
#[cfg(feature = "module")]
#[mlua::lua_module(name = "wasm")]
fn open_module(lua: &Lua) -> LuaResult<Table> {
    open(lua)
}
