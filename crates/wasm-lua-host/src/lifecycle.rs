//! Module and instance handles.
//!
//! Every successful `compile` or `instantiate` creates exactly one userdata
//! owning a [`Handle`]. The handle is released by `:release()`, by a
//! to-be-closed variable going out of scope, or by the garbage collector,
//! whichever comes first; later releases do nothing.

use std::sync::Arc;

use mlua::{
    IntoLua, Lua, MetaMethod, MultiValue, Result as LuaResult, String as LuaString, Table,
    UserData, UserDataMethods, Value as LuaValue,
};
use tracing::info;

use wasm_lua_common::RuntimeError;
use wasm_lua_core::{
    CompiledModule, ExecutionMetrics, Handle, ImportObject, Instance, WasmEngine, wat_to_binary,
};

use crate::bridge::{self, dual_result};
use crate::exports::LuaExports;
use crate::imports;

/// Lua handle for a compiled module.
pub struct LuaModule {
    engine: WasmEngine,
    handle: Handle<CompiledModule>,
}

impl LuaModule {
    pub fn new(engine: WasmEngine, module: CompiledModule) -> Self {
        Self {
            engine,
            handle: Handle::new("module", module),
        }
    }

    fn module(&self) -> LuaResult<&CompiledModule> {
        self.handle.get().map_err(|e| bridge::raise(&e))
    }
}

impl UserData for LuaModule {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("instantiate", |lua, this, imports: Option<Table>| {
            dual_result(lua, || {
                let module = this.handle.get()?;
                instantiate_module(lua, &this.engine, module, imports.as_ref())
            })
        });

        methods.add_method("imports", |lua, this, ()| {
            let imports = this.module()?.imports();
            let list = lua.create_table_with_capacity(imports.len(), 0)?;
            for import in imports {
                let entry = lua.create_table()?;
                entry.set("module", lua.create_string(&import.module)?)?;
                entry.set("name", lua.create_string(&import.name)?)?;
                entry.set("kind", import.kind.as_str())?;
                list.push(entry)?;
            }
            Ok(list)
        });

        methods.add_method("exports", |lua, this, ()| {
            let exports = this.module()?.exports();
            let list = lua.create_table_with_capacity(exports.len(), 0)?;
            for export in exports {
                let entry = lua.create_table()?;
                entry.set("name", lua.create_string(&export.name)?)?;
                entry.set("kind", export.kind.as_str())?;
                list.push(entry)?;
            }
            Ok(list)
        });

        methods.add_method_mut("release", |_, this, ()| {
            this.handle.release();
            Ok(true)
        });

        methods.add_method("is_released", |_, this, ()| Ok(this.handle.is_released()));

        methods.add_meta_method_mut(MetaMethod::Close, |_, this, _: MultiValue| {
            this.handle.release();
            Ok(())
        });

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(match this.handle.get() {
                Ok(module) => format!("wasm.Module({})", module.content_hash()),
                Err(_) => "wasm.Module(released)".to_string(),
            })
        });
    }
}

/// Lua handle for an instance.
pub struct LuaInstance {
    handle: Handle<Instance>,
}

impl LuaInstance {
    pub fn new(instance: Instance) -> Self {
        Self {
            handle: Handle::new("instance", instance),
        }
    }
}

impl UserData for LuaInstance {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("exports", |lua, this, ()| {
            dual_result(lua, || {
                let table = this.handle.get()?.exports()?;
                Ok(LuaExports(Arc::new(table)))
            })
        });

        methods.add_method("metrics", |lua, this, ()| {
            dual_result(lua, || this.handle.get()?.metrics().map(Metrics))
        });

        methods.add_method_mut("release", |_, this, ()| {
            this.handle.release();
            Ok(true)
        });

        methods.add_method("is_released", |_, this, ()| Ok(this.handle.is_released()));

        methods.add_meta_method_mut(MetaMethod::Close, |_, this, _: MultiValue| {
            this.handle.release();
            Ok(())
        });

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(match this.handle.get() {
                Ok(instance) => format!("wasm.Instance({})", instance.content_hash()),
                Err(_) => "wasm.Instance(released)".to_string(),
            })
        });
    }
}

/// Execution counters as `{ calls, traps, fuel_consumed }`.
struct Metrics(ExecutionMetrics);

impl IntoLua for Metrics {
    fn into_lua(self, lua: &Lua) -> LuaResult<LuaValue> {
        let table = lua.create_table_with_capacity(0, 3)?;
        table.set("calls", self.0.calls)?;
        table.set("traps", self.0.traps)?;
        table.set("fuel_consumed", self.0.fuel_consumed)?;
        Ok(LuaValue::Table(table))
    }
}

/// Bytecode returned to Lua as a string.
struct Bytecode(Vec<u8>);

impl IntoLua for Bytecode {
    fn into_lua(self, lua: &Lua) -> LuaResult<LuaValue> {
        lua.create_string(self.0).map(LuaValue::String)
    }
}

fn instantiate_module(
    lua: &Lua,
    engine: &WasmEngine,
    module: &CompiledModule,
    imports: Option<&Table>,
) -> Result<LuaInstance, RuntimeError> {
    let imports = imports::build(lua, module, imports)?;
    engine.instantiate(module, &imports).map(LuaInstance::new)
}

/// Build the `wasm` module table around `engine`.
pub(crate) fn register(lua: &Lua, engine: WasmEngine) -> LuaResult<Table> {
    let wasm = lua.create_table()?;

    let compile_engine = engine.clone();
    wasm.set(
        "compile",
        lua.create_function(move |lua, bytes: LuaString| {
            dual_result(lua, || {
                let module = compile_engine.compile(&bytes.as_bytes())?;
                info!(content_hash = %module.content_hash(), "Module compiled from Lua");
                Ok(LuaModule::new(compile_engine.clone(), module))
            })
        })?,
    )?;

    let instantiate_engine = engine.clone();
    wasm.set(
        "instantiate",
        lua.create_function(move |lua, (bytes, imports): (LuaString, Option<Table>)| {
            dual_result(lua, || match imports {
                None => instantiate_engine
                    .instantiate_bytes(&bytes.as_bytes(), &ImportObject::new())
                    .map(LuaInstance::new),
                Some(imports) => {
                    let module = instantiate_engine.compile(&bytes.as_bytes())?;
                    instantiate_module(lua, &instantiate_engine, &module, Some(&imports))
                }
            })
        })?,
    )?;

    let validate_engine = engine;
    wasm.set(
        "validate",
        lua.create_function(move |lua, bytes: LuaString| {
            dual_result(lua, || validate_engine.validate(&bytes.as_bytes()).map(|()| true))
        })?,
    )?;

    wasm.set(
        "wat",
        lua.create_function(|lua, text: LuaString| {
            dual_result(lua, || wat_to_binary(&*text.as_bytes()).map(Bytecode))
        })?,
    )?;

    wasm.set("version", env!("CARGO_PKG_VERSION"))?;

    Ok(wasm)
}
