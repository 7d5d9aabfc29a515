//! Instance exports as a Lua table.
//!
//! Function exports become callable Lua functions. Globals, memories and
//! tables are reported by presence only, as the strings `"<global>"`,
//! `"<memory>"` and `"<table>"`.

use std::sync::Arc;

use mlua::{IntoLua, Lua, Result as LuaResult, Value as LuaValue};

use wasm_lua_core::ExportTable;

use crate::dispatch;

/// An export table on its way to Lua.
pub struct LuaExports(pub Arc<ExportTable>);

impl IntoLua for LuaExports {
    fn into_lua(self, lua: &Lua) -> LuaResult<LuaValue> {
        let table = lua.create_table_with_capacity(0, self.0.len())?;

        for (index, export) in self.0.iter().enumerate() {
            let name = lua.create_string(export.name())?;
            if let Some(function) = self.0.function_at(index) {
                table.set(name, dispatch::create_function(lua, function)?)?;
            } else if let Some(marker) = export.kind().marker() {
                table.set(name, marker)?;
            }
        }

        Ok(LuaValue::Table(table))
    }
}
