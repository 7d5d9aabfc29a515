//! Conversion between Lua values and WebAssembly values.
//!
//! Integer kinds go through Lua's integer coercion and float kinds through its
//! number coercion, so a string like `"42"` is accepted where Lua itself would
//! accept it. A number without an exact integer representation (`2.5`,
//! `"2.5"`) is rejected for integer kinds. `i32` keeps the low 32 bits of the
//! Lua integer. Values coming back are always Lua integers for integer kinds
//! and Lua floats otherwise.

use std::sync::Arc;

use mlua::{Error as LuaError, Lua, Result as LuaResult, Value as LuaValue};

use wasm_lua_core::{Value, ValueKind};

/// Coerce one Lua value to `kind`.
#[allow(clippy::cast_possible_truncation)]
pub fn to_wasm(lua: &Lua, value: LuaValue, kind: ValueKind) -> LuaResult<Value> {
    if kind.is_integer() {
        let integer = coerce_integer(lua, value)?;
        return Ok(match kind {
            ValueKind::I32 => Value::I32(integer as i32),
            _ => Value::I64(integer),
        });
    }

    let number = coerce_number(lua, value)?;
    Ok(match kind {
        ValueKind::F32 => Value::F32(number as f32),
        _ => Value::F64(number),
    })
}

/// Lua's own integer conversion: integral floats and numeric strings are
/// accepted, anything with a fractional part is not.
fn coerce_integer(lua: &Lua, value: LuaValue) -> LuaResult<i64> {
    if let Some(integer) = lua.coerce_integer(value.clone())? {
        return Ok(integer);
    }

    let type_name = value.type_name();
    if lua.coerce_number(value)?.is_some() {
        Err(LuaError::RuntimeError(
            "number has no integer representation".to_string(),
        ))
    } else {
        Err(LuaError::RuntimeError(format!(
            "integer expected, got {type_name}"
        )))
    }
}

fn coerce_number(lua: &Lua, value: LuaValue) -> LuaResult<f64> {
    let type_name = value.type_name();

    lua.coerce_number(value)?
        .ok_or_else(|| LuaError::RuntimeError(format!("number expected, got {type_name}")))
}

/// Lua representation of a WebAssembly value.
pub fn to_lua(value: Value) -> LuaValue {
    match value {
        Value::I32(v) => LuaValue::Integer(i64::from(v)),
        Value::I64(v) => LuaValue::Integer(v),
        Value::F32(v) => LuaValue::Number(f64::from(v)),
        Value::F64(v) => LuaValue::Number(v),
    }
}

/// Coerce a sequence of Lua values to the declared kinds, in order.
///
/// `to` names the callee in `bad argument #n to 'name'` errors. Values beyond
/// `kinds.len()` are not looked at.
pub fn to_wasm_all(
    lua: &Lua,
    values: impl IntoIterator<Item = LuaValue>,
    kinds: &[ValueKind],
    to: &str,
) -> LuaResult<Vec<Value>> {
    values
        .into_iter()
        .zip(kinds)
        .enumerate()
        .map(|(index, (value, kind))| {
            to_wasm(lua, value, *kind).map_err(|cause| LuaError::BadArgument {
                to: Some(to.to_string()),
                pos: index + 1,
                name: None,
                cause: Arc::new(cause),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_kinds() {
        let lua = Lua::new();

        assert_eq!(
            to_wasm(&lua, LuaValue::Integer(7), ValueKind::I64).unwrap(),
            Value::I64(7)
        );
        assert_eq!(
            to_wasm(&lua, LuaValue::Number(3.0), ValueKind::I32).unwrap(),
            Value::I32(3)
        );
    }

    #[test]
    fn test_i32_keeps_low_bits() {
        let lua = Lua::new();

        let value = to_wasm(&lua, LuaValue::Integer(0x1_0000_0005), ValueKind::I32).unwrap();
        assert_eq!(value, Value::I32(5));
    }

    #[test]
    fn test_float_kinds_accept_integers() {
        let lua = Lua::new();

        assert_eq!(
            to_wasm(&lua, LuaValue::Integer(2), ValueKind::F64).unwrap(),
            Value::F64(2.0)
        );
        assert_eq!(
            to_wasm(&lua, LuaValue::Number(0.5), ValueKind::F32).unwrap(),
            Value::F32(0.5)
        );
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let lua = Lua::new();
        let text = LuaValue::String(lua.create_string("42").unwrap());

        assert_eq!(to_wasm(&lua, text, ValueKind::I32).unwrap(), Value::I32(42));
    }

    #[test]
    fn test_fractional_integer_is_rejected() {
        let lua = Lua::new();
        let text = LuaValue::String(lua.create_string("2.5").unwrap());

        let err = to_wasm(&lua, LuaValue::Number(2.5), ValueKind::I32).unwrap_err();
        assert!(err.to_string().contains("no integer representation"));
        assert!(to_wasm(&lua, text, ValueKind::I64).is_err());
        assert!(to_wasm(&lua, LuaValue::Number(f64::NAN), ValueKind::I64).is_err());
    }

    #[test]
    fn test_fractional_float_is_kept() {
        let lua = Lua::new();
        let text = LuaValue::String(lua.create_string("2.5").unwrap());

        assert_eq!(to_wasm(&lua, text, ValueKind::F64).unwrap(), Value::F64(2.5));
    }

    #[test]
    fn test_non_numeric_is_rejected() {
        let lua = Lua::new();

        assert!(to_wasm(&lua, LuaValue::Boolean(true), ValueKind::I32).is_err());
        assert!(to_wasm(&lua, LuaValue::Nil, ValueKind::F64).is_err());
    }

    #[test]
    fn test_bad_argument_position() {
        let lua = Lua::new();
        let values = vec![LuaValue::Integer(1), LuaValue::Boolean(true)];

        let err = to_wasm_all(&lua, values, &[ValueKind::I32, ValueKind::I32], "add").unwrap_err();

        match err {
            LuaError::BadArgument { to, pos, .. } => {
                assert_eq!(to.as_deref(), Some("add"));
                assert_eq!(pos, 2);
            }
            other => panic!("expected bad argument, got {other:?}"),
        }
    }

    #[test]
    fn test_extra_values_ignored() {
        let lua = Lua::new();
        let values = vec![LuaValue::Integer(1), LuaValue::Boolean(true)];

        let converted = to_wasm_all(&lua, values, &[ValueKind::I64], "f").unwrap();
        assert_eq!(converted, vec![Value::I64(1)]);
    }

    #[test]
    fn test_to_lua() {
        assert_eq!(to_lua(Value::I32(-1)), LuaValue::Integer(-1));
        assert_eq!(to_lua(Value::F32(1.5)), LuaValue::Number(1.5));
    }
}
