//! Bidirectional conversion between Lua values and JSON values.
//!
//! The conversion is written out explicitly instead of delegating to serde so
//! the table classification policy is visible in the code: a table whose keys
//! are all numeric is a sequence, anything else is a mapping. The sequence
//! covers `1..=max(key)` with nulls in the gaps, so a sparse table like
//! `{[1] = "a", [5] = "b"}` becomes a five-element array — the "any numeric
//! key" rule, not the stricter dense-keys rule. An empty table classifies as
//! an empty sequence.
//!
//! Both directions are total over finite acyclic values. A depth guard turns
//! runaway nesting (cyclic tables) into [`MarshalError::TooDeep`] instead of
//! a stack overflow.

use crate::error::MarshalError;
use mlua::{Lua, Table, Value};
use serde_json::Value as JsonValue;

/// Nesting ceiling for either direction of conversion.
pub const MAX_DEPTH: usize = 128;

/// Convert a Lua value to its native JSON form.
///
/// nil maps to null; booleans, numbers and strings map directly (non-finite
/// numbers become null, since the interchange format cannot carry them);
/// tables classify per the module rule. Values outside the supported domain
/// (functions, userdata, threads) fall back to a display string rather than
/// failing.
pub fn lua_to_json(value: &Value) -> Result<JsonValue, MarshalError> {
    lua_to_json_at(value, 0)
}

fn lua_to_json_at(value: &Value, depth: usize) -> Result<JsonValue, MarshalError> {
    if depth > MAX_DEPTH {
        return Err(MarshalError::TooDeep(MAX_DEPTH));
    }

    Ok(match value {
        Value::Nil => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Integer(i) => JsonValue::from(*i),
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::String(s) => JsonValue::String(s.to_string_lossy().to_string()),
        Value::Table(table) => table_to_json(table, depth)?,
        other => JsonValue::String(display_string(other)),
    })
}

fn table_to_json(table: &Table, depth: usize) -> Result<JsonValue, MarshalError> {
    let mut entries = Vec::new();
    let mut numeric_only = true;
    let mut max_key: i64 = 0;

    for pair in table.pairs::<Value, Value>().flatten() {
        let (key, value) = pair;
        match numeric_key(&key) {
            Some(index) if numeric_only => max_key = max_key.max(index),
            _ => numeric_only = false,
        }
        entries.push((key, value));
    }

    if numeric_only {
        // Sequence: 1..=max with nulls for the gaps. Keys below 1 are dropped.
        let mut items = vec![JsonValue::Null; max_key.max(0) as usize];
        for (key, value) in &entries {
            if let Some(index) = numeric_key(key) {
                if index >= 1 && index <= max_key {
                    items[(index - 1) as usize] = lua_to_json_at(value, depth + 1)?;
                }
            }
        }
        Ok(JsonValue::Array(items))
    } else {
        let mut object = serde_json::Map::with_capacity(entries.len());
        for (key, value) in &entries {
            object.insert(display_string(key), lua_to_json_at(value, depth + 1)?);
        }
        Ok(JsonValue::Object(object))
    }
}

fn numeric_key(key: &Value) -> Option<i64> {
    match key {
        Value::Integer(i) => Some(*i),
        Value::Number(n) => Some(*n as i64),
        _ => None,
    }
}

/// Convert a JSON value to a Lua value.
///
/// Null maps to nil; integers that fit `i64` stay integers, everything else
/// becomes a float; arrays become tables with 1-based integer keys (null
/// elements are holes); objects become string-keyed tables.
pub fn json_to_lua(lua: &Lua, value: &JsonValue) -> mlua::Result<Value> {
    match value {
        JsonValue::Null => Ok(Value::Nil),
        JsonValue::Bool(b) => Ok(Value::Boolean(*b)),
        JsonValue::Number(n) => Ok(match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        }),
        JsonValue::String(s) => Ok(Value::String(lua.create_string(s)?)),
        JsonValue::Array(items) => {
            let table = lua.create_table_with_capacity(items.len(), 0)?;
            for (index, item) in items.iter().enumerate() {
                table.raw_set(index + 1, json_to_lua(lua, item)?)?;
            }
            Ok(Value::Table(table))
        }
        JsonValue::Object(map) => {
            let table = lua.create_table_with_capacity(0, map.len())?;
            for (key, item) in map {
                table.raw_set(key.as_str(), json_to_lua(lua, item)?)?;
            }
            Ok(Value::Table(table))
        }
    }
}

/// The string form of a scalar Lua value; type name for everything else.
///
/// Used for mapping keys, sequence-body elements, and the best-effort
/// fallback for values outside the supported domain.
pub(crate) fn display_string(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.to_string_lossy().to_string(),
        other => other.type_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(lua: &Lua, snippet: &str) -> Value {
        lua.load(snippet).eval().unwrap()
    }

    #[test]
    fn test_scalars_map_directly() {
        let lua = Lua::new();
        assert_eq!(lua_to_json(&Value::Nil).unwrap(), json!(null));
        assert_eq!(lua_to_json(&Value::Boolean(true)).unwrap(), json!(true));
        assert_eq!(lua_to_json(&eval(&lua, "return 42")).unwrap(), json!(42));
        assert_eq!(lua_to_json(&eval(&lua, "return 1.5")).unwrap(), json!(1.5));
        assert_eq!(
            lua_to_json(&eval(&lua, r#"return "hi""#)).unwrap(),
            json!("hi")
        );
    }

    #[test]
    fn test_dense_table_is_sequence() {
        let lua = Lua::new();
        let value = eval(&lua, r#"return {"a", "b", "c"}"#);
        assert_eq!(lua_to_json(&value).unwrap(), json!(["a", "b", "c"]));
    }

    #[test]
    fn test_sparse_table_keeps_null_gaps() {
        // The "any numeric key" rule: {1, 5} is still a sequence, with nulls
        // filling positions 2..4.
        let lua = Lua::new();
        let value = eval(&lua, r#"return {[1] = "a", [5] = "b"}"#);
        assert_eq!(
            lua_to_json(&value).unwrap(),
            json!(["a", null, null, null, "b"])
        );
    }

    #[test]
    fn test_mixed_keys_make_a_mapping() {
        let lua = Lua::new();
        let value = eval(&lua, r#"return {[1] = "a", name = "x"}"#);
        assert_eq!(
            lua_to_json(&value).unwrap(),
            json!({"1": "a", "name": "x"})
        );
    }

    #[test]
    fn test_empty_table_is_empty_sequence() {
        let lua = Lua::new();
        let value = eval(&lua, "return {}");
        assert_eq!(lua_to_json(&value).unwrap(), json!([]));
    }

    #[test]
    fn test_exotic_values_fall_back_to_display_string() {
        let lua = Lua::new();
        let value = eval(&lua, "return function() end");
        assert_eq!(lua_to_json(&value).unwrap(), json!("function"));
    }

    #[test]
    fn test_cyclic_table_errors_instead_of_overflowing() {
        let lua = Lua::new();
        let value = eval(&lua, "local t = {}; t.me = t; return t");
        assert!(lua_to_json(&value).is_err());
    }

    #[test]
    fn test_json_to_lua_array_is_one_based() {
        let lua = Lua::new();
        let value = json_to_lua(&lua, &json!(["x", "y"])).unwrap();
        let Value::Table(table) = value else {
            panic!("expected table");
        };
        assert_eq!(table.raw_get::<String>(1).unwrap(), "x");
        assert_eq!(table.raw_get::<String>(2).unwrap(), "y");
    }

    #[test]
    fn test_round_trip_law() {
        let lua = Lua::new();
        let native = json!({
            "name": "alice",
            "age": 30,
            "ratio": 0.5,
            "active": true,
            "tags": ["a", "b"],
            "nested": {"x": [1, 2, {"deep": false}]}
        });

        let script_value = json_to_lua(&lua, &native).unwrap();
        assert_eq!(lua_to_json(&script_value).unwrap(), native);
    }

    #[test]
    fn test_interior_nulls_round_trip_trailing_nulls_do_not() {
        // A nil element is a hole in a Lua table. Holes before the last
        // non-nil element survive the round trip as nulls; trailing nulls
        // have no key at all and are dropped.
        let lua = Lua::new();

        let interior = json_to_lua(&lua, &json!([1, null, 2])).unwrap();
        assert_eq!(lua_to_json(&interior).unwrap(), json!([1, null, 2]));

        let trailing = json_to_lua(&lua, &json!([1, null])).unwrap();
        assert_eq!(lua_to_json(&trailing).unwrap(), json!([1]));
    }

    #[test]
    fn test_null_object_values_vanish() {
        // {"a": null} stores nil under "a", which in Lua is the absence of
        // the key; it comes back as the empty table, an empty sequence.
        let lua = Lua::new();
        let value = json_to_lua(&lua, &json!({"a": null})).unwrap();
        assert_eq!(lua_to_json(&value).unwrap(), json!([]));
    }

    #[test]
    fn test_non_finite_numbers_become_null() {
        let lua = Lua::new();
        let value = eval(&lua, "return 0/0");
        assert_eq!(lua_to_json(&value).unwrap(), json!(null));
    }
}
