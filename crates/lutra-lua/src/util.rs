//! Utility functions registered under `lutra.util`.
//!
//! All three follow the Lua convention of returning `(result, nil)` on
//! success and `(nil, error)` on failure instead of raising, so a script can
//! handle bad input without pcall:
//!
//! ```lua
//! local text, err = lutra.util.json_encode({ user = "alice" })
//! local value, err = lutra.util.json_decode('{"n": 1}')
//! local ok, params = lutra.util.match_route(lutra.request.url_parts.path, "/users/:id")
//! ```

use crate::marshal::{json_to_lua, lua_to_json};
use crate::route;
use mlua::{Lua, Table, Value};

/// Build the `lutra.util` table.
pub fn util_table(lua: &Lua) -> mlua::Result<Table> {
    let table = lua.create_table()?;

    // json_encode(value) -> (text, nil) | (nil, err)
    let json_encode = lua.create_function(|_, value: Value| {
        let native = match lua_to_json(&value) {
            Ok(native) => native,
            Err(err) => return Ok((None, Some(err.to_string()))),
        };
        match serde_json::to_string(&native) {
            Ok(text) => Ok((Some(text), None)),
            Err(err) => Ok((None, Some(err.to_string()))),
        }
    })?;
    table.set("json_encode", json_encode)?;

    // json_decode(text) -> (value, nil) | (nil, err)
    let json_decode = lua.create_function(|lua, text: String| {
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(native) => Ok((json_to_lua(lua, &native)?, None)),
            Err(err) => Ok((Value::Nil, Some(err.to_string()))),
        }
    })?;
    table.set("json_decode", json_decode)?;

    // match_route(path, pattern) -> false | (true, params)
    let match_route = lua.create_function(|lua, (path, pattern): (String, String)| {
        match route::match_route(&path, &pattern) {
            Some(params) => {
                let table = lua.create_table()?;
                for (name, value) in params {
                    table.raw_set(name, value)?;
                }
                Ok((true, Some(table)))
            }
            None => Ok((false, None)),
        }
    })?;
    table.set("match_route", match_route)?;

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lua_with_util() -> Lua {
        let lua = Lua::new();
        let util = util_table(&lua).unwrap();
        lua.globals().set("util", util).unwrap();
        lua
    }

    #[test]
    fn test_json_encode_value() {
        let lua = lua_with_util();
        let text: String = lua
            .load(r#"return (util.json_encode({ name = "bob", tags = {"a", "b"} }))"#)
            .eval()
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["name"], "bob");
        assert_eq!(parsed["tags"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_json_encode_cycle_returns_error_tuple() {
        let lua = lua_with_util();
        let (text, err): (Option<String>, Option<String>) = lua
            .load("local t = {}; t.me = t; return util.json_encode(t)")
            .eval()
            .unwrap();

        assert!(text.is_none());
        assert!(err.unwrap().contains("nesting"));
    }

    #[test]
    fn test_json_decode_value() {
        let lua = lua_with_util();
        let ok: bool = lua
            .load(
                r#"
                local value, err = util.json_decode('{"n": 3, "items": [10, 20]}')
                return err == nil and value.n == 3 and value.items[2] == 20
                "#,
            )
            .eval()
            .unwrap();
        assert!(ok);
    }

    #[test]
    fn test_json_decode_malformed_returns_error_tuple() {
        let lua = lua_with_util();
        let ok: bool = lua
            .load(
                r#"
                local value, err = util.json_decode("{invalid")
                return value == nil and err ~= nil
                "#,
            )
            .eval()
            .unwrap();
        assert!(ok);
    }

    #[test]
    fn test_round_trip_through_script() {
        let lua = lua_with_util();
        let ok: bool = lua
            .load(
                r#"
                local original = { name = "t", values = { 1, 2, 3 }, nested = { x = 10 } }
                local text = util.json_encode(original)
                local decoded = util.json_decode(text)
                return decoded.name == "t"
                    and decoded.values[3] == 3
                    and decoded.nested.x == 10
                "#,
            )
            .eval()
            .unwrap();
        assert!(ok);
    }

    #[test]
    fn test_match_route_from_script() {
        let lua = lua_with_util();
        let ok: bool = lua
            .load(
                r#"
                local ok, params = util.match_route("/users/42", "/users/:id")
                local miss = util.match_route("/users", "/users/:id")
                return ok and params.id == "42" and miss == false
                "#,
            )
            .eval()
            .unwrap();
        assert!(ok);
    }
}
