//! The response sink a script populates, and its materialization.
//!
//! The sink starts out as `{ status = 200, header = {}, body = "" }`.
//! Materialization is two-phase: `drain` reads and validates the whole sink
//! with no side effects, so a contract violation can still become a clean
//! 500; `write_response` then pushes the validated response through the
//! transport. Transport write errors are logged, never retried — once the
//! status line is committed there is nothing left to retry.

use crate::error::{ScriptError, ScriptResult};
use crate::marshal::display_string;
use lutra_core::{Headers, ResponseWriter};
use mlua::{Lua, Table, Value};
use tracing::{debug, error};

/// Status used when the sink holds nothing usable.
pub const DEFAULT_STATUS: u16 = 200;

/// Create the sink table with its documented defaults.
pub fn response_table(lua: &Lua) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    table.set("status", DEFAULT_STATUS)?;
    table.set("header", lua.create_table()?)?;
    table.set("body", "")?;
    Ok(table)
}

/// A validated response, ready to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
}

/// Read the sink exactly once, validating shapes.
///
/// Status tolerance: integers and integer-valued floats in [100, 599] pass,
/// as do strings parsing to an integer in that range; everything else falls
/// back to [`DEFAULT_STATUS`]. Header and body shape violations are contract
/// errors, which the host converts into the standard 500 response.
pub fn drain(sink: &Table) -> ScriptResult<RenderedResponse> {
    let status = read_status(sink.raw_get("status")?);
    let headers = read_headers(sink.raw_get("header")?)?;
    let body = read_body(sink.raw_get("body")?)?;
    Ok(RenderedResponse {
        status,
        headers,
        body,
    })
}

fn read_status(value: Value) -> u16 {
    let parsed = match &value {
        Value::Integer(i) => Some(*i),
        Value::Number(n) => Some(*n as i64),
        Value::String(s) => s.to_string_lossy().trim().parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(code @ 100..=599) => code as u16,
        _ => DEFAULT_STATUS,
    }
}

fn read_headers(value: Value) -> ScriptResult<Headers> {
    let mut headers = Headers::new();
    let table = match value {
        Value::Nil => return Ok(headers),
        Value::Table(table) => table,
        other => {
            return Err(ScriptError::Contract(format!(
                "response.header must be a table, got {}",
                other.type_name()
            )))
        }
    };

    for pair in table.pairs::<Value, Value>() {
        let (key, value) = pair?;
        let key = display_string(&key);
        match value {
            // A sequence adds one occurrence per element, in order.
            Value::Table(values) => {
                for index in 1..=values.raw_len() {
                    let item: Value = values.raw_get(index)?;
                    match item {
                        Value::String(_)
                        | Value::Integer(_)
                        | Value::Number(_)
                        | Value::Boolean(_) => headers.append(&key, display_string(&item)),
                        Value::Nil => {}
                        other => {
                            return Err(ScriptError::Contract(format!(
                                "response.header['{key}'] contains a {}; expected strings",
                                other.type_name()
                            )))
                        }
                    }
                }
            }
            // A scalar replaces any prior occurrences.
            Value::String(_) | Value::Integer(_) | Value::Number(_) | Value::Boolean(_) => {
                headers.set(&key, display_string(&value));
            }
            other => {
                return Err(ScriptError::Contract(format!(
                    "response.header['{key}'] must be a string or a table of strings, got {}",
                    other.type_name()
                )))
            }
        }
    }
    Ok(headers)
}

fn read_body(value: Value) -> ScriptResult<Option<Vec<u8>>> {
    match value {
        Value::Nil => Ok(None),
        Value::String(s) => Ok(Some(s.as_bytes().to_vec())),
        // A sequence concatenates the string form of each element, no
        // separator. Holes are skipped.
        Value::Table(parts) => {
            let mut body = Vec::new();
            for index in 1..=parts.raw_len() {
                let item: Value = parts.raw_get(index)?;
                match item {
                    Value::Nil => {}
                    Value::String(_) | Value::Integer(_) | Value::Number(_) | Value::Boolean(_) => {
                        body.extend_from_slice(display_string(&item).as_bytes())
                    }
                    other => {
                        return Err(ScriptError::Contract(format!(
                            "response.body[{index}] is a {}; expected strings",
                            other.type_name()
                        )))
                    }
                }
            }
            Ok(Some(body))
        }
        other => Err(ScriptError::Contract(format!(
            "response.body must be a string or a table of strings, got {}",
            other.type_name()
        ))),
    }
}

/// Write a validated response: headers, then the status line, then — when a
/// non-empty body is present, the status is outside 1xx, and is neither 204
/// nor 304 — the body bytes.
///
/// If the transport is already committed (the script invoked the
/// continuation and downstream wrote), the sink is skipped: a continuation
/// commit wins at the transport, and invoking the continuation never
/// finalizes anything by itself.
pub fn write_response(rendered: &RenderedResponse, writer: &mut dyn ResponseWriter) {
    if writer.is_committed() {
        debug!("response already committed downstream; skipping script response");
        return;
    }

    for (key, values) in rendered.headers.iter() {
        for value in values {
            writer.add_header(key, value);
        }
    }

    if let Err(err) = writer.write_head(rendered.status) {
        error!(error = %err, "failed to write response status");
        return;
    }

    let body_allowed =
        rendered.status >= 200 && rendered.status != 204 && rendered.status != 304;
    if !body_allowed {
        return;
    }
    if let Some(body) = rendered.body.as_deref() {
        if !body.is_empty() {
            if let Err(err) = writer.write_body(body) {
                error!(error = %err, "failed to write response body");
            }
        }
    }
}
