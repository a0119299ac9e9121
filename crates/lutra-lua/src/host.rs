//! The script execution host.
//!
//! `ScriptHandler` is provisioned once and serves many requests. Every
//! request gets a fresh Lua state: views, sink, utilities and the
//! continuation are registered under the `lutra` namespace, the script runs
//! exactly once, and the sink is materialized into the transport. The state
//! and everything registered into it drop before `serve` returns, so nothing
//! can leak into the next request.
//!
//! Script faults never propagate to the host pipeline. Load errors, runtime
//! errors and response-contract violations all collapse into a fixed
//! 500 response carrying the error text, and the process keeps serving.

use crate::config::{InvocationMode, LoadedScript, ScriptConfig};
use crate::error::{ConfigError, ScriptError};
use crate::{context, response, util};
use lutra_core::{HttpRequest, Next, ResponseWriter};
use mlua::{Lua, Table, Value};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, error, warn};

/// Module identifier reported in the server info view.
pub const MODULE_ID: &str = "lutra.handlers.lua";

/// Global namespace the views are registered under.
const NAMESPACE: &str = "lutra";

/// Entry-point function looked up in [`InvocationMode::EntryPoint`].
const ENTRY_POINT: &str = "handle";

/// A provisioned script handler.
pub struct ScriptHandler {
    script: LoadedScript,
    env_override: Option<Vec<(String, String)>>,
}

impl ScriptHandler {
    /// Provision a handler from configuration. Fails fast on empty or
    /// unresolvable script sources; request handling never re-validates.
    pub fn new(config: ScriptConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            script: config.load()?,
            env_override: None,
        })
    }

    /// Provision from an inline script block with the default mode.
    pub fn inline(text: impl Into<String>) -> Result<Self, ConfigError> {
        Self::new(ScriptConfig::inline(text))
    }

    /// Provision from a script file with the default mode.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Self::new(ScriptConfig::file(path))
    }

    /// Replace the environment view contents. Without this, every request
    /// snapshots the full process environment, unfiltered.
    pub fn with_env<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env_override = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Handle one request.
    ///
    /// Runs the script in a fresh Lua state and materializes the sink into
    /// `writer`. `next` is the downstream continuation; the script may invoke
    /// it any number of times through `lutra.next()`. Script faults are
    /// answered with a 500 and never returned to the caller.
    pub fn serve(
        &self,
        request: &HttpRequest,
        writer: &mut dyn ResponseWriter,
        next: Box<dyn Next>,
    ) {
        let lua = Lua::new();

        let outcome = self
            .populate(&lua, request, next)
            .map_err(ScriptError::from)
            .and_then(|sink| self.run(&lua, &sink));

        match outcome {
            Ok(rendered) => response::write_response(&rendered, writer),
            Err(err) => write_failure(writer, &err),
        }
        // The Lua state and every per-request table drop here.
    }

    /// Register views, sink, utilities and the continuation under the
    /// `lutra` namespace. Returns the sink table.
    fn populate(
        &self,
        lua: &Lua,
        request: &HttpRequest,
        next: Box<dyn Next>,
    ) -> mlua::Result<Table> {
        let namespace = lua.create_table()?;

        namespace.set("request", context::request_table(lua, request)?)?;

        let sink = response::response_table(lua)?;
        namespace.set("response", sink.clone())?;

        namespace.set(
            "server",
            context::server_info_table(lua, request, MODULE_ID, env!("CARGO_PKG_VERSION"))?,
        )?;
        namespace.set("env", context::env_table(lua, self.environment())?)?;
        namespace.set("util", util::util_table(lua)?)?;

        // lutra.next() -> nil | error text. Downstream failures come back to
        // the script as a value, never as a raised error.
        let next = Rc::new(RefCell::new(next));
        let next_fn = lua.create_function(move |_, ()| {
            match next.borrow_mut().invoke() {
                Ok(()) => Ok(None::<String>),
                Err(err) => {
                    debug!(error = %err, "continuation reported an error to the script");
                    Ok(Some(err.to_string()))
                }
            }
        })?;
        namespace.set("next", next_fn)?;

        lua.globals().set(NAMESPACE, namespace)?;
        Ok(sink)
    }

    /// Execute the script once and drain the sink.
    fn run(&self, lua: &Lua, sink: &Table) -> Result<response::RenderedResponse, ScriptError> {
        let chunk = lua
            .load(self.script.text.as_str())
            .set_name(self.script.chunk_name.as_str());

        match self.script.mode {
            InvocationMode::Ambient => chunk.exec()?,
            InvocationMode::EntryPoint => {
                chunk.exec()?;
                let entry: Value = lua.globals().raw_get(ENTRY_POINT)?;
                let Value::Function(entry) = entry else {
                    return Err(ScriptError::MissingEntryPoint);
                };
                let namespace: Table = lua.globals().get(NAMESPACE)?;
                let request_table: Table = namespace.get("request")?;
                entry.call::<()>((request_table, sink.clone()))?;
            }
        }

        response::drain(sink)
    }

    fn environment(&self) -> Vec<(String, String)> {
        match &self.env_override {
            Some(vars) => vars.clone(),
            None => std::env::vars_os()
                .map(|(k, v)| {
                    (
                        k.to_string_lossy().into_owned(),
                        v.to_string_lossy().into_owned(),
                    )
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for ScriptHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptHandler")
            .field("chunk", &self.script.chunk_name)
            .field("mode", &self.script.mode)
            .finish()
    }
}

/// Write the fixed failure response: 500, plain text, the error message in
/// the body. Bypasses the materializer entirely.
fn write_failure(writer: &mut dyn ResponseWriter, err: &ScriptError) {
    warn!(error = %err, "lua script failed; responding 500");

    if writer.is_committed() {
        debug!("response already committed; cannot report script failure");
        return;
    }

    writer.add_header("Content-Type", "text/plain; charset=utf-8");
    writer.add_header("X-Content-Type-Options", "nosniff");
    let body = format!("lua script error: {err}\n");
    if let Err(write_err) = writer
        .write_head(500)
        .and_then(|()| writer.write_body(body.as_bytes()))
    {
        error!(error = %write_err, "failed to write script failure response");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lutra_core::{MemoryResponseWriter, NoopNext};

    fn serve_inline(script: &str) -> MemoryResponseWriter {
        let handler = ScriptHandler::inline(script).unwrap();
        let request = HttpRequest::get("/t").host("unit.test");
        let mut writer = MemoryResponseWriter::new();
        handler.serve(&request, &mut writer, Box::new(NoopNext));
        writer
    }

    #[test]
    fn test_ambient_script_populates_response() {
        let writer = serve_inline(
            r#"
            lutra.response.status = 201
            lutra.response.header["x-made-by"] = "script"
            lutra.response.body = "created"
            "#,
        );

        assert_eq!(writer.status, Some(201));
        assert_eq!(writer.headers.get("X-Made-By"), Some("script"));
        assert_eq!(writer.body_string(), "created");
    }

    #[test]
    fn test_untouched_sink_materializes_defaults() {
        let writer = serve_inline("local x = 1");
        assert_eq!(writer.status, Some(200));
        assert!(writer.body.is_empty());
    }

    #[test]
    fn test_load_error_becomes_500_with_error_text() {
        let writer = serve_inline("this is not lua ((");
        assert_eq!(writer.status, Some(500));
        assert!(writer.body_string().starts_with("lua script error: "));
        assert_eq!(
            writer.headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
    }

    #[test]
    fn test_runtime_error_becomes_500_with_error_text() {
        let writer = serve_inline(r#"error("boom")"#);
        assert_eq!(writer.status, Some(500));
        assert!(writer.body_string().contains("boom"));
    }

    #[test]
    fn test_contract_violation_becomes_500() {
        let writer = serve_inline("lutra.response.body = 42");
        assert_eq!(writer.status, Some(500));
        assert!(writer.body_string().contains("response contract violation"));
    }

    #[test]
    fn test_entry_point_mode_calls_handle() {
        let handler = ScriptHandler::new(
            ScriptConfig::inline(
                r#"
                function handle(request, response)
                    response.status = 200
                    response.body = request.method .. " " .. request.url
                end
                "#,
            )
            .with_mode(InvocationMode::EntryPoint),
        )
        .unwrap();

        let request = HttpRequest::new("DELETE", "/things/9");
        let mut writer = MemoryResponseWriter::new();
        handler.serve(&request, &mut writer, Box::new(NoopNext));

        assert_eq!(writer.status, Some(200));
        assert_eq!(writer.body_string(), "DELETE /things/9");
    }

    #[test]
    fn test_entry_point_missing_handle_is_descriptive_500() {
        let handler = ScriptHandler::new(
            ScriptConfig::inline("local nothing = true").with_mode(InvocationMode::EntryPoint),
        )
        .unwrap();

        let request = HttpRequest::get("/");
        let mut writer = MemoryResponseWriter::new();
        handler.serve(&request, &mut writer, Box::new(NoopNext));

        assert_eq!(writer.status, Some(500));
        assert!(writer.body_string().contains("handle"));
    }

    #[test]
    fn test_entry_point_non_callable_handle_is_500() {
        let handler = ScriptHandler::new(
            ScriptConfig::inline(r#"handle = "not a function""#)
                .with_mode(InvocationMode::EntryPoint),
        )
        .unwrap();

        let request = HttpRequest::get("/");
        let mut writer = MemoryResponseWriter::new();
        handler.serve(&request, &mut writer, Box::new(NoopNext));

        assert_eq!(writer.status, Some(500));
        assert!(writer.body_string().contains("handle"));
    }
}
