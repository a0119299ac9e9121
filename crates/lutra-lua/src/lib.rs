//! Lua 5.4 request scripting for HTTP middleware pipelines.
//!
//! An operator supplies a Lua script (inline text or a file path); for every
//! request, the handler executes that script in a fresh interpreter, hands it
//! read-only views of the request plus a mutable response sink, and then
//! materializes the sink as the real HTTP response — or the script forwards
//! to the next pipeline stage.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  host pipeline (HttpRequest, ResponseWriter, │
//! │  Next — see lutra-core)                      │
//! └──────────────────────────────────────────────┘
//!             │ per request
//!             ▼
//! ┌──────────────────────────────────────────────┐
//! │  ScriptHandler: fresh Lua state              │
//! │    lutra.request / server / env  (views)     │
//! │    lutra.response                (sink)      │
//! │    lutra.util / lutra.next()     (surface)   │
//! └──────────────────────────────────────────────┘
//!             │ script ran once
//!             ▼
//! ┌──────────────────────────────────────────────┐
//! │  materializer: status, headers, body → wire  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lutra_core::{HttpRequest, MemoryResponseWriter, NoopNext};
//! use lutra_lua::ScriptHandler;
//!
//! let handler = ScriptHandler::inline(r#"
//!     lutra.response.status = 200
//!     lutra.response.header["content-type"] = "application/json"
//!     lutra.response.body = lutra.util.json_encode({ ok = true })
//! "#)?;
//!
//! let request = HttpRequest::get("/health").host("example.com");
//! let mut writer = MemoryResponseWriter::new();
//! handler.serve(&request, &mut writer, Box::new(NoopNext));
//! ```
//!
//! ## Script environment
//!
//! | binding | contents |
//! |---|---|
//! | `lutra.request` | method, url, proto, host, remote_addr, header, url_parts |
//! | `lutra.response` | status (default 200), header table, body |
//! | `lutra.server` | version, module, hostname, tls |
//! | `lutra.env` | the process environment, verbatim |
//! | `lutra.util` | json_encode, json_decode, match_route |
//! | `lutra.next()` | invoke the downstream stage; returns nil or error text |
//!
//! Script faults never crash the host: load errors, runtime errors and
//! malformed response shapes all become a 500 response carrying the error
//! text, and the next request starts from a clean state.

mod config;
mod context;
mod error;
mod host;
mod marshal;
mod response;
mod route;
mod util;

pub use config::{InvocationMode, ScriptConfig, ScriptSource};
pub use error::{ConfigError, MarshalError, ScriptError, ScriptResult};
pub use host::{ScriptHandler, MODULE_ID};
pub use marshal::{json_to_lua, lua_to_json, MAX_DEPTH};
pub use response::DEFAULT_STATUS;
pub use route::match_route;
