//! Read-only views handed to a script.
//!
//! All four tables are built once, before the script runs, by copying out of
//! the native request. A script is free to mutate them; nothing propagates
//! back. Construction never fails for a well-formed inbound request — a
//! request target the `url` crate cannot make sense of simply leaves the
//! decomposition table with only `href` populated.

use lutra_core::HttpRequest;
use mlua::{Lua, Table};
use url::Url;

/// Build the request view: method, target, protocol, host, peer address and
/// the multi-value header table, plus the `url_parts` decomposition.
pub fn request_table(lua: &Lua, request: &HttpRequest) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    table.set("method", request.method.as_str())?;
    table.set("url", request.url.as_str())?;
    table.set("proto", request.proto.as_str())?;
    table.set("host", request.host.as_str())?;
    table.set("remote_addr", request.remote_addr.as_str())?;

    let headers = lua.create_table()?;
    for (key, values) in request.headers.iter() {
        let list = lua.create_table_with_capacity(values.len(), 0)?;
        for (index, value) in values.iter().enumerate() {
            list.raw_set(index + 1, value.as_str())?;
        }
        headers.raw_set(key, list)?;
    }
    table.set("header", headers)?;

    table.set("url_parts", url_parts_table(lua, request)?)?;
    Ok(table)
}

/// Build the URL-decomposition view.
///
/// Origin-form targets (`/path?q=1`) are resolved against a base synthesized
/// from the TLS flag and the request host. When no parse succeeds, only
/// `href` (the raw target) is set.
fn url_parts_table(lua: &Lua, request: &HttpRequest) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    table.set("href", request.url.as_str())?;

    let Some(url) = parse_request_url(request) else {
        return Ok(table);
    };

    table.set("scheme", url.scheme())?;
    table.set("user", url.username())?;
    table.set("password", url.password().unwrap_or(""))?;
    table.set("host", url.host_str().unwrap_or(""))?;
    if let Some(port) = url.port() {
        table.set("port", port)?;
    }
    table.set("path", url.path())?;
    table.set("query", url.query().unwrap_or(""))?;
    table.set("fragment", url.fragment().unwrap_or(""))?;
    Ok(table)
}

fn parse_request_url(request: &HttpRequest) -> Option<Url> {
    match Url::parse(&request.url) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) if !request.host.is_empty() => {
            let scheme = if request.tls { "https" } else { "http" };
            let base = Url::parse(&format!("{scheme}://{}", request.host)).ok()?;
            base.join(&request.url).ok()
        }
        Err(_) => None,
    }
}

/// Build the server info view.
pub fn server_info_table(
    lua: &Lua,
    request: &HttpRequest,
    module: &str,
    version: &str,
) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    table.set("version", version)?;
    table.set("module", module)?;
    table.set("hostname", request.host.as_str())?;
    table.set("tls", request.tls)?;
    Ok(table)
}

/// Build the environment view from the supplied flat map, verbatim.
///
/// No allow-list filtering happens here: a script sees everything the
/// supplier passes in, which for the default supplier is the whole process
/// environment.
pub fn env_table<I, K, V>(lua: &Lua, vars: I) -> mlua::Result<Table>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let table = lua.create_table()?;
    for (key, value) in vars {
        table.raw_set(key.as_ref(), value.as_ref())?;
    }
    Ok(table)
}
