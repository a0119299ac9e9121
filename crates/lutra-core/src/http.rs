//! HTTP request snapshot and header map.
//!
//! `Headers` keeps every key in canonical MIME casing (`Content-Type`,
//! `X-Request-Id`) and preserves both the first-insertion order of keys and
//! the insertion order of values under a key, so multi-valued headers such as
//! `Set-Cookie` survive a round trip through the bridge intact.

use serde::{Deserialize, Serialize};

/// Canonicalize a header key to MIME casing: the first letter and every
/// letter following a `-` are uppercased, the rest lowercased.
///
/// Keys containing bytes that are not valid header token characters are
/// returned unchanged.
pub fn canonical_header_key(key: &str) -> String {
    const TOKEN_EXTRA: &[u8] = b"!#$%&'*+-.^_`|~";

    if key.is_empty()
        || !key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || TOKEN_EXTRA.contains(&b))
    {
        return key.to_string();
    }

    let mut out = String::with_capacity(key.len());
    let mut upper = true;
    for b in key.bytes() {
        let c = if upper {
            b.to_ascii_uppercase()
        } else {
            b.to_ascii_lowercase()
        };
        out.push(c as char);
        upper = b == b'-';
    }
    out
}

/// Ordered multi-value header map with case-insensitive keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all occurrences of `key` with a single value.
    pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        let key = canonical_header_key(key.as_ref());
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => {
                values.clear();
                values.push(value);
            }
            None => self.entries.push((key, vec![value])),
        }
    }

    /// Add one more occurrence of `key`, after any existing ones.
    pub fn append(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        let key = canonical_header_key(key.as_ref());
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    /// First value under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(|v| v.as_str())
    }

    /// All values under `key`, in insertion order.
    pub fn get_all(&self, key: &str) -> &[String] {
        let key = canonical_header_key(key);
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    /// Whether any value is present under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        !self.get_all(key).is_empty()
    }

    /// Remove every occurrence of `key`.
    pub fn remove(&mut self, key: &str) {
        let key = canonical_header_key(key);
        self.entries.retain(|(k, _)| *k != key);
    }

    /// Iterate `(key, values)` pairs in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, values)| (k.as_str(), values.as_slice()))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no keys at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An owned snapshot of an inbound HTTP request.
///
/// Built once by the host pipeline at the edge; the bridge copies from it and
/// never writes back, so script-side mutation cannot leak into the native
/// request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRequest {
    /// Request method, as received (`GET`, `POST`, ...)
    pub method: String,
    /// Request target as received (origin-form `/path?q=1` or absolute)
    pub url: String,
    /// Protocol version string (`HTTP/1.1`)
    pub proto: String,
    /// Host the request was addressed to
    pub host: String,
    /// Remote peer address (`ip:port`)
    pub remote_addr: String,
    /// Whether the connection was TLS-terminated
    pub tls: bool,
    /// Request headers
    pub headers: Headers,
}

impl HttpRequest {
    /// Create a request snapshot with the given method and target.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            proto: "HTTP/1.1".to_string(),
            host: String::new(),
            remote_addr: String::new(),
            tls: false,
            headers: Headers::new(),
        }
    }

    /// Create a GET request snapshot.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Set the host (builder pattern).
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the remote peer address (builder pattern).
    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = addr.into();
        self
    }

    /// Set the protocol version string (builder pattern).
    pub fn proto(mut self, proto: impl Into<String>) -> Self {
        self.proto = proto.into();
        self
    }

    /// Mark the request as TLS-terminated (builder pattern).
    pub fn tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Add a header occurrence (builder pattern).
    pub fn header(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.append(key, value);
        self
    }
}
