//! The seams between the bridge and the host pipeline.
//!
//! [`ResponseWriter`] is the outbound transport: headers may be added until
//! the status line is committed with `write_head`, after which only body
//! writes are allowed. A writer commits at most once; later commit attempts
//! return an error the caller logs rather than retries, because the response
//! is already on the wire.
//!
//! [`Next`] is the continuation capability handed to a script: one operation,
//! invoke the downstream stage and report an optional error. The host binds
//! its own request/response objects when it constructs the value, which keeps
//! the boundary narrow enough to test in isolation.

use crate::http::Headers;
use std::io;
use thiserror::Error;

/// Error surfaced by the downstream pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("downstream handler failed: {0}")]
    Downstream(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Outbound response transport.
pub trait ResponseWriter {
    /// Add a header occurrence. Only effective before `write_head`.
    fn add_header(&mut self, key: &str, value: &str);

    /// Commit the status line. Errors if the response is already committed.
    fn write_head(&mut self, status: u16) -> io::Result<()>;

    /// Write body bytes. Errors if the status line has not been committed.
    fn write_body(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Whether the status line has been committed.
    fn is_committed(&self) -> bool;
}

/// Continuation capability: synchronously invoke the next pipeline stage.
pub trait Next {
    fn invoke(&mut self) -> Result<(), PipelineError>;
}

impl<F> Next for F
where
    F: FnMut() -> Result<(), PipelineError>,
{
    fn invoke(&mut self) -> Result<(), PipelineError> {
        self()
    }
}

/// A terminal continuation that does nothing and succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNext;

impl Next for NoopNext {
    fn invoke(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// In-memory [`ResponseWriter`] for tests and in-process embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryResponseWriter {
    /// Committed status, if `write_head` has run.
    pub status: Option<u16>,
    /// Headers accumulated before the commit.
    pub headers: Headers,
    /// Body bytes written after the commit.
    pub body: Vec<u8>,
}

impl MemoryResponseWriter {
    /// Create an empty, uncommitted writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Body bytes as a lossy string, for assertions.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl ResponseWriter for MemoryResponseWriter {
    fn add_header(&mut self, key: &str, value: &str) {
        self.headers.append(key, value);
    }

    fn write_head(&mut self, status: u16) -> io::Result<()> {
        if self.status.is_some() {
            return Err(io::Error::other("response already committed"));
        }
        self.status = Some(status);
        Ok(())
    }

    fn write_body(&mut self, chunk: &[u8]) -> io::Result<()> {
        if self.status.is_none() {
            return Err(io::Error::other("status line not committed"));
        }
        self.body.extend_from_slice(chunk);
        Ok(())
    }

    fn is_committed(&self) -> bool {
        self.status.is_some()
    }
}
