//! Transport-neutral HTTP types for the lutra scripting bridge.
//!
//! The bridge in `lutra-lua` is specified against a handful of small native
//! types rather than any particular server framework:
//!
//! - [`HttpRequest`] — an owned snapshot of an inbound request
//! - [`Headers`] — an ordered, canonical-cased, multi-value header map
//! - [`ResponseWriter`] — the outbound transport seam (single commit)
//! - [`Next`] — the continuation capability for the downstream pipeline stage
//!
//! A host pipeline adapts its own request/response objects to these types at
//! the edge; [`MemoryResponseWriter`] is a ready-made writer for tests and
//! in-process embedding.

mod http;
mod pipeline;

pub use http::{canonical_header_key, Headers, HttpRequest};
pub use pipeline::{MemoryResponseWriter, Next, NoopNext, PipelineError, ResponseWriter};
