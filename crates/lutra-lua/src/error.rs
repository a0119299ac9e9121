//! Error taxonomy for the bridge.
//!
//! Configuration problems are fatal at provision time and never deferred to
//! request time; script and contract problems are recovered per request into
//! the standard 500 response; marshalling problems only occur past the depth
//! guard and surface as `json_encode` error tuples inside the script.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Provision-time configuration error. Fatal to activating the handler.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("script source is empty")]
    EmptySource,

    #[error("cannot resolve script path {path}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("script file does not exist: {0}")]
    NotFound(PathBuf),

    #[error("cannot read script file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Request-time script failure, recovered into a 500 response.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("{0}")]
    Lua(#[from] mlua::Error),

    #[error("script does not define a callable 'handle' function")]
    MissingEntryPoint,

    #[error("response contract violation: {0}")]
    Contract(String),
}

pub type ScriptResult<T> = Result<T, ScriptError>;

/// Value-conversion failure. The marshaller is total over finite acyclic
/// values; only the depth guard produces this.
#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("value nesting exceeds {0} levels; cyclic table?")]
    TooDeep(usize),
}
