//! Script source configuration and provision-time loading.
//!
//! A handler is configured with either an inline script block or a file
//! path. File paths are absolutized, checked, and read once at provision
//! time: a missing or unreadable script prevents the handler from activating
//! at all, and request handling never touches the filesystem (no hot-reload
//! by design).

use crate::error::ConfigError;
use std::fs;
use std::path::PathBuf;

/// Where the script text comes from.
#[derive(Debug, Clone)]
pub enum ScriptSource {
    /// Script text supplied directly in configuration.
    Inline(String),
    /// Path to a script file, resolved at provision time.
    File(PathBuf),
}

/// How the script is invoked per request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvocationMode {
    /// The script body runs top-level and works against the registered
    /// `lutra.*` tables.
    #[default]
    Ambient,
    /// The script must define a global `handle(request, response)` function,
    /// which the host calls once after loading. A missing or non-callable
    /// `handle` fails the request with a descriptive 500.
    EntryPoint,
}

/// Handler configuration.
#[derive(Debug, Clone)]
pub struct ScriptConfig {
    pub source: ScriptSource,
    pub mode: InvocationMode,
}

impl ScriptConfig {
    /// Configure an inline script block.
    pub fn inline(text: impl Into<String>) -> Self {
        Self {
            source: ScriptSource::Inline(text.into()),
            mode: InvocationMode::default(),
        }
    }

    /// Configure a script file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ScriptSource::File(path.into()),
            mode: InvocationMode::default(),
        }
    }

    /// Set the invocation mode (builder pattern).
    pub fn with_mode(mut self, mode: InvocationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Resolve the source into script text plus a chunk name for error
    /// messages. This is the fail-fast point for configuration errors.
    pub(crate) fn load(self) -> Result<LoadedScript, ConfigError> {
        match self.source {
            ScriptSource::Inline(text) => {
                if text.trim().is_empty() {
                    return Err(ConfigError::EmptySource);
                }
                Ok(LoadedScript {
                    text,
                    chunk_name: "inline".to_string(),
                    mode: self.mode,
                })
            }
            ScriptSource::File(path) => {
                let abs = path
                    .canonicalize()
                    .map_err(|source| match source.kind() {
                        std::io::ErrorKind::NotFound => ConfigError::NotFound(path.clone()),
                        _ => ConfigError::Resolve {
                            path: path.clone(),
                            source,
                        },
                    })?;
                let text = fs::read_to_string(&abs).map_err(|source| ConfigError::Unreadable {
                    path: abs.clone(),
                    source,
                })?;
                if text.trim().is_empty() {
                    return Err(ConfigError::EmptySource);
                }
                Ok(LoadedScript {
                    text,
                    chunk_name: abs.display().to_string(),
                    mode: self.mode,
                })
            }
        }
    }
}

/// A provisioned script: text in memory, ready to run.
#[derive(Debug, Clone)]
pub(crate) struct LoadedScript {
    pub text: String,
    pub chunk_name: String,
    pub mode: InvocationMode,
}
