//! Error types for the Pagewright core library.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error types for Pagewright.
///
/// Template validation variants always carry the template's source path so a
/// failure can be traced back to the module that caused it.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The template config name resolved to an empty string.
    #[error("Template {path} is missing a \"name\" in its config")]
    ConfigNameMissing { path: String },

    /// Both `streamId` and `stream` were declared.
    #[error("Template {path} must not define both \"streamId\" and \"stream\" in its config")]
    AmbiguousStreamConfig { path: String },

    /// The template does not export `getPath`.
    #[error("Template {path} is missing an exported getPath function")]
    MissingGetPath { path: String },

    /// The template exports neither `render` nor `default`.
    #[error("Template {path} must export either a render function or a default component")]
    NoRenderableExport { path: String },

    /// The declared config has the wrong shape.
    #[error("Template {path} has an invalid config: {message}")]
    InvalidConfig { path: String, message: String },

    /// `getPath` produced a value that is not a legal relative path.
    #[error("getPath returned an invalid value {value:?} in template {path}: {reason}")]
    InvalidGetPathValue {
        path: String,
        value: String,
        reason: String,
    },

    /// Two static templates produce the same output path.
    #[error("Static path {static_path:?} is produced by both {first} and {second}")]
    DuplicateStaticPath {
        static_path: String,
        first: String,
        second: String,
    },

    /// The module loader has nothing registered for a path.
    #[error("Template module not found: {0}")]
    ModuleNotFound(String),

    /// Configuration loading or parsing error.
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Build manifest could not be read.
    #[error("Manifest error in {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    /// File system I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic configuration crate error.
    #[error("Config crate error: {0}")]
    ConfigCrate(#[from] config::ConfigError),
}

impl CoreError {
    /// Create a new configuration error with a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new configuration error with source.
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new invalid template config error.
    pub fn invalid_config(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid `getPath` value error.
    pub fn invalid_get_path(
        path: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidGetPathValue {
            path: path.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a new manifest error.
    pub fn manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Template path the error refers to, for template validation errors.
    #[must_use]
    pub fn template_path(&self) -> Option<&str> {
        match self {
            Self::ConfigNameMissing { path }
            | Self::AmbiguousStreamConfig { path }
            | Self::MissingGetPath { path }
            | Self::NoRenderableExport { path }
            | Self::InvalidConfig { path, .. }
            | Self::InvalidGetPathValue { path, .. } => Some(path),
            _ => None,
        }
    }
}
