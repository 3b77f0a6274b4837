//! Error types for the localdocs pipeline.

use std::io;
use std::path::PathBuf;
use std::result;
use std::time::Duration;
use thiserror::Error;

use crate::model::ModelError;

/// A specialized Result type for localdocs operations.
pub type Result<T> = result::Result<T, Error>;

/// How a failed invocation is classified.
///
/// Every kind is terminal for the invocation that produced it; none of them
/// is retried inside the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Missing or unusable configuration
    Configuration,
    /// The interactive session owns or is about to use the model
    Contention,
    /// A load or unload did not finish inside its poll window
    LoadTimeout,
    /// The model call itself failed
    Inference,
    /// Channel closed or another internal fault
    Internal,
}

/// The error type for localdocs operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No embedding model configured")]
    NoEmbeddingModel,

    #[error("No default model available")]
    NoDefaultModel,

    #[error("Cannot open API model file {path:?}: {source}")]
    RemoteConfigUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed API model file {path:?}: {source}")]
    RemoteConfigMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid API URL: {0}")]
    InvalidApiUrl(String),

    #[error("No interactive session available to load '{0}'")]
    NoSession(String),

    #[error("Interactive session already has a model loaded")]
    SessionAlreadyLoaded,

    #[error("Interactive session is generating a response")]
    SessionBusy,

    #[error("Model '{model}' did not load within {waited:?}")]
    LoadTimeout { model: String, waited: Duration },

    #[error("Model '{model}' was not released to the store within {waited:?}")]
    UnloadTimeout { model: String, waited: Duration },

    #[error("Model acquired from store is not loaded")]
    AcquiredUnloaded,

    #[error("Inference failed: {0}")]
    Inference(#[from] ModelError),

    #[error("Orchestrator is not running")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),
}

impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Config(_)
            | Error::NoEmbeddingModel
            | Error::NoDefaultModel
            | Error::RemoteConfigUnreadable { .. }
            | Error::RemoteConfigMalformed { .. }
            | Error::InvalidApiUrl(_)
            | Error::ConfigSource(_) => FailureKind::Configuration,
            Error::NoSession(_) | Error::SessionAlreadyLoaded | Error::SessionBusy => {
                FailureKind::Contention
            }
            Error::LoadTimeout { .. } | Error::UnloadTimeout { .. } | Error::AcquiredUnloaded => {
                FailureKind::LoadTimeout
            }
            Error::Inference(_) => FailureKind::Inference,
            Error::Closed | Error::Io(_) => FailureKind::Internal,
        }
    }
}
