//! Model abstraction shared by local and remote backends
//!
//! A [`ModelHandle`] owns one [`LanguageModel`] (or nothing) and carries a
//! [`ModelKind`] tag that is fixed when the handle is built. Local handles
//! circulate through the [`ModelStore`]; remote handles are built per call
//! and simply dropped.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod chat_api;
pub mod store;

pub use chat_api::{ChatApiModel, RemoteModelFile};
pub use store::ModelStore;

use crate::catalog::SamplingParams;

/// Token id as reported by a backend. Remote backends report `-1`.
pub type Token = i32;

/// Called for every batch of prompt tokens; `cached` is set when the batch
/// was already in the context. Returning `false` aborts prompt processing.
pub type PromptCallback<'a> = dyn FnMut(&[Token], bool) -> bool + 'a;

/// Called for every generated piece. Returning `false` stops generation.
pub type ResponseCallback<'a> = dyn FnMut(Token, &str) -> bool + 'a;

/// Errors raised by a model call
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model is not loaded")]
    NotLoaded,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed prompt: {0}")]
    Prompt(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Decoding parameters for a single prompt call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PromptContext {
    pub n_predict: i32,
    pub top_k: i32,
    pub top_p: f32,
    pub min_p: f32,
    pub temp: f32,
    pub n_batch: i32,
    pub repeat_penalty: f32,
    pub repeat_last_n: i32,
}

impl PromptContext {
    /// Context for a warm-up call: one predicted token, everything else from
    /// the model's sampling settings.
    pub fn single_token(sampling: &SamplingParams) -> Self {
        Self {
            n_predict: 1,
            top_k: sampling.top_k,
            top_p: sampling.top_p as f32,
            min_p: sampling.min_p as f32,
            temp: sampling.temperature as f32,
            n_batch: sampling.prompt_batch_size,
            repeat_penalty: sampling.repeat_penalty as f32,
            repeat_last_n: sampling.repeat_penalty_tokens,
        }
    }
}

/// Capability set every backend exposes
pub trait LanguageModel: Send {
    /// Whether weights (or a usable endpoint) are ready
    fn is_model_loaded(&self) -> bool;

    /// Run one bounded prompt call, streaming pieces through `on_response`.
    fn prompt(
        &mut self,
        prompt: &str,
        on_prompt: &mut PromptCallback<'_>,
        on_response: &mut ResponseCallback<'_>,
        ctx: &PromptContext,
    ) -> Result<(), ModelError>;
}

/// Where a handle's model lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Weights loaded in process memory; custody goes through the store
    Local,
    /// HTTP adapter; never enters the store
    Remote,
}

/// Owning handle to a model, or to nothing
pub struct ModelHandle {
    model: Option<Box<dyn LanguageModel>>,
    kind: ModelKind,
    file: Option<PathBuf>,
}

impl ModelHandle {
    /// A local handle that holds no model
    pub fn empty() -> Self {
        Self {
            model: None,
            kind: ModelKind::Local,
            file: None,
        }
    }

    /// Wrap a model loaded in process memory
    pub fn local(model: Box<dyn LanguageModel>, file: impl Into<PathBuf>) -> Self {
        Self {
            model: Some(model),
            kind: ModelKind::Local,
            file: Some(file.into()),
        }
    }

    /// Wrap a remote adapter
    pub fn remote(model: Box<dyn LanguageModel>, file: impl Into<PathBuf>) -> Self {
        Self {
            model: Some(model),
            kind: ModelKind::Remote,
            file: Some(file.into()),
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// True when the handle wraps no model at all
    pub fn is_empty(&self) -> bool {
        self.model.is_none()
    }

    /// True when the handle wraps a model that reports itself loaded
    pub fn is_loaded(&self) -> bool {
        self.model.as_ref().is_some_and(|m| m.is_model_loaded())
    }

    pub fn model_mut(&mut self) -> Option<&mut (dyn LanguageModel + 'static)> {
        self.model.as_deref_mut()
    }
}

impl Default for ModelHandle {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("kind", &self.kind)
            .field("file", &self.file)
            .field("model", &self.model.as_ref().map(|_| "<model>"))
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
