//! Application-facing LocalDocs entry point
//!
//! [`LocalDocs`] forwards collection management to the database worker over
//! a typed queue and owns the handle through which that worker reports
//! processed documents to the warm-up orchestrator.

use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::orchestrator::OrchestratorHandle;

/// Requests consumed by the database worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexRequest {
    Start,
    AddFolder {
        collection: String,
        path: PathBuf,
        embedding_model: String,
    },
    RemoveFolder {
        collection: String,
        path: PathBuf,
    },
    ForceIndexing {
        collection: String,
        embedding_model: String,
    },
    ForceRebuildFolder {
        path: PathBuf,
    },
    ChangeChunkSize(usize),
    ChangeFileExtensions(Vec<String>),
    Shutdown,
}

#[derive(Debug)]
pub struct LocalDocs {
    index_tx: mpsc::UnboundedSender<IndexRequest>,
    embedding_model: Option<String>,
    orchestrator: OrchestratorHandle,
}

impl LocalDocs {
    pub fn new(
        index_tx: mpsc::UnboundedSender<IndexRequest>,
        embedding_model: Option<String>,
        orchestrator: OrchestratorHandle,
    ) -> Self {
        Self {
            index_tx,
            embedding_model: embedding_model.filter(|m| !m.is_empty()),
            orchestrator,
        }
    }

    /// Handle the database worker reports processed documents through
    pub fn orchestrator(&self) -> &OrchestratorHandle {
        &self.orchestrator
    }

    pub fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }

    pub fn set_embedding_model(&mut self, model: Option<String>) {
        self.embedding_model = model.filter(|m| !m.is_empty());
    }

    pub fn request_start(&self) -> Result<()> {
        self.send(IndexRequest::Start)
    }

    /// Index `path` into `collection`. `path` may be a `file://` URL.
    pub fn add_folder(&self, collection: &str, path: &str) -> Result<()> {
        let embedding_model = self.require_embedding_model()?;
        let path = local_path(path);
        info!("Adding folder {:?} to collection '{}'", path, collection);
        self.send(IndexRequest::AddFolder {
            collection: collection.to_string(),
            path,
            embedding_model,
        })
    }

    pub fn remove_folder(&self, collection: &str, path: &str) -> Result<()> {
        self.send(IndexRequest::RemoveFolder {
            collection: collection.to_string(),
            path: PathBuf::from(path),
        })
    }

    pub fn force_indexing(&self, collection: &str) -> Result<()> {
        let embedding_model = self.require_embedding_model()?;
        self.send(IndexRequest::ForceIndexing {
            collection: collection.to_string(),
            embedding_model,
        })
    }

    pub fn force_rebuild_folder(&self, path: &str) -> Result<()> {
        self.send(IndexRequest::ForceRebuildFolder {
            path: PathBuf::from(path),
        })
    }

    pub fn chunk_size_changed(&self, chunk_size: usize) -> Result<()> {
        self.send(IndexRequest::ChangeChunkSize(chunk_size))
    }

    pub fn file_extensions_changed(&self, extensions: Vec<String>) -> Result<()> {
        self.send(IndexRequest::ChangeFileExtensions(extensions))
    }

    /// Stop the database worker and the orchestrator. Either may already be gone.
    pub fn about_to_quit(&self) {
        if self.index_tx.send(IndexRequest::Shutdown).is_err() {
            debug!("Database worker already stopped");
        }
        if self.orchestrator.shutdown().is_err() {
            debug!("Orchestrator already stopped");
        }
    }

    fn require_embedding_model(&self) -> Result<String> {
        self.embedding_model.clone().ok_or_else(|| {
            warn!("No embedding model configured");
            Error::NoEmbeddingModel
        })
    }

    fn send(&self, request: IndexRequest) -> Result<()> {
        self.index_tx.send(request).map_err(|_| Error::Closed)
    }
}

/// `file://` URLs become local paths; anything else is taken as a path.
fn local_path(input: &str) -> PathBuf {
    Url::parse(input)
        .ok()
        .filter(|url| url.scheme() == "file")
        .and_then(|url| url.to_file_path().ok())
        .unwrap_or_else(|| PathBuf::from(input))
}
