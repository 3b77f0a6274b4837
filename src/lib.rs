//! LocalDocs warm-up pipeline.
//!
//! When the indexer finishes a document, the [`Orchestrator`] borrows the
//! loaded language model (or builds a remote adapter), runs one bounded
//! prompt over the document on a detached worker, and returns the model to
//! the [`ModelStore`]. A per-collection [`BusyGate`] keeps the collection
//! from reporting ready while any such call is outstanding.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod gate;
pub mod inference;
pub mod localdocs;
pub mod model;
pub mod orchestrator;
pub mod prompt;
pub mod session;
pub mod worker;

// Re-export commonly used types
pub use catalog::{ModelCatalog, ModelDescriptor, SamplingParams, SamplingSettings};
pub use config::ServiceConfig;
pub use error::{Error, FailureKind, Result};
pub use gate::{BusyGate, GateTicket, ReadinessSink};
pub use localdocs::{IndexRequest, LocalDocs};
pub use model::{LanguageModel, ModelHandle, ModelKind, ModelStore};
pub use orchestrator::{Collaborators, Orchestrator, OrchestratorHandle};
pub use session::{InteractiveSession, SessionDirectory};
