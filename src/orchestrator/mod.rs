//! Warm-up orchestrator
//!
//! The orchestrator runs as a single tokio task (the home task). It is the
//! only owner of the [`BusyGate`] and performs every store custody operation
//! of the pipeline. Three queues feed it:
//!
//! - commands from [`OrchestratorHandle`] (processed documents, queries,
//!   shutdown)
//! - completions from detached workers
//! - deferred decrements from gate tickets dropped unsettled
//!
//! Acquisitions that have to wait for the chat session are futures polled
//! by the home task alongside those queues, so the task never blocks.

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::{ModelCatalog, SamplingSettings};
use crate::config::{RemoteConfig, WaitPolicy};
use crate::error::{Error, FailureKind, Result};
use crate::gate::{BusyGate, GateTicket, ReadinessSink};
use crate::model::ModelStore;
use crate::session::SessionDirectory;
use crate::worker::{self, Completion, DispatchJob, DispatchStatus, ReleasePolicy};

mod acquire;
mod outcome;

pub use acquire::Prepared;
pub use outcome::{ChannelOutcomes, OutcomeSink, WarmupOutcome};

/// Everything the orchestrator consults but does not own
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn ModelCatalog>,
    pub sampling: Arc<dyn SamplingSettings>,
    pub sessions: Arc<dyn SessionDirectory>,
    pub wait: WaitPolicy,
    pub remote: RemoteConfig,
    /// Told how each warm-up call ended
    pub outcomes: Option<Arc<dyn OutcomeSink>>,
}

#[derive(Debug)]
enum Command {
    DocumentProcessed { collection: String, content: String },
    Outstanding {
        collection: String,
        reply: oneshot::Sender<usize>,
    },
    Shutdown,
}

type PendingAcquire = BoxFuture<'static, (GateTicket, Result<Prepared>)>;

/// Cloneable sender side of the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl OrchestratorHandle {
    /// Report that every chunk of a document in `collection` was processed.
    pub fn document_processed(
        &self,
        collection: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<()> {
        self.send(Command::DocumentProcessed {
            collection: collection.into(),
            content: content.into(),
        })
    }

    /// Number of warm-up calls currently outstanding for `collection`
    pub async fn outstanding(&self, collection: impl Into<String>) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Outstanding {
            collection: collection.into(),
            reply,
        })?;
        rx.await.map_err(|_| Error::Closed)
    }

    /// Stop accepting documents. The task exits once in-flight workers report back.
    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).map_err(|_| Error::Closed)
    }
}

/// The home task state
pub struct Orchestrator {
    store: ModelStore,
    deps: Arc<Collaborators>,
    gate: BusyGate,
    deferred: mpsc::UnboundedReceiver<String>,
    commands: mpsc::UnboundedReceiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    in_flight: usize,
    next_seq: u64,
}

impl Orchestrator {
    pub fn new(
        store: ModelStore,
        deps: Collaborators,
        readiness: Option<Arc<dyn ReadinessSink>>,
    ) -> (Self, OrchestratorHandle) {
        let (tx, commands) = mpsc::unbounded_channel();
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let (gate, deferred) = BusyGate::new(readiness);
        let orchestrator = Self {
            store,
            deps: Arc::new(deps),
            gate,
            deferred,
            commands,
            completions_tx,
            completions,
            in_flight: 0,
            next_seq: 0,
        };
        (orchestrator, OrchestratorHandle { tx })
    }

    /// Run the home loop on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        info!("LocalDocs orchestrator started");
        let mut pending: FuturesUnordered<PendingAcquire> = FuturesUnordered::new();
        let mut closing = false;

        loop {
            if closing && pending.is_empty() && self.in_flight == 0 {
                break;
            }

            // Commands first, so every queued document is counted before
            // pending acquisitions race for the model.
            tokio::select! {
                biased;

                command = self.commands.recv(), if !closing => match command {
                    Some(Command::DocumentProcessed { collection, content }) => {
                        let ticket = self.gate.enter(&collection);
                        pending.push(self.begin_acquire(ticket, collection, content));
                    }
                    Some(Command::Outstanding { collection, reply }) => {
                        let _ = reply.send(self.gate.outstanding(&collection));
                    }
                    Some(Command::Shutdown) | None => {
                        info!(
                            "Orchestrator shutting down ({} pending, {} in flight)",
                            pending.len(),
                            self.in_flight
                        );
                        closing = true;
                        pending.clear();
                    }
                },
                Some((ticket, prepared)) = pending.next(), if !pending.is_empty() => {
                    self.dispatch(ticket, prepared);
                }
                Some(completion) = self.completions.recv() => {
                    self.complete(completion);
                }
                Some(collection) = self.deferred.recv() => {
                    self.gate.settle_deferred(&collection);
                }
            }
        }

        while let Ok(collection) = self.deferred.try_recv() {
            self.gate.settle_deferred(&collection);
        }
        info!("LocalDocs orchestrator stopped");
    }

    fn begin_acquire(
        &self,
        ticket: GateTicket,
        collection: String,
        content: String,
    ) -> PendingAcquire {
        let deps = Arc::clone(&self.deps);
        let store = self.store.clone();
        async move {
            let prepared = acquire::prepare(&deps, &store, &collection, &content).await;
            (ticket, prepared)
        }
        .boxed()
    }

    fn dispatch(&mut self, ticket: GateTicket, prepared: Result<Prepared>) {
        let prepared = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                match e.kind() {
                    FailureKind::Contention => info!(
                        "Skipping warm-up for collection '{}': {}",
                        ticket.collection(),
                        e
                    ),
                    kind => warn!(
                        ?kind,
                        "Warm-up for collection '{}' aborted: {}",
                        ticket.collection(),
                        e
                    ),
                }
                self.report(ticket.collection(), WarmupOutcome::aborted(&e));
                self.gate.settle(ticket);
                return;
            }
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight += 1;
        debug!(
            "Dispatching warm-up #{} for collection '{}' ({:?})",
            seq,
            ticket.collection(),
            prepared.handle.kind()
        );

        let job = DispatchJob {
            handle: prepared.handle,
            release: prepared.release,
            payload: prepared.payload,
            ctx: prepared.ctx,
            ticket,
        };
        worker::spawn(job, self.completions_tx.clone(), seq);
    }

    fn complete(&mut self, completion: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let Completion {
            handle,
            release,
            ticket,
            status,
        } = completion;

        match &status {
            DispatchStatus::Completed(_) | DispatchStatus::Failed(_) => {}
            DispatchStatus::Panicked => warn!(
                "Inference worker for collection '{}' panicked",
                ticket.collection()
            ),
            DispatchStatus::Abandoned => warn!(
                "Inference worker for collection '{}' never ran",
                ticket.collection()
            ),
        }

        match release {
            ReleasePolicy::ReturnToStore => self.store.release(handle),
            ReleasePolicy::Dispose => drop(handle),
        }
        self.report(ticket.collection(), WarmupOutcome::from_status(&status));
        self.gate.settle(ticket);
    }

    fn report(&self, collection: &str, outcome: WarmupOutcome) {
        if let Some(sink) = &self.deps.outcomes {
            sink.warmup_finished(collection, &outcome);
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("store", &self.store)
            .field("gate", &self.gate)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}
