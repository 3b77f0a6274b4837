//! Detached inference workers
//!
//! Each warm-up call runs on its own short-lived OS thread so the home task
//! never blocks on a model. The thread owns the model handle and the gate
//! ticket through a [`Lease`]; however the thread ends (success, model
//! error, panic, or never starting at all) the lease sends exactly one
//! [`Completion`] home, where the handle is released and the ticket settled.

use std::thread;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::gate::GateTicket;
use crate::inference::{run_prompt, InferenceOutcome};
use crate::model::{ModelError, ModelHandle, PromptContext};
use crate::prompt::PromptPayload;

/// What happens to the handle once the call is over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// Local model: hand it back to the store
    ReturnToStore,
    /// Remote adapter: drop it
    Dispose,
}

/// How a dispatched call ended
#[derive(Debug)]
pub enum DispatchStatus {
    Completed(InferenceOutcome),
    Failed(ModelError),
    Panicked,
    /// The worker thread never ran
    Abandoned,
}

impl DispatchStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, DispatchStatus::Completed(_))
    }
}

/// Everything a worker needs, moved in at spawn time
#[derive(Debug)]
pub struct DispatchJob {
    pub handle: ModelHandle,
    pub release: ReleasePolicy,
    pub payload: PromptPayload,
    pub ctx: PromptContext,
    pub ticket: GateTicket,
}

/// Message a worker sends home when it is done with the handle
#[derive(Debug)]
pub struct Completion {
    pub handle: ModelHandle,
    pub release: ReleasePolicy,
    pub ticket: GateTicket,
    pub status: DispatchStatus,
}

/// Custody of the handle and ticket while a call runs
struct Lease {
    parts: Option<(ModelHandle, ReleasePolicy, GateTicket)>,
    home: mpsc::UnboundedSender<Completion>,
}

impl Lease {
    fn handle_mut(&mut self) -> Option<&mut ModelHandle> {
        self.parts.as_mut().map(|(handle, _, _)| handle)
    }

    fn finish(mut self, status: DispatchStatus) {
        self.send_home(status);
    }

    fn send_home(&mut self, status: DispatchStatus) {
        let Some((handle, release, ticket)) = self.parts.take() else {
            return;
        };
        let completion = Completion {
            handle,
            release,
            ticket,
            status,
        };
        if self.home.send(completion).is_err() {
            warn!("Orchestrator is gone; completed model handle is dropped");
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if self.parts.is_none() {
            return;
        }
        let status = if thread::panicking() {
            DispatchStatus::Panicked
        } else {
            DispatchStatus::Abandoned
        };
        self.send_home(status);
    }
}

/// Start a detached worker thread for `job`. Nobody joins it.
pub fn spawn(job: DispatchJob, home: mpsc::UnboundedSender<Completion>, seq: u64) {
    let DispatchJob {
        handle,
        release,
        payload,
        ctx,
        ticket,
    } = job;
    let collection = ticket.collection().to_string();
    let mut lease = Lease {
        parts: Some((handle, release, ticket)),
        home,
    };

    let spawned = thread::Builder::new()
        .name(format!("localdocs-infer-{}", seq))
        .spawn(move || {
            let result = match lease.handle_mut().and_then(ModelHandle::model_mut) {
                Some(model) => run_prompt(model, &payload, &ctx),
                None => Err(ModelError::NotLoaded),
            };
            let status = match result {
                Ok(outcome) => {
                    info!(
                        "Warm-up for collection '{}' finished in {:?}",
                        collection, outcome.elapsed
                    );
                    DispatchStatus::Completed(outcome)
                }
                Err(e) => {
                    warn!("Warm-up for collection '{}' failed: {}", collection, e);
                    DispatchStatus::Failed(e)
                }
            };
            lease.finish(status);
        });

    if let Err(e) = spawned {
        error!("Failed to spawn inference worker: {}", e);
    }
}
