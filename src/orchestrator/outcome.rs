//! How each warm-up call ended, for callers that need more than the counter

use tokio::sync::mpsc;

use crate::error::{Error, FailureKind};
use crate::worker::DispatchStatus;

/// Final result of one warm-up call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarmupOutcome {
    /// The model produced its one token
    Completed { response: String },
    /// The call was dispatched but the worker failed, panicked or never ran
    Failed { reason: String },
    /// Nothing was dispatched
    Aborted { kind: FailureKind, reason: String },
}

impl WarmupOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, WarmupOutcome::Completed { .. })
    }

    pub(crate) fn aborted(error: &Error) -> Self {
        WarmupOutcome::Aborted {
            kind: error.kind(),
            reason: error.to_string(),
        }
    }

    pub(crate) fn from_status(status: &DispatchStatus) -> Self {
        match status {
            DispatchStatus::Completed(outcome) => WarmupOutcome::Completed {
                response: outcome.response.clone(),
            },
            DispatchStatus::Failed(e) => WarmupOutcome::Failed {
                reason: e.to_string(),
            },
            DispatchStatus::Panicked => WarmupOutcome::Failed {
                reason: "inference worker panicked".into(),
            },
            DispatchStatus::Abandoned => WarmupOutcome::Failed {
                reason: "inference worker never ran".into(),
            },
        }
    }
}

/// Observer of finished warm-up calls
pub trait OutcomeSink: Send + Sync {
    /// Called once per call, before its gate ticket is settled
    fn warmup_finished(&self, collection: &str, outcome: &WarmupOutcome);
}

/// Sink that forwards `(collection, outcome)` pairs over a channel
#[derive(Debug, Clone)]
pub struct ChannelOutcomes {
    tx: mpsc::UnboundedSender<(String, WarmupOutcome)>,
}

impl ChannelOutcomes {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, WarmupOutcome)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl OutcomeSink for ChannelOutcomes {
    fn warmup_finished(&self, collection: &str, outcome: &WarmupOutcome) {
        let _ = self.tx.send((collection.to_string(), outcome.clone()));
    }
}
