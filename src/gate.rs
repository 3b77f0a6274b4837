//! Per-collection busy counter
//!
//! A collection must not report "ready" while a warm-up call against one of
//! its documents is outstanding. Each outstanding call is represented by a
//! [`GateTicket`]; the counter goes down exactly once per ticket, either
//! through [`BusyGate::settle`] or, if the ticket is dropped unsettled,
//! through the deferred path drained by the orchestrator.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Observer of counter changes
pub trait ReadinessSink: Send + Sync {
    /// Called after every increment and decrement with the new count
    fn outstanding_changed(&self, collection: &str, outstanding: usize);
}

/// Sink that forwards `(collection, outstanding)` pairs over a channel
#[derive(Debug, Clone)]
pub struct ChannelReadiness {
    tx: mpsc::UnboundedSender<(String, usize)>,
}

impl ChannelReadiness {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, usize)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ReadinessSink for ChannelReadiness {
    fn outstanding_changed(&self, collection: &str, outstanding: usize) {
        let _ = self.tx.send((collection.to_string(), outstanding));
    }
}

/// Proof that a collection's counter was incremented.
///
/// Must be handed back to [`BusyGate::settle`]. A ticket dropped without
/// being settled queues its decrement instead, so the counter cannot leak.
#[must_use = "a gate ticket must be settled or the collection stays busy"]
#[derive(Debug)]
pub struct GateTicket {
    collection: String,
    deferred: Option<mpsc::UnboundedSender<String>>,
}

impl GateTicket {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn disarm(mut self) -> String {
        self.deferred = None;
        std::mem::take(&mut self.collection)
    }
}

impl Drop for GateTicket {
    fn drop(&mut self) {
        if let Some(deferred) = self.deferred.take() {
            debug!("Gate ticket for '{}' dropped unsettled; deferring decrement", self.collection);
            if deferred.send(std::mem::take(&mut self.collection)).is_err() {
                warn!("Gate is gone; dropped ticket cannot be settled");
            }
        }
    }
}

/// Outstanding-call counters, one per collection
pub struct BusyGate {
    counts: HashMap<String, usize>,
    sink: Option<Arc<dyn ReadinessSink>>,
    deferred: mpsc::UnboundedSender<String>,
}

impl BusyGate {
    /// Returns the gate and the receiver of deferred decrements, which the
    /// owner must feed back into [`BusyGate::settle_deferred`].
    pub fn new(sink: Option<Arc<dyn ReadinessSink>>) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (deferred, rx) = mpsc::unbounded_channel();
        let gate = Self {
            counts: HashMap::new(),
            sink,
            deferred,
        };
        (gate, rx)
    }

    /// Increment `collection` and return the ticket for the matching decrement.
    pub fn enter(&mut self, collection: &str) -> GateTicket {
        let count = self.counts.entry(collection.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        debug!("Collection '{}' busy count -> {}", collection, count);
        self.notify(collection, count);
        GateTicket {
            collection: collection.to_string(),
            deferred: Some(self.deferred.clone()),
        }
    }

    /// Decrement the ticket's collection.
    pub fn settle(&mut self, ticket: GateTicket) {
        let collection = ticket.disarm();
        self.decrement(&collection);
    }

    /// Apply a decrement queued by a dropped ticket.
    pub fn settle_deferred(&mut self, collection: &str) {
        self.decrement(collection);
    }

    pub fn outstanding(&self, collection: &str) -> usize {
        self.counts.get(collection).copied().unwrap_or(0)
    }

    pub fn is_busy(&self, collection: &str) -> bool {
        self.outstanding(collection) > 0
    }

    fn decrement(&mut self, collection: &str) {
        let Some(count) = self.counts.get_mut(collection) else {
            error!("Busy count for '{}' settled without an increment", collection);
            return;
        };
        *count -= 1;
        let count = *count;
        if count == 0 {
            self.counts.remove(collection);
        }
        debug!("Collection '{}' busy count -> {}", collection, count);
        self.notify(collection, count);
    }

    fn notify(&self, collection: &str, count: usize) {
        if let Some(sink) = &self.sink {
            sink.outstanding_changed(collection, count);
        }
    }
}

impl std::fmt::Debug for BusyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusyGate").field("counts", &self.counts).finish()
    }
}
