//! Control surface of the interactive chat session
//!
//! The chat session owns the local model while the user is talking to it.
//! The orchestrator only borrows it when the session is idle, by asking the
//! session to load the default model and then to unload it into the
//! [`ModelStore`](crate::model::ModelStore).

use std::sync::Arc;

use crate::catalog::ModelDescriptor;

/// What the orchestrator may ask of a chat session
pub trait InteractiveSession: Send + Sync {
    fn is_model_loaded(&self) -> bool;

    /// True while the session is generating a reply for the user
    fn response_in_progress(&self) -> bool;

    /// Start loading `model`; completion is observed through
    /// [`InteractiveSession::is_model_loaded`].
    fn request_model_change(&self, model: &ModelDescriptor);

    /// Hand the session's model back to the store
    fn unload_model(&self);
}

/// Lookup of the session currently shown to the user
pub trait SessionDirectory: Send + Sync {
    fn current_session(&self) -> Option<Arc<dyn InteractiveSession>>;
}

/// Directory for headless use: there is never a current session.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSessions;

impl SessionDirectory for NoSessions {
    fn current_session(&self) -> Option<Arc<dyn InteractiveSession>> {
        None
    }
}
