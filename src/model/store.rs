//! Single-slot custody store for the loaded local model

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, trace, warn};

use super::{ModelHandle, ModelKind};

/// Process-wide custody of the currently loaded local model.
///
/// The store hands the model out by value: after [`ModelStore::acquire`]
/// nobody else can reach it until the holder gives it back with
/// [`ModelStore::release`]. The store never loads anything itself.
///
/// Clones share the same slot.
#[derive(Clone, Default)]
pub struct ModelStore {
    slot: Arc<Mutex<Option<ModelHandle>>>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `handle`
    pub fn with_handle(handle: ModelHandle) -> Self {
        let store = Self::new();
        store.release(handle);
        store
    }

    /// Take whatever the store holds. Never blocks on a load and never fails;
    /// an empty store yields [`ModelHandle::empty`].
    pub fn acquire(&self) -> ModelHandle {
        let handle = self.slot.lock().take().unwrap_or_default();
        trace!(loaded = handle.is_loaded(), "Model acquired from store");
        handle
    }

    /// Give a handle back. Afterwards the store holds exactly `handle`.
    pub fn release(&self, handle: ModelHandle) {
        if handle.kind() == ModelKind::Remote {
            warn!("Refusing to store a remote model handle; disposing it");
            return;
        }

        let mut slot = self.slot.lock();
        if let Some(previous) = slot.as_ref() {
            if previous.is_loaded() {
                error!("Store already held a loaded model; the previous model is dropped");
            }
        }
        trace!(loaded = handle.is_loaded(), "Model released to store");
        *slot = Some(handle);
    }

    /// Whether the slot currently holds a loaded model. Does not take custody.
    pub fn holds_loaded(&self) -> bool {
        self.slot.lock().as_ref().is_some_and(ModelHandle::is_loaded)
    }
}

impl std::fmt::Debug for ModelStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelStore")
            .field("holds_loaded", &self.holds_loaded())
            .finish()
    }
}
