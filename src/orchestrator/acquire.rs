//! Model acquisition for one processed document
//!
//! Resolves the default model and produces a handle the worker can own:
//! a fresh adapter for remote models, or the store's local model. When no
//! local model is resident the idle chat session is asked to load it, then
//! to unload it into the store, and the store is acquired again.

use tracing::{debug, info};

use super::Collaborators;
use crate::catalog::ModelDescriptor;
use crate::config::PollWindow;
use crate::error::{Error, Result};
use crate::model::{chat_api, ModelHandle, ModelStore, PromptContext};
use crate::prompt::PromptPayload;
use crate::worker::ReleasePolicy;

/// A handle ready for dispatch
#[derive(Debug)]
pub struct Prepared {
    pub handle: ModelHandle,
    pub release: ReleasePolicy,
    pub payload: PromptPayload,
    pub ctx: PromptContext,
}

pub(crate) async fn prepare(
    deps: &Collaborators,
    store: &ModelStore,
    collection: &str,
    content: &str,
) -> Result<Prepared> {
    let model = deps
        .catalog
        .default_model()
        .filter(|m| !m.filename.is_empty())
        .ok_or(Error::NoDefaultModel)?;

    let (handle, release) = if model.is_online {
        let handle = chat_api::connect(&model, &deps.remote)?;
        (handle, ReleasePolicy::Dispose)
    } else {
        let handle = acquire_local(deps, store, &model).await?;
        (handle, ReleasePolicy::ReturnToStore)
    };

    let ctx = PromptContext::single_token(&deps.sampling.sampling_for(&model));
    let payload = PromptPayload::build(collection, content, handle.kind());
    debug!(
        "Warm-up prompt for '{}' on '{}': {}",
        collection,
        model.display_name(),
        payload.as_str()
    );

    Ok(Prepared {
        handle,
        release,
        payload,
        ctx,
    })
}

async fn acquire_local(
    deps: &Collaborators,
    store: &ModelStore,
    model: &ModelDescriptor,
) -> Result<ModelHandle> {
    let handle = store.acquire();
    if handle.is_loaded() {
        return Ok(handle);
    }
    store.release(handle);

    let name = model.display_name().to_string();
    let session = deps
        .sessions
        .current_session()
        .ok_or_else(|| Error::NoSession(name.clone()))?;
    if session.is_model_loaded() {
        return Err(Error::SessionAlreadyLoaded);
    }
    if session.response_in_progress() {
        return Err(Error::SessionBusy);
    }

    info!("No model in store; asking the chat session to load '{}'", name);
    session.request_model_change(model);

    let load = deps.wait.load;
    if !wait_until(load, || session.is_model_loaded()).await {
        return Err(Error::LoadTimeout {
            model: name,
            waited: load.total(),
        });
    }
    if session.response_in_progress() {
        return Err(Error::SessionBusy);
    }

    // The session may be reopened by the user between unload and reacquire.
    session.unload_model();
    let unload = deps.wait.unload;
    if !wait_until(unload, || store.holds_loaded()).await {
        return Err(Error::UnloadTimeout {
            model: name,
            waited: unload.total(),
        });
    }

    let handle = store.acquire();
    if !handle.is_loaded() {
        store.release(handle);
        return Err(Error::AcquiredUnloaded);
    }
    debug!("Reacquired '{}' from store", name);
    Ok(handle)
}

/// Poll `ready` up to `window.attempts` times, sleeping between polls.
async fn wait_until(window: PollWindow, mut ready: impl FnMut() -> bool) -> bool {
    for _ in 0..window.attempts {
        if ready() {
            return true;
        }
        tokio::time::sleep(window.interval()).await;
    }
    ready()
}
