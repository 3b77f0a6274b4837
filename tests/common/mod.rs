//! Fakes and a harness for orchestrator tests

#![allow(dead_code)]

use localdocs_core::{
    catalog::{ConfiguredSampling, ModelCatalog, ModelDescriptor},
    config::{RemoteConfig, WaitPolicy},
    gate::ChannelReadiness,
    model::{
        LanguageModel, ModelError, ModelHandle, ModelStore, PromptCallback, PromptContext,
        ResponseCallback,
    },
    orchestrator::{ChannelOutcomes, Collaborators, Orchestrator, OrchestratorHandle, WarmupOutcome},
    session::{InteractiveSession, SessionDirectory},
};
use parking_lot::{Condvar, Mutex};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How a [`FakeModel`] answers a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Reply,
    Fail,
    Panic,
}

/// One-shot gate a worker thread can block on
#[derive(Default)]
pub struct Latch {
    open: Mutex<bool>,
    opened: Condvar,
}

impl Latch {
    pub fn open(&self) {
        *self.open.lock() = true;
        self.opened.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.opened.wait(&mut open);
        }
    }
}

/// In-memory model that counts prompt calls
pub struct FakeModel {
    behavior: Behavior,
    prompts: Arc<AtomicUsize>,
    latch: Option<Arc<Latch>>,
}

impl FakeModel {
    pub fn new(behavior: Behavior, prompts: Arc<AtomicUsize>) -> Self {
        Self {
            behavior,
            prompts,
            latch: None,
        }
    }

    pub fn handle(behavior: Behavior, prompts: Arc<AtomicUsize>) -> ModelHandle {
        ModelHandle::local(Box::new(Self::new(behavior, prompts)), "fake.gguf")
    }

    /// Replies only once `latch` is opened
    pub fn held(prompts: Arc<AtomicUsize>, latch: Arc<Latch>) -> ModelHandle {
        let model = Self {
            latch: Some(latch),
            ..Self::new(Behavior::Reply, prompts)
        };
        ModelHandle::local(Box::new(model), "fake.gguf")
    }
}

impl LanguageModel for FakeModel {
    fn is_model_loaded(&self) -> bool {
        true
    }

    fn prompt(
        &mut self,
        prompt: &str,
        on_prompt: &mut PromptCallback<'_>,
        on_response: &mut ResponseCallback<'_>,
        ctx: &PromptContext,
    ) -> Result<(), ModelError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        if let Some(latch) = &self.latch {
            latch.wait();
        }
        assert_eq!(ctx.n_predict, 1);
        assert!(prompt.starts_with("### Context from LocalDocs:"));
        match self.behavior {
            Behavior::Reply => {
                if on_prompt(&[1, 2, 3], false) {
                    on_response(42, "ok");
                }
                Ok(())
            }
            Behavior::Fail => Err(ModelError::Backend("out of memory".into())),
            Behavior::Panic => panic!("fake model panicked"),
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    loaded: bool,
    responding: bool,
    load_requested: bool,
    polls_after_request: usize,
}

/// Chat session that loads the requested model after a number of polls
pub struct FakeSession {
    store: ModelStore,
    /// Polls of `is_model_loaded` before the load completes; `None` never loads
    loads_after: Option<usize>,
    /// Start responding to the user as soon as the load completes
    busy_on_load: bool,
    /// Hand the model to the store when asked to unload
    releases_on_unload: bool,
    state: Mutex<SessionState>,
    pub change_requests: AtomicUsize,
    pub unloads: AtomicUsize,
    pub prompts: Arc<AtomicUsize>,
}

impl FakeSession {
    pub fn new(store: ModelStore) -> Self {
        Self {
            store,
            loads_after: Some(3),
            busy_on_load: false,
            releases_on_unload: true,
            state: Mutex::new(SessionState::default()),
            change_requests: AtomicUsize::new(0),
            unloads: AtomicUsize::new(0),
            prompts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn never_loads(mut self) -> Self {
        self.loads_after = None;
        self
    }

    pub fn busy_on_load(mut self) -> Self {
        self.busy_on_load = true;
        self
    }

    pub fn keeps_model_on_unload(mut self) -> Self {
        self.releases_on_unload = false;
        self
    }

    pub fn already_loaded(self) -> Self {
        self.state.lock().loaded = true;
        self
    }

    pub fn responding(self) -> Self {
        self.state.lock().responding = true;
        self
    }

    pub fn change_requests(&self) -> usize {
        self.change_requests.load(Ordering::SeqCst)
    }

    pub fn unloads(&self) -> usize {
        self.unloads.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

impl InteractiveSession for FakeSession {
    fn is_model_loaded(&self) -> bool {
        let mut state = self.state.lock();
        if state.loaded || !state.load_requested {
            return state.loaded;
        }
        state.polls_after_request += 1;
        if let Some(after) = self.loads_after {
            if state.polls_after_request >= after {
                state.loaded = true;
                state.responding = self.busy_on_load;
            }
        }
        state.loaded
    }

    fn response_in_progress(&self) -> bool {
        self.state.lock().responding
    }

    fn request_model_change(&self, _model: &ModelDescriptor) {
        self.change_requests.fetch_add(1, Ordering::SeqCst);
        self.state.lock().load_requested = true;
    }

    fn unload_model(&self) {
        self.unloads.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if !state.loaded {
            return;
        }
        state.loaded = false;
        if self.releases_on_unload {
            self.store
                .release(FakeModel::handle(Behavior::Reply, self.prompts.clone()));
        }
    }
}

/// Directory that always returns the same session (or none)
pub struct FixedSessions(pub Option<Arc<FakeSession>>);

impl SessionDirectory for FixedSessions {
    fn current_session(&self) -> Option<Arc<dyn InteractiveSession>> {
        self.0
            .clone()
            .map(|session| session as Arc<dyn InteractiveSession>)
    }
}

/// Catalog with a fixed default model
pub struct FixedCatalog(pub Option<ModelDescriptor>);

impl ModelCatalog for FixedCatalog {
    fn default_model(&self) -> Option<ModelDescriptor> {
        self.0.clone()
    }
}

pub fn local_model() -> ModelDescriptor {
    ModelDescriptor {
        id: "orca".into(),
        name: "Orca Mini".into(),
        filename: "orca-mini.gguf".into(),
        dir_path: PathBuf::from("/models"),
        is_online: false,
        is_compatible_api: false,
        url: String::new(),
    }
}

pub fn remote_model(dir: &Path, compatible: bool, url: &str) -> ModelDescriptor {
    ModelDescriptor {
        id: "remote".into(),
        name: "Remote API".into(),
        filename: "api.rmodel".into(),
        dir_path: dir.to_path_buf(),
        is_online: true,
        is_compatible_api: compatible,
        url: url.into(),
    }
}

/// A running orchestrator plus the readiness events and outcomes it emits
pub struct Harness {
    pub handle: OrchestratorHandle,
    pub store: ModelStore,
    pub events: mpsc::UnboundedReceiver<(String, usize)>,
    pub outcomes: mpsc::UnboundedReceiver<(String, WarmupOutcome)>,
    pub task: JoinHandle<()>,
}

impl Harness {
    pub fn start(
        model: Option<ModelDescriptor>,
        sessions: Option<Arc<FakeSession>>,
        store: ModelStore,
    ) -> Self {
        let (outcome_sink, outcomes) = ChannelOutcomes::new();
        let deps = Collaborators {
            catalog: Arc::new(FixedCatalog(model)),
            sampling: Arc::new(ConfiguredSampling::default()),
            sessions: Arc::new(FixedSessions(sessions)),
            wait: WaitPolicy::default(),
            remote: RemoteConfig::default(),
            outcomes: Some(Arc::new(outcome_sink)),
        };
        let (sink, events) = ChannelReadiness::new();
        let (orchestrator, handle) = Orchestrator::new(store.clone(), deps, Some(Arc::new(sink)));
        Self {
            handle,
            store,
            events,
            outcomes,
            task: orchestrator.spawn(),
        }
    }

    /// Counts reported for `collection` up to and including the first zero
    pub async fn settled(&mut self, collection: &str) -> Vec<usize> {
        let mut seen = Vec::new();
        while let Some((name, count)) = self.events.recv().await {
            if name != collection {
                continue;
            }
            seen.push(count);
            if count == 0 {
                break;
            }
        }
        seen
    }

    /// Next outcome reported for `collection`
    pub async fn outcome(&mut self, collection: &str) -> WarmupOutcome {
        while let Some((name, outcome)) = self.outcomes.recv().await {
            if name == collection {
                return outcome;
            }
        }
        panic!("orchestrator stopped before reporting '{}'", collection);
    }

    pub async fn stop(self) {
        self.handle.shutdown().unwrap();
        self.task.await.unwrap();
    }
}
