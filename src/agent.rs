//! # Agent driver
//!
//! An [`Agent`] pairs a [`Template`] with a completion provider. Binding it to
//! parameters yields an [`AgentHandle`], which owns one transcript, one output
//! tree and one coordination state for exactly one evaluation.
//!
//! ```text
//!  bind(params) ──▶ AgentHandle ──▶ stream()/run()/next_generated()
//!                      │   ▲
//!      input(queue) ───┘   └── on(name)/on_any()/subscribe()
//! ```

use std::future::IntoFuture;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_stream::try_stream;
use futures::{future, future::BoxFuture, stream, StreamExt, TryStreamExt};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::{AgentConfig, FragmentFilter};
use crate::eval::action::{Action, ActionProps, FragmentStream};
use crate::eval::context::{Context, ContextPatch};
use crate::eval::evaluator::run_actions;
use crate::eval::state::CoordinationState;
use crate::eval::{EvalError, EvalResult};
use crate::event::event_bus::{EventBus, EventKey, EventReceiver, GenerationEvent};
use crate::outputs::{OutputTree, OutputValue};
use crate::prompt::PromptFragment;
use crate::provider::provider::CompletionProvider;
use crate::shared::Shared;
use crate::transcript::Transcript;

pub type Params = Map<String, Value>;

type TemplateFn = dyn Fn(&Params) -> Vec<Action> + Send + Sync;

/// Ordered top-level actions. Each one is evaluated on its own; the template
/// itself is not a repetition.
#[derive(Clone)]
pub struct Template {
    build: Arc<TemplateFn>,
}

impl Template {
    pub fn new(actions: Vec<Action>) -> Self {
        Self {
            build: Arc::new(move |_| actions.clone()),
        }
    }

    /// A template built from the bound parameters.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Params) -> Vec<Action> + Send + Sync + 'static,
    {
        Self { build: Arc::new(f) }
    }

    pub fn actions(&self, params: &Params) -> Vec<Action> {
        (self.build)(params)
    }
}

impl From<Vec<Action>> for Template {
    fn from(actions: Vec<Action>) -> Self {
        Template::new(actions)
    }
}

type FragmentListener = Arc<dyn Fn(&PromptFragment) + Send + Sync>;
type ChunkListener = Arc<dyn Fn(&str) + Send + Sync>;
type ResponseListener = Arc<dyn Fn(&str, &OutputValue) + Send + Sync>;

/// Callbacks invoked while an agent is evaluated.
#[derive(Clone, Default)]
pub struct AgentListeners {
    on_fragment: Option<FragmentListener>,
    on_chunk: Option<ChunkListener>,
    on_response: Option<ResponseListener>,
}

impl AgentListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fragment, in transcript order.
    pub fn on_fragment<F>(mut self, f: F) -> Self
    where
        F: Fn(&PromptFragment) + Send + Sync + 'static,
    {
        self.on_fragment = Some(Arc::new(f));
        self
    }

    /// Content of every generated fragment.
    pub fn on_chunk<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_chunk = Some(Arc::new(f));
        self
    }

    /// Name and value of every completed generation.
    pub fn on_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &OutputValue) + Send + Sync + 'static,
    {
        self.on_response = Some(Arc::new(f));
        self
    }
}

pub struct Agent {
    template: Template,
    provider: Arc<dyn CompletionProvider>,
    config: AgentConfig,
}

impl Agent {
    pub fn new<T: Into<Template>>(template: T, provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            template: template.into(),
            provider,
            config: AgentConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn bind(&self, params: Params) -> AgentHandle {
        self.bind_with(params, AgentListeners::default())
    }

    /// Creates a fresh invocation: new transcript, outputs and state.
    pub fn bind_with(&self, params: Params, listeners: AgentListeners) -> AgentHandle {
        let id = Uuid::new_v4();
        let context = Context::new(Arc::clone(&self.provider)).derive(
            ContextPatch::default()
                .stream(self.config.stream)
                .sampling(self.config.sampling.clone()),
        );
        let events = Arc::new(EventBus::new(self.config.event_buffer_size));
        if let Some(on_response) = listeners.on_response.clone() {
            events.on(
                EventKey::Any,
                Arc::new(move |event: &GenerationEvent| on_response(&event.name, &event.value)),
            );
        }
        let actions = self.template.actions(&params);
        let props = ActionProps {
            context,
            state: Arc::new(CoordinationState::new()),
            outputs: Shared::default(),
            transcript: Shared::default(),
            params: Arc::new(params),
            events,
            next_literal: None,
        };
        info!(agent_id = %id, provider = self.provider.name(), actions = actions.len(), "Agent bound");

        AgentHandle {
            inner: Arc::new(AgentInner {
                id,
                actions,
                props,
                listeners,
                default_filter: self.config.fragment_filter,
                started: AtomicBool::new(false),
                cursor: Mutex::new(None),
            }),
        }
    }
}

struct AgentInner {
    id: Uuid,
    actions: Vec<Action>,
    props: ActionProps,
    listeners: AgentListeners,
    default_filter: FragmentFilter,
    started: AtomicBool,
    cursor: Mutex<Option<FragmentStream>>,
}

/// Clonable injector for an agent's input queues.
#[derive(Clone)]
pub struct InputSender {
    state: Arc<CoordinationState>,
}

impl InputSender {
    pub fn send<V: Into<Value>>(&self, queue: &str, value: V) {
        self.state.push_input(queue, value.into());
    }
}

/// One bound invocation of an [`Agent`]. Clones share the invocation.
#[derive(Clone)]
pub struct AgentHandle {
    inner: Arc<AgentInner>,
}

impl AgentHandle {
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Starts the evaluation and returns the fragments accepted by `filter`.
    /// The transcript and listeners see every fragment regardless.
    pub fn stream(&self, filter: FragmentFilter) -> FragmentStream {
        self.evaluate()
            .try_filter(move |fragment| future::ready(filter.accepts(fragment)))
            .boxed()
    }

    /// [`stream`](Self::stream) with the configured default filter.
    pub fn stream_default(&self) -> FragmentStream {
        self.stream(self.inner.default_filter)
    }

    /// Drives the evaluation to completion and returns the outputs.
    pub async fn run(&self) -> EvalResult<OutputTree> {
        let mut fragments = self.stream(FragmentFilter::All);
        while fragments.try_next().await?.is_some() {}
        Ok(self.outputs())
    }

    /// Pulls the evaluation until the next generated fragment and returns its
    /// content, or `None` once the template is exhausted.
    pub async fn next_generated(&self) -> EvalResult<Option<String>> {
        let mut cursor = self.inner.cursor.lock().await;
        let fragments = cursor.get_or_insert_with(|| self.stream(FragmentFilter::Generated));
        Ok(fragments.try_next().await?.map(|fragment| fragment.content))
    }

    pub fn input<V: Into<Value>>(&self, queue: &str, value: V) {
        self.inner.props.state.push_input(queue, value.into());
    }

    pub fn input_sender(&self) -> InputSender {
        InputSender {
            state: Arc::clone(&self.inner.props.state),
        }
    }

    /// Observer invoked synchronously after each generation named `name`.
    pub fn on<F>(&self, name: &str, f: F)
    where
        F: Fn(&GenerationEvent) + Send + Sync + 'static,
    {
        self.inner
            .props
            .events
            .on(EventKey::Named(name.to_string()), Arc::new(f));
    }

    pub fn on_any<F>(&self, f: F)
    where
        F: Fn(&GenerationEvent) + Send + Sync + 'static,
    {
        self.inner.props.events.on(EventKey::Any, Arc::new(f));
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.inner.props.events.subscribe()
    }

    pub fn close_loop(&self, loop_id: &str) {
        self.inner.props.state.close_loop(loop_id);
    }

    pub fn outputs(&self) -> OutputTree {
        self.inner.props.outputs.snapshot()
    }

    pub fn transcript(&self) -> Transcript {
        self.inner.props.transcript.snapshot()
    }

    fn evaluate(&self) -> FragmentStream {
        let inner = Arc::clone(&self.inner);
        if inner.started.swap(true, Ordering::SeqCst) {
            let agent_id = inner.id.to_string();
            return stream::once(async move { Err(EvalError::AlreadyStarted { agent_id }) }).boxed();
        }

        try_stream! {
            let agent_id = inner.id;
            debug!(agent_id = %agent_id, "Agent started");
            for action in inner.actions.iter().cloned() {
                let mut fragments = run_actions(action, inner.props.clone());
                while let Some(fragment) = fragments.next().await {
                    let fragment = fragment.map_err(|e| {
                        error!(agent_id = %agent_id, "Agent evaluation failed: {}", e);
                        e
                    })?;
                    inner.props.transcript.write().push(fragment.clone());
                    if let Some(on_fragment) = &inner.listeners.on_fragment {
                        on_fragment(&fragment);
                    }
                    if fragment.is_generated() {
                        if let Some(on_chunk) = &inner.listeners.on_chunk {
                            on_chunk(&fragment.content);
                        }
                    }
                    yield fragment;
                }
            }
            info!(agent_id = %agent_id, "Agent finished");
        }
        .boxed()
    }
}

impl IntoFuture for AgentHandle {
    type Output = EvalResult<OutputTree>;
    type IntoFuture = BoxFuture<'static, EvalResult<OutputTree>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.run().await })
    }
}
