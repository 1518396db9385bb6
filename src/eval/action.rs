use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde_json::{Map, Value};

use crate::event::event_bus::EventBus;
use crate::outputs::OutputTree;
use crate::prompt::PromptFragment;
use crate::shared::Shared;
use crate::transcript::Transcript;

use super::context::Context;
use super::state::CoordinationState;
use super::EvalResult;

pub type FragmentStream = BoxStream<'static, EvalResult<PromptFragment>>;

pub type DeferredFn = Arc<dyn Fn(&ActionProps) -> Action + Send + Sync>;
pub type FutureFn = Arc<dyn Fn(&ActionProps) -> BoxFuture<'static, EvalResult<Action>> + Send + Sync>;

/// A combinator or user-defined action producing its own fragment stream.
pub trait Step: Send + Sync {
    fn run(&self, props: ActionProps) -> FragmentStream;
}

/// Everything an action needs to evaluate.
#[derive(Clone)]
pub struct ActionProps {
    pub context: Context,
    pub state: Arc<CoordinationState>,
    pub outputs: Shared<OutputTree>,
    pub transcript: Shared<Transcript>,
    pub params: Arc<Map<String, Value>>,
    pub events: Arc<EventBus>,
    /// Literal text immediately following the slot being evaluated.
    pub next_literal: Option<String>,
}

impl ActionProps {
    pub fn with_context(&self, context: Context) -> Self {
        Self {
            context,
            ..self.clone()
        }
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Parameter rendered as prompt text; strings are inserted verbatim.
    pub fn param_text(&self, name: &str) -> Option<String> {
        self.param(name).map(value_text)
    }

    pub fn outputs(&self) -> OutputTree {
        self.outputs.snapshot()
    }
}

/// Prompt text for an arbitrary JSON value.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// The closed set of shapes the evaluator accepts.
#[derive(Clone, Default)]
pub enum Action {
    #[default]
    Empty,
    Text(String),
    List(Vec<Action>),
    Deferred(DeferredFn),
    Future(FutureFn),
    Step(Arc<dyn Step>),
}

impl Action {
    /// A value computed from the props when the evaluator reaches it.
    pub fn deferred<F>(f: F) -> Self
    where
        F: Fn(&ActionProps) -> Action + Send + Sync + 'static,
    {
        Action::Deferred(Arc::new(f))
    }

    /// An asynchronously computed value.
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(&ActionProps) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = EvalResult<Action>> + Send + 'static,
    {
        Action::Future(Arc::new(move |props| Box::pin(f(props))))
    }

    pub fn step<S: Step + 'static>(step: S) -> Self {
        Action::Step(Arc::new(step))
    }

    /// A user-defined action backed by a stream-producing closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(ActionProps) -> FragmentStream + Send + Sync + 'static,
    {
        Action::step(FnStep(f))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Action::Empty)
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Empty => write!(f, "Empty"),
            Action::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Action::List(items) => f.debug_tuple("List").field(items).finish(),
            Action::Deferred(_) => write!(f, "Deferred(<fn>)"),
            Action::Future(_) => write!(f, "Future(<fn>)"),
            Action::Step(_) => write!(f, "Step(<step>)"),
        }
    }
}

struct FnStep<F>(F);

impl<F> Step for FnStep<F>
where
    F: Fn(ActionProps) -> FragmentStream + Send + Sync,
{
    fn run(&self, props: ActionProps) -> FragmentStream {
        (self.0)(props)
    }
}

impl From<&str> for Action {
    fn from(value: &str) -> Self {
        Action::Text(value.to_string())
    }
}

impl From<String> for Action {
    fn from(value: String) -> Self {
        Action::Text(value)
    }
}

impl From<&String> for Action {
    fn from(value: &String) -> Self {
        Action::Text(value.clone())
    }
}

macro_rules! number_action {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Action {
                fn from(value: $ty) -> Self {
                    Action::Text(value.to_string())
                }
            }
        )*
    };
}

number_action!(i32, i64, u32, u64, usize, f32, f64);

impl<T: Into<Action>> From<Vec<T>> for Action {
    fn from(items: Vec<T>) -> Self {
        Action::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Action>> From<Option<T>> for Action {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}
