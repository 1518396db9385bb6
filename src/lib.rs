//! # kotoba
//!
//! Declarative prompt composition for language models.
//!
//! A conversation is assembled as a tree of [`Action`]s: role templates with
//! placeholders, parameters, deferred values, lists, and combinators such as
//! [`gen`], [`map`], [`repeat`], [`wait`] and [`block`]. An [`Agent`] binds a
//! template to a [`CompletionProvider`] and a set of parameters; evaluating the
//! resulting [`AgentHandle`] produces an ordered stream of [`PromptFragment`]s
//! while generated values accumulate in an [`OutputTree`].
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use kotoba::{assistant, gen, map, system, user, Agent, ScriptedProvider, Template};
//! # async fn example() -> kotoba::EvalResult<()> {
//! let provider = Arc::new(ScriptedProvider::chat("stub").with_default_reply("X"));
//! let template = Template::new(vec![
//!     system!("You are a terse assistant."),
//!     map(
//!         "answers",
//!         ["Q1", "Q2"]
//!             .into_iter()
//!             .map(|q| vec![user!("{}", q), assistant!("{}", gen("a"))].into())
//!             .collect(),
//!     ),
//! ]);
//! let outputs = Agent::new(template, provider).bind(Default::default()).run().await?;
//! println!("{}", outputs.to_json());
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod agent;
pub mod config;
pub mod error;
pub mod eval;
pub mod event;
pub mod outputs;
pub mod prompt;
pub mod provider;
pub mod shared;
pub mod transcript;

// Re-exports
pub use actions::{
    ai, assistant, block, block_when, create_action, gen, gen_with, map, param, repeat, system,
    user, wait, wait_into, BlockOptions, GenOptions,
};
pub use agent::{Agent, AgentHandle, AgentListeners, InputSender, Params, Template};
pub use config::{AgentConfig, FragmentFilter, SamplingConfig};
pub use error::*;
pub use eval::{
    action::{Action, ActionProps, FragmentStream, Step},
    context::{AddressSegment, Context, ContextPatch},
    evaluator::run_actions,
    state::{CoordinationState, LoopCursor, LoopId},
    EvalError, EvalResult,
};
pub use event::event_bus::{EventBus, EventError, EventKey, EventReceiver, GenerationEvent};
pub use outputs::{OutputError, OutputTree, OutputValue};
pub use prompt::{Hidden, HiddenError, PromptFragment, Role, Source};
pub use provider::{
    llms::{fn_provider::FnProvider, scripted::ScriptedProvider},
    provider::{
        CompletionProvider, CompletionRequest, MockCompletionProvider, SamplingParams, TokenStream,
    },
    types::{ProviderError, ProviderResult},
};
pub use transcript::{ChatMessage, PromptView, Transcript, TranscriptError};
