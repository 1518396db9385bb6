//! # Action evaluation
//!
//! The evaluator turns an arbitrarily nested [`Action`](action::Action) tree
//! into a lazy, ordered stream of [`PromptFragment`](crate::PromptFragment)s.
//!
//! ```text
//! Action ──▶ run_actions ──▶ FragmentStream ──▶ AgentHandle ──▶ caller
//!               │    ▲
//!     Context ──┤    └── combinators (gen, map, repeat, wait, block)
//!  Coord.State ─┤
//!   OutputTree ─┘
//! ```
//!
//! Three things are threaded through every recursive call:
//!
//! - [`Context`](context::Context): immutable per node, derived by copy with
//!   [`ContextPatch`](context::ContextPatch) overrides
//! - [`CoordinationState`](state::CoordinationState): one per invocation,
//!   shared by reference, holds loop cursors and input queues
//! - the output tree, written by `gen` and `wait` at the context's address

use thiserror::Error;

use crate::outputs::OutputError;
use crate::provider::types::ProviderError;
use crate::transcript::TranscriptError;

pub mod action;
pub mod context;
pub mod evaluator;
pub mod state;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Provider failure: {0}")]
    Provider(#[from] ProviderError),
    #[error("Malformed transcript: {0}")]
    Transcript(#[from] TranscriptError),
    #[error("Output error: {0}")]
    Output(#[from] OutputError),
    #[error("Deferred value failed: {message}")]
    Deferred { message: String },
    #[error("Agent {agent_id} has already been started")]
    AlreadyStarted { agent_id: String },
    #[error("Input queue '{queue}' was closed")]
    QueueClosed { queue: String },
}

impl EvalError {
    pub fn deferred<S: Into<String>>(message: S) -> Self {
        EvalError::Deferred {
            message: message.into(),
        }
    }
}

pub type EvalResult<T> = Result<T, EvalError>;
