//! # Template combinators
//!
//! Builders for the actions a template is made of:
//!
//! - role templates: [`system`], [`user`], [`assistant`], [`ai`] and their macros
//! - [`gen`]: a generation point
//! - [`map`] and [`repeat`]: iteration that shapes the output tree
//! - [`wait`]: suspension on a named input queue
//! - [`block`]: visibility control over a sub-tree
//! - [`param`]: a bound parameter

pub mod block;
pub mod gen;
pub mod iteration;
pub mod param;
pub mod template;
pub mod wait;

pub use block::{block, block_when, BlockOptions};
pub use gen::{gen, gen_with, GenOptions};
pub use iteration::{map, repeat};
pub use param::{create_action, param};
pub use template::{ai, assistant, system, user};
pub use wait::{wait, wait_into};

#[cfg(test)]
pub(crate) fn props_with(
    provider: std::sync::Arc<dyn crate::provider::provider::CompletionProvider>,
) -> crate::eval::action::ActionProps {
    use std::sync::Arc;

    crate::eval::action::ActionProps {
        context: crate::eval::context::Context::new(provider),
        state: Arc::new(crate::eval::state::CoordinationState::new()),
        outputs: Default::default(),
        transcript: Default::default(),
        params: Arc::new(serde_json::Map::new()),
        events: Arc::new(crate::event::event_bus::EventBus::new(16)),
        next_literal: None,
    }
}

/// Props backed by a completion provider that always answers `reply`.
#[cfg(test)]
pub(crate) fn test_props(reply: &str) -> crate::eval::action::ActionProps {
    props_with(std::sync::Arc::new(
        crate::provider::llms::scripted::ScriptedProvider::completion("test").with_default_reply(reply),
    ))
}
