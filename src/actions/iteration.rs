use async_stream::try_stream;
use futures::StreamExt;
use tracing::debug;

use crate::eval::action::{Action, ActionProps, FragmentStream, Step};
use crate::eval::context::{format_address, AddressSegment};
use crate::eval::evaluator::run_actions;
use crate::eval::state::LoopId;

/// Dotted address of the list an iteration writes to.
pub fn loop_id(address: &[AddressSegment], name: &str) -> LoopId {
    let mut address = address.to_vec();
    address.push(AddressSegment::Field(name.to_string()));
    format_address(&address)
}

/// Evaluates each element under its own output entry.
pub struct Map {
    name: String,
    elements: Vec<Action>,
}

impl Step for Map {
    fn run(&self, props: ActionProps) -> FragmentStream {
        let name = self.name.clone();
        let elements = self.elements.clone();

        try_stream! {
            let context = props.context.clone();
            let loop_id = loop_id(&context.output_address, &name);
            let opened = props.outputs.write().open_list(&context.output_address, &name);
            opened?;
            debug!(loop_id = %loop_id, elements = elements.len(), "Map started");

            for element in elements {
                let pushed = props.outputs.write().push_entry(&context.output_address, &name);
                let index = pushed?;
                let child = props.with_context(context.enter_iteration(&name, index));
                let mut fragments = run_actions(element, child);
                while let Some(fragment) = fragments.next().await {
                    yield fragment?;
                }
            }
        }
        .boxed()
    }
}

/// Runs `body` once per iteration until the loop is closed.
pub struct Repeat {
    name: String,
    body: Action,
}

impl Step for Repeat {
    fn run(&self, props: ActionProps) -> FragmentStream {
        let name = self.name.clone();
        let body = self.body.clone();

        try_stream! {
            let context = props.context.clone();
            let loop_id = loop_id(&context.output_address, &name);
            let opened = props.outputs.write().open_list(&context.output_address, &name);
            opened?;
            debug!(loop_id = %loop_id, "Loop opened");

            let mut iteration = 0;
            while props.state.advance_loop(&loop_id, iteration) {
                // The entry exists before the body runs, so a loop closed
                // mid-iteration keeps whatever the body wrote so far.
                let pushed = props.outputs.write().push_entry(&context.output_address, &name);
                let index = pushed?;
                let child = props.with_context(context.enter_iteration(&name, index));
                let mut fragments = run_actions(body.clone(), child);
                while let Some(fragment) = fragments.next().await {
                    yield fragment?;
                }
                iteration += 1;
                tokio::task::yield_now().await;
            }
            debug!(loop_id = %loop_id, iterations = iteration, "Loop finished");
        }
        .boxed()
    }
}

/// One output entry per element under `name`; always `elements.len()` entries.
pub fn map(name: &str, elements: Vec<Action>) -> Action {
    Action::step(Map {
        name: name.to_string(),
        elements,
    })
}

/// Open-ended iteration, stopped with [`AgentHandle::close_loop`](crate::AgentHandle::close_loop).
pub fn repeat<A: Into<Action>>(name: &str, body: A) -> Action {
    Action::step(Repeat {
        name: name.to_string(),
        body: body.into(),
    })
}
