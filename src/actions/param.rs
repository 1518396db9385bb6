use futures::{stream, StreamExt};
use tracing::warn;

use crate::eval::action::{Action, ActionProps, FragmentStream, Step};
use crate::prompt::PromptFragment;

/// Emits a bound parameter.
pub struct Param {
    name: String,
}

impl Step for Param {
    fn run(&self, props: ActionProps) -> FragmentStream {
        match props.param_text(&self.name) {
            Some(text) => {
                let fragment = PromptFragment::parameter(text, props.context.role);
                stream::once(async move { Ok(fragment) }).boxed()
            }
            None => {
                warn!(name = %self.name, "Parameter is not bound");
                stream::empty().boxed()
            }
        }
    }
}

pub fn param(name: &str) -> Action {
    Action::step(Param {
        name: name.to_string(),
    })
}

/// A user-defined action producing its own fragments.
pub fn create_action<F>(f: F) -> Action
where
    F: Fn(ActionProps) -> FragmentStream + Send + Sync + 'static,
{
    Action::from_fn(f)
}
