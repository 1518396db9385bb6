use async_stream::try_stream;
use futures::StreamExt;

use crate::eval::action::{Action, ActionProps, FragmentStream, Step};
use crate::eval::evaluator::run_actions;
use crate::outputs::OutputTree;
use crate::prompt::{Hidden, HiddenError};

#[derive(Debug, Clone, Default)]
pub struct BlockOptions {
    pub hidden: Hidden,
}

impl BlockOptions {
    /// Hides the block's fragments from every prompt view.
    pub fn hidden() -> Self {
        Self {
            hidden: Hidden::Always,
        }
    }

    pub fn hidden_when<F>(predicate: F) -> Self
    where
        F: Fn(&OutputTree) -> Result<bool, HiddenError> + Send + Sync + 'static,
    {
        Self {
            hidden: Hidden::when(predicate),
        }
    }
}

/// Groups a body and ORs a visibility condition onto each of its fragments.
pub struct Block {
    body: Action,
    hidden: Hidden,
}

impl Step for Block {
    fn run(&self, props: ActionProps) -> FragmentStream {
        // A list body groups its elements; it is not a repetition.
        let items = match &self.body {
            Action::List(items) => items.clone(),
            other => vec![other.clone()],
        };
        let hidden = self.hidden.clone();

        try_stream! {
            for item in items {
                let mut fragments = run_actions(item, props.clone());
                while let Some(fragment) = fragments.next().await {
                    yield fragment?.with_hidden(hidden.clone());
                }
            }
        }
        .boxed()
    }
}

pub fn block<A: Into<Action>>(body: A, options: BlockOptions) -> Action {
    Action::step(Block {
        body: body.into(),
        hidden: options.hidden,
    })
}

/// Block hidden whenever `predicate` holds for the outputs at serialization time.
pub fn block_when<A, F>(body: A, predicate: F) -> Action
where
    A: Into<Action>,
    F: Fn(&OutputTree) -> Result<bool, HiddenError> + Send + Sync + 'static,
{
    block(body, BlockOptions::hidden_when(predicate))
}
