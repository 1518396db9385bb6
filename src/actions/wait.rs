use async_stream::try_stream;
use futures::StreamExt;
use tracing::debug;

use crate::eval::action::{value_text, Action, ActionProps, FragmentStream, Step};
use crate::outputs::OutputValue;
use crate::prompt::PromptFragment;

/// Suspends until a value arrives on an input queue.
pub struct Wait {
    queue: String,
    save_as: String,
}

impl Step for Wait {
    fn run(&self, props: ActionProps) -> FragmentStream {
        let queue = self.queue.clone();
        let save_as = self.save_as.clone();

        try_stream! {
            debug!(queue = %queue, "Waiting for input");
            let value = props.state.next_input(&queue).await?;
            let text = value_text(&value);
            debug!(queue = %queue, save_as = %save_as, "Input received");

            let context = &props.context;
            let written = props.outputs.write().write(
                &context.output_address,
                &save_as,
                OutputValue::text(text.clone()),
                context.array_scoped,
            );
            written?;
            yield PromptFragment::parameter(text, props.context.role);
        }
        .boxed()
    }
}

/// Emits the next value pushed to `queue` and saves it under the queue name
/// at the current output address.
pub fn wait(queue: &str) -> Action {
    wait_into(queue, queue)
}

/// Like [`wait`], saving the value under `save_as` instead.
pub fn wait_into(queue: &str, save_as: &str) -> Action {
    Action::step(Wait {
        queue: queue.to_string(),
        save_as: save_as.to_string(),
    })
}
