use async_stream::try_stream;
use futures::{stream, StreamExt};

use crate::prompt::{PromptFragment, Source};

use super::action::{Action, ActionProps, FragmentStream};
use super::context::ContextPatch;

/// Top level entry point: evaluates `action` into a lazy fragment stream.
///
/// Nothing runs until the stream is polled, and deferred values are resolved
/// only once every fragment before them has been produced, so they observe
/// the outputs written by earlier generations.
pub fn run_actions(action: Action, props: ActionProps) -> FragmentStream {
    evaluate(action, props, Source::Constant)
}

/// `primitive_source` tags plain text: `Parameter` once a function has been
/// involved in producing it, `Constant` otherwise.
fn evaluate(action: Action, props: ActionProps, primitive_source: Source) -> FragmentStream {
    match action {
        Action::Empty => stream::empty().boxed(),
        Action::Text(content) => {
            let fragment = PromptFragment::new(content, primitive_source, props.context.role);
            stream::once(async move { Ok(fragment) }).boxed()
        }
        Action::List(items) => evaluate_list(items, props),
        Action::Deferred(f) => try_stream! {
            let resolved = f(&props);
            let mut fragments = evaluate(resolved, props, Source::Parameter);
            while let Some(fragment) = fragments.next().await {
                yield fragment?;
            }
        }
        .boxed(),
        Action::Future(f) => try_stream! {
            let resolved = f(&props).await?;
            let mut fragments = evaluate(resolved, props, Source::Parameter);
            while let Some(fragment) = fragments.next().await {
                yield fragment?;
            }
        }
        .boxed(),
        Action::Step(step) => try_stream! {
            let mut fragments = step.run(props);
            while let Some(fragment) = fragments.next().await {
                yield fragment?;
            }
        }
        .boxed(),
    }
}

fn evaluate_list(items: Vec<Action>, props: ActionProps) -> FragmentStream {
    try_stream! {
        let scoped = props.context.scopes_lists();
        for item in items {
            let child = if scoped {
                props.with_context(props.context.derive(ContextPatch::default().array_scoped(true)))
            } else {
                props.clone()
            };
            let mut fragments = evaluate(item, child, Source::Constant);
            while let Some(fragment) = fragments.next().await {
                yield fragment?;
            }
        }
    }
    .boxed()
}
