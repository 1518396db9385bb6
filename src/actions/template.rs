use async_stream::try_stream;
use futures::StreamExt;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use crate::eval::action::{Action, ActionProps, FragmentStream, Step};
use crate::eval::context::ContextPatch;
use crate::eval::evaluator::run_actions;
use crate::prompt::{PromptFragment, Role};

lazy_static! {
    static ref INDENT: Regex = Regex::new(r"\n\s+").unwrap();
}

/// Collapses every newline followed by whitespace into a single newline.
pub fn strip_indent(text: &str) -> String {
    INDENT.replace_all(text, "\n").into_owned()
}

/// Splits a template on `{}` placeholders into literal runs. There is always
/// one more run than placeholders; `{{` and `}}` escape literal braces.
pub fn split_template(template: &str) -> Vec<String> {
    let mut runs = vec![String::new()];
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('{', Some('{')) | ('}', Some('}')) => {
                chars.next();
                push_char(&mut runs, c);
            }
            ('{', Some('}')) => {
                chars.next();
                runs.push(String::new());
            }
            _ => push_char(&mut runs, c),
        }
    }
    runs
}

fn push_char(runs: &mut [String], c: char) {
    if let Some(run) = runs.last_mut() {
        run.push(c);
    }
}

/// Literal runs interleaved with placeholder values, stamped with one role.
pub struct RoleTemplate {
    role: Option<Role>,
    literals: Vec<String>,
    values: Vec<Action>,
}

impl RoleTemplate {
    pub fn new(role: Option<Role>, template: &str, values: Vec<Action>) -> Self {
        let literals: Vec<String> = split_template(template)
            .iter()
            .map(|run| strip_indent(run))
            .collect();
        if values.len() + 1 != literals.len() {
            warn!(
                placeholders = literals.len() - 1,
                values = values.len(),
                "Template placeholder count does not match its values"
            );
        }
        Self {
            role,
            literals,
            values,
        }
    }
}

impl Step for RoleTemplate {
    fn run(&self, props: ActionProps) -> FragmentStream {
        let literals = self.literals.clone();
        let values = self.values.clone();
        let context = match self.role {
            Some(role) => props.context.derive(ContextPatch::default().role(role)),
            None => props.context.clone(),
        };
        let props = props.with_context(context);

        try_stream! {
            let role = props.context.role;
            for (i, literal) in literals.iter().enumerate() {
                if !literal.is_empty() {
                    yield PromptFragment::literal(literal.clone(), role);
                }
                let Some(value) = values.get(i) else {
                    continue;
                };
                let next_literal = literals
                    .get(i + 1)
                    .filter(|next| !next.is_empty())
                    .cloned()
                    .or_else(|| props.next_literal.clone());
                let slot = ActionProps {
                    next_literal,
                    ..props.clone()
                };
                let mut fragments = run_actions(value.clone(), slot);
                while let Some(fragment) = fragments.next().await {
                    yield fragment?;
                }
            }
        }
        .boxed()
    }
}

fn role_template(role: Option<Role>, template: &str, values: Vec<Action>) -> Action {
    Action::step(RoleTemplate::new(role, template, values))
}

pub fn system(template: &str, values: Vec<Action>) -> Action {
    role_template(Some(Role::System), template, values)
}

pub fn user(template: &str, values: Vec<Action>) -> Action {
    role_template(Some(Role::User), template, values)
}

pub fn assistant(template: &str, values: Vec<Action>) -> Action {
    role_template(Some(Role::Assistant), template, values)
}

/// Role-less template; fragments inherit the surrounding role.
pub fn ai(template: &str, values: Vec<Action>) -> Action {
    role_template(None, template, values)
}

/// `system!("Answer as {}.", param("role"))`
#[macro_export]
macro_rules! system {
    ($template:expr $(, $value:expr)* $(,)?) => {
        $crate::system($template, ::std::vec![$(::std::convert::Into::<$crate::Action>::into($value)),*])
    };
}

#[macro_export]
macro_rules! user {
    ($template:expr $(, $value:expr)* $(,)?) => {
        $crate::user($template, ::std::vec![$(::std::convert::Into::<$crate::Action>::into($value)),*])
    };
}

#[macro_export]
macro_rules! assistant {
    ($template:expr $(, $value:expr)* $(,)?) => {
        $crate::assistant($template, ::std::vec![$(::std::convert::Into::<$crate::Action>::into($value)),*])
    };
}

#[macro_export]
macro_rules! ai {
    ($template:expr $(, $value:expr)* $(,)?) => {
        $crate::ai($template, ::std::vec![$(::std::convert::Into::<$crate::Action>::into($value)),*])
    };
}
