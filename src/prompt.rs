use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::outputs::OutputTree;

/// Conversation role a fragment is attributed to.
///
/// `None` marks text produced outside any role block; it is valid in a flat
/// text prompt but rejected by the chat view.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    #[default]
    None,
}

/// Where the text of a fragment came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Source {
    /// Literal run of a role template.
    Literal,
    /// Value computed from parameters, deferred functions or external input.
    Parameter,
    /// Text produced by the model.
    Generated,
    /// Plain value placed directly into a template.
    Constant,
}

#[derive(Debug, Error)]
#[error("hidden predicate failed: {message}")]
pub struct HiddenError {
    pub message: String,
}

impl HiddenError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type HiddenPredicate = Arc<dyn Fn(&OutputTree) -> Result<bool, HiddenError> + Send + Sync>;

/// Visibility of a fragment, resolved lazily against the output tree at
/// serialization time.
#[derive(Clone, Default)]
pub enum Hidden {
    #[default]
    Visible,
    Always,
    When(HiddenPredicate),
    /// Hidden when any member is hidden.
    Any(Vec<Hidden>),
}

impl Hidden {
    pub fn when<F>(predicate: F) -> Self
    where
        F: Fn(&OutputTree) -> Result<bool, HiddenError> + Send + Sync + 'static,
    {
        Hidden::When(Arc::new(predicate))
    }

    /// Logical OR with another visibility; the existing condition is kept.
    pub fn or(self, other: Hidden) -> Hidden {
        match (self, other) {
            (Hidden::Visible, other) | (other, Hidden::Visible) => other,
            (Hidden::Always, _) | (_, Hidden::Always) => Hidden::Always,
            (Hidden::Any(mut existing), Hidden::Any(added)) => {
                existing.extend(added);
                Hidden::Any(existing)
            }
            (Hidden::Any(mut existing), added) => {
                existing.push(added);
                Hidden::Any(existing)
            }
            (existing, added) => Hidden::Any(vec![existing, added]),
        }
    }

    pub fn is_visible_always(&self) -> bool {
        matches!(self, Hidden::Visible)
    }

    /// A failing predicate counts as "not hidden".
    pub fn evaluate(&self, outputs: &OutputTree) -> bool {
        match self {
            Hidden::Visible => false,
            Hidden::Always => true,
            Hidden::When(predicate) => match predicate(outputs) {
                Ok(hidden) => hidden,
                Err(e) => {
                    warn!("Hidden predicate failed, keeping fragment visible: {}", e);
                    false
                }
            },
            Hidden::Any(members) => members.iter().any(|member| member.evaluate(outputs)),
        }
    }
}

impl From<bool> for Hidden {
    fn from(hidden: bool) -> Self {
        if hidden {
            Hidden::Always
        } else {
            Hidden::Visible
        }
    }
}

impl fmt::Debug for Hidden {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hidden::Visible => write!(f, "Visible"),
            Hidden::Always => write!(f, "Always"),
            Hidden::When(_) => write!(f, "When(<predicate>)"),
            Hidden::Any(members) => f.debug_tuple("Any").field(members).finish(),
        }
    }
}

impl PartialEq for Hidden {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Hidden::Visible, Hidden::Visible) | (Hidden::Always, Hidden::Always) => true,
            (Hidden::When(a), Hidden::When(b)) => Arc::ptr_eq(a, b),
            (Hidden::Any(a), Hidden::Any(b)) => a == b,
            _ => false,
        }
    }
}

/// One tagged unit of prompt text.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptFragment {
    pub content: String,
    pub source: Source,
    pub role: Role,
    pub hidden: Hidden,
}

impl PromptFragment {
    pub fn new<S: Into<String>>(content: S, source: Source, role: Role) -> Self {
        Self {
            content: content.into(),
            source,
            role,
            hidden: Hidden::Visible,
        }
    }

    pub fn literal<S: Into<String>>(content: S, role: Role) -> Self {
        Self::new(content, Source::Literal, role)
    }

    pub fn parameter<S: Into<String>>(content: S, role: Role) -> Self {
        Self::new(content, Source::Parameter, role)
    }

    pub fn generated<S: Into<String>>(content: S, role: Role) -> Self {
        Self::new(content, Source::Generated, role)
    }

    pub fn constant<S: Into<String>>(content: S, role: Role) -> Self {
        Self::new(content, Source::Constant, role)
    }

    /// Attaches `hidden`, OR-composed with any visibility already present.
    pub fn with_hidden(mut self, hidden: Hidden) -> Self {
        self.hidden = std::mem::take(&mut self.hidden).or(hidden);
        self
    }

    pub fn is_hidden(&self, outputs: &OutputTree) -> bool {
        self.hidden.evaluate(outputs)
    }

    pub fn is_generated(&self) -> bool {
        self.source == Source::Generated
    }
}

impl fmt::Display for PromptFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.content)
    }
}
