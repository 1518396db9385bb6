use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::outputs::OutputTree;
use crate::prompt::{PromptFragment, Role};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TranscriptError {
    #[error("Fragment {index} has role 'none' and cannot be sent to a chat model")]
    NoneRole { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// The prompt handed to a completion provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptView {
    Chat(Vec<ChatMessage>),
    Text(String),
}

impl PromptView {
    /// The text of the view; chat messages are concatenated.
    pub fn text(&self) -> String {
        match self {
            PromptView::Text(text) => text.clone(),
            PromptView::Chat(messages) => messages.iter().map(|m| m.content.as_str()).collect(),
        }
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        match self {
            PromptView::Chat(messages) => messages.last(),
            PromptView::Text(_) => None,
        }
    }
}

/// Append-only fragment history, grouped by contiguous role.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    groups: Vec<Vec<PromptFragment>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new group iff the role differs from the last group's role.
    pub fn push(&mut self, fragment: PromptFragment) {
        let last_role = self
            .groups
            .last()
            .and_then(|group| group.first())
            .map(|f| f.role);
        match self.groups.last_mut() {
            Some(group) if last_role == Some(fragment.role) => group.push(fragment),
            _ => self.groups.push(vec![fragment]),
        }
    }

    pub fn groups(&self) -> &[Vec<PromptFragment>] {
        &self.groups
    }

    pub fn fragments(&self) -> impl Iterator<Item = &PromptFragment> {
        self.groups.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Flat view: every fragment's content, hidden or not.
    pub fn to_text(&self) -> String {
        self.fragments().map(|f| f.content.as_str()).collect()
    }

    pub fn to_visible_text(&self, outputs: &OutputTree) -> String {
        self.fragments()
            .filter(|f| !f.is_hidden(outputs))
            .map(|f| f.content.as_str())
            .collect()
    }

    /// Role-grouped view: one message per group, hidden fragments skipped and
    /// groups left empty by hiding dropped.
    pub fn to_chat_messages(&self, outputs: &OutputTree) -> Result<Vec<ChatMessage>, TranscriptError> {
        let mut messages = Vec::with_capacity(self.groups.len());
        let mut index = 0;
        for group in &self.groups {
            let mut content: Option<String> = None;
            for fragment in group {
                if fragment.role == Role::None {
                    return Err(TranscriptError::NoneRole { index });
                }
                index += 1;
                if fragment.is_hidden(outputs) {
                    continue;
                }
                content
                    .get_or_insert_with(String::new)
                    .push_str(&fragment.content);
            }
            if let (Some(content), Some(first)) = (content, group.first()) {
                messages.push(ChatMessage {
                    role: first.role,
                    content,
                });
            }
        }
        Ok(messages)
    }

    pub fn view(&self, chat: bool, outputs: &OutputTree) -> Result<PromptView, TranscriptError> {
        if chat {
            Ok(PromptView::Chat(self.to_chat_messages(outputs)?))
        } else {
            Ok(PromptView::Text(self.to_visible_text(outputs)))
        }
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fragment in self.fragments() {
            write!(f, "{}", fragment.content)?;
        }
        Ok(())
    }
}
