use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::{stream, StreamExt};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::provider::{
    provider::{CompletionProvider, CompletionRequest, TokenStream},
    types::{ProviderError, ProviderResult},
};
use crate::shared::Shared;

type Pattern = String;

type Answer = String;

pub type KnowledgeBase = DashMap<Pattern, Answer>;

lazy_static! {
    static ref TOKEN: Regex = Regex::new(r"\s*\S+|\s+$").unwrap();
}

/// Deterministic provider answering from a pattern → answer knowledge base.
///
/// The answer of the longest pattern contained in the prompt text wins; the
/// default reply is used when nothing matches. Every requested sample gets the
/// same answer, cut at the stop string and split into word tokens.
pub struct ScriptedProvider {
    name: String,
    is_chat: bool,
    knowledge_base: Arc<KnowledgeBase>,
    default_reply: Option<Answer>,
    requests: Shared<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn chat(name: &str) -> Self {
        Self::new(name, true)
    }

    pub fn completion(name: &str) -> Self {
        Self::new(name, false)
    }

    fn new(name: &str, is_chat: bool) -> Self {
        Self {
            name: name.to_string(),
            is_chat,
            knowledge_base: Arc::new(KnowledgeBase::new()),
            default_reply: None,
            requests: Shared::default(),
        }
    }

    pub fn reply(self, pattern: &str, answer: &str) -> Self {
        self.knowledge_base
            .insert(pattern.to_string(), answer.to_string());
        self
    }

    pub fn with_default_reply(mut self, answer: &str) -> Self {
        self.default_reply = Some(answer.to_string());
        self
    }

    pub fn knowledge_base(&self) -> Arc<KnowledgeBase> {
        Arc::clone(&self.knowledge_base)
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.snapshot()
    }

    fn answer_for(&self, prompt: &str) -> ProviderResult<Answer> {
        // find the longest pattern included in the prompt
        let matched = self
            .knowledge_base
            .iter()
            .filter(|entry| prompt.contains(entry.key().as_str()))
            .max_by_key(|entry| entry.key().len())
            .map(|entry| entry.value().clone());
        matched
            .or_else(|| self.default_reply.clone())
            .ok_or_else(|| ProviderError::ApiError("No response found".to_string()))
    }
}

/// Splits `text` into tokens that concatenate back to it exactly.
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_chat(&self) -> bool {
        self.is_chat
    }

    async fn complete(&self, request: CompletionRequest) -> ProviderResult<TokenStream> {
        let mut answer = self.answer_for(&request.prompt.text())?;
        if let Some(stop) = request.stop.as_deref().filter(|stop| !stop.is_empty()) {
            if let Some(position) = answer.find(stop) {
                answer.truncate(position);
            }
        }
        let samples = request.sampling.n.max(1);
        debug!(provider = %self.name, samples, "Scripted completion");
        self.requests.write().push(request);

        let tokens = tokenize(&answer);
        let pairs: Vec<ProviderResult<(usize, String)>> = tokens
            .into_iter()
            .flat_map(|token| (0..samples).map(move |sample| Ok((sample, token.clone()))))
            .collect();
        Ok(stream::iter(pairs).boxed())
    }
}
