use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::config::SamplingConfig;
use crate::transcript::PromptView;

use super::types::ProviderResult;

/// Ordered `(sample_index, token)` pairs, terminated by completion.
pub type TokenStream = BoxStream<'static, ProviderResult<(usize, String)>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Number of completions requested in one call.
    pub n: usize,
    pub temperature: f32,
    pub top_p: Option<f32>,
    pub max_tokens: Option<usize>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self::from(&SamplingConfig::default())
    }
}

impl From<&SamplingConfig> for SamplingParams {
    fn from(config: &SamplingConfig) -> Self {
        Self {
            n: 1,
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: PromptView,
    pub stop: Option<String>,
    pub stream: bool,
    pub sampling: SamplingParams,
}

impl CompletionRequest {
    pub fn new(prompt: PromptView) -> Self {
        Self {
            prompt,
            stop: None,
            stream: false,
            sampling: SamplingParams::default(),
        }
    }
}

/// A language model connector.
///
/// `is_chat` decides which [`PromptView`] the runtime builds: a role-grouped
/// message list for chat models, flat text otherwise.
#[mockall::automock]
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    fn is_chat(&self) -> bool;

    async fn complete(&self, request: CompletionRequest) -> ProviderResult<TokenStream>;
}
