use async_trait::async_trait;

use crate::provider::{
    provider::{CompletionProvider, CompletionRequest, TokenStream},
    types::ProviderResult,
};

type CompletionFn = dyn Fn(CompletionRequest) -> TokenStream + Send + Sync;

/// Adapts a closure into a [`CompletionProvider`].
///
/// Failures are reported as `Err` items inside the returned stream.
pub struct FnProvider {
    name: String,
    is_chat: bool,
    completion: Box<CompletionFn>,
}

impl FnProvider {
    pub fn new<F>(name: &str, is_chat: bool, completion: F) -> Self
    where
        F: Fn(CompletionRequest) -> TokenStream + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            is_chat,
            completion: Box::new(completion),
        }
    }
}

#[async_trait]
impl CompletionProvider for FnProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_chat(&self) -> bool {
        self.is_chat
    }

    async fn complete(&self, request: CompletionRequest) -> ProviderResult<TokenStream> {
        Ok((self.completion)(request))
    }
}
