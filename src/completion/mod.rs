//! Streaming chat completions.
//!
//! [`CompletionProvider`] turns an ordered message list into a [`TextStream`]
//! of reply fragments. [`replay`] wraps fixed text in the same stream shape so
//! canned replies travel the same path as model output.

pub mod openai;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::chat::Message;
use crate::config::CompletionConfig;
use crate::error::ProviderError;

/// Reply fragments in generation order. An `Err` item ends the reply.
pub type TextStream = BoxStream<'static, Result<String, ProviderError>>;

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Start a streamed completion.
    ///
    /// Returns once the provider has accepted the request; fragments then
    /// arrive through the stream. `user_id` is forwarded for per-user scoping.
    async fn stream(&self, messages: &[Message], user_id: &str) -> Result<TextStream, ProviderError>;
}

pub fn create_provider(config: &CompletionConfig) -> Box<dyn CompletionProvider> {
    Box::new(openai::OpenAiCompletion::new(config))
}

/// Stream fixed text word by word. Concatenating the fragments yields `text`.
pub fn replay(text: &str) -> TextStream {
    let fragments: Vec<Result<String, ProviderError>> = text
        .split_inclusive(' ')
        .map(|word| Ok(word.to_string()))
        .collect();
    stream::iter(fragments).boxed()
}
