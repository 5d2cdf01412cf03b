//! The retrieval-augmented response pipeline.
//!
//! One chat turn flows through: greeting check → (embed → retrieve) →
//! compose system prompt → stream completion. The returned
//! [`ResponseStream`] forwards fragments as they arrive and, once the reply
//! is complete, hands history + reply to the memory recorder.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Instant;

use futures::stream::{self, StreamExt};
use futures::Stream;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::sync::mpsc;

use super::greeting::{pick_reply, GreetingClassifier};
use super::prompt::{compose_system_prompt, Persona};
use super::{ChatRequest, Message, Role};
use crate::completion::{self, CompletionProvider, TextStream};
use crate::documents::join_passages;
use crate::embedding::EmbeddingProvider;
use crate::error::{ChatError, ProviderError};
use crate::memory::{self, MemoryRecorder};
use crate::retrieval::ContextRetriever;

type OnComplete = Box<dyn FnOnce(String) + Send>;

const DETACHED_BUFFER: usize = 32;

pub struct ChatPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    retriever: Arc<dyn ContextRetriever>,
    completion: Arc<dyn CompletionProvider>,
    memory: Option<Arc<dyn MemoryRecorder>>,
    greetings: GreetingClassifier,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl ChatPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        retriever: Arc<dyn ContextRetriever>,
        completion: Arc<dyn CompletionProvider>,
        memory: Option<Arc<dyn MemoryRecorder>>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            embedder,
            retriever,
            completion,
            memory,
            greetings: GreetingClassifier::new()?,
            rng: Mutex::new(Box::new(StdRng::from_os_rng())),
        })
    }

    /// Replace the randomness source used to pick greeting replies.
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Mutex::new(Box::new(rng));
        self
    }

    /// Answer one chat turn.
    ///
    /// Validation failures return before any upstream call. Provider failures
    /// before the first fragment are returned as errors; failures after that
    /// end the stream.
    pub async fn respond(&self, request: ChatRequest) -> Result<ResponseStream, ChatError> {
        let started = Instant::now();
        let ChatRequest {
            messages: history,
            user_id,
            persona,
        } = request;

        let query = validate(&history, &user_id)?.to_string();
        let persona = Persona::from_param(persona.as_deref());

        if self.greetings.is_greeting(&query) {
            let reply = {
                let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
                pick_reply(&mut **rng)
            };
            tracing::info!(user_id = %user_id, "greeting detected, skipping retrieval");
            return Ok(self.finish(history, user_id, completion::replay(reply)));
        }

        let embedding = self
            .embedder
            .embed(&query)
            .await
            .map_err(ChatError::Embedding)?;

        let passages = self
            .retriever
            .retrieve(&embedding)
            .await
            .map_err(ChatError::Retrieval)?;
        let context = join_passages(&passages);

        let mut prompt = Vec::with_capacity(history.len() + 1);
        prompt.push(Message::system(compose_system_prompt(persona, &context)));
        prompt.extend(history.iter().cloned());

        let stream = self
            .completion
            .stream(&prompt, &user_id)
            .await
            .map_err(ChatError::Completion)?;

        tracing::info!(
            user_id = %user_id,
            persona = %persona,
            passages = passages.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "completion stream started"
        );

        Ok(self.finish(history, user_id, stream))
    }

    fn finish(&self, history: Vec<Message>, user_id: String, inner: TextStream) -> ResponseStream {
        let memory = self.memory.clone();
        ResponseStream::new(
            inner,
            Box::new(move |reply| {
                let Some(recorder) = memory else {
                    return;
                };
                let mut turns = history;
                turns.push(Message::assistant(reply));
                memory::record_in_background(recorder, user_id, turns);
            }),
        )
    }
}

/// The latest user query, or why the turn cannot be answered.
fn validate<'a>(history: &'a [Message], user_id: &str) -> Result<&'a str, ChatError> {
    if user_id.trim().is_empty() {
        return Err(ChatError::InvalidRequest("userId must not be empty".into()));
    }
    let last = history
        .last()
        .ok_or_else(|| ChatError::InvalidRequest("messages must not be empty".into()))?;
    if last.role != Role::User {
        return Err(ChatError::InvalidRequest(
            "last message must come from the user".into(),
        ));
    }
    Ok(&last.content)
}

/// Reply fragments on their way to the client.
///
/// Accumulates the text it forwards. When the inner stream ends cleanly the
/// full reply is passed to the completion callback exactly once; an
/// interrupted reply is never recorded.
pub struct ResponseStream {
    inner: TextStream,
    reply: String,
    failed: bool,
    on_complete: Option<OnComplete>,
}

impl ResponseStream {
    fn new(inner: TextStream, on_complete: OnComplete) -> Self {
        Self {
            inner,
            reply: String::new(),
            failed: false,
            on_complete: Some(on_complete),
        }
    }

    /// Drive the reply on its own task and hand back a stream of its fragments.
    ///
    /// The task keeps reading after the returned stream is dropped, so a
    /// client that disconnects mid-reply still gets the turn recorded.
    pub fn detach(mut self) -> TextStream {
        let (tx, rx) = mpsc::channel(DETACHED_BUFFER);
        tokio::spawn(async move {
            let mut receiver_gone = false;
            while let Some(item) = self.next().await {
                if !receiver_gone && tx.send(item).await.is_err() {
                    tracing::debug!("client went away, finishing reply in background");
                    receiver_gone = true;
                }
            }
        });

        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed()
    }
}

impl Stream for ResponseStream {
    type Item = Result<String, ProviderError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(fragment))) => {
                this.reply.push_str(&fragment);
                Poll::Ready(Some(Ok(fragment)))
            }
            Poll::Ready(Some(Err(e))) => {
                if !this.failed {
                    tracing::warn!(error = %e, sent_chars = this.reply.len(), "completion stream interrupted");
                }
                this.failed = true;
                this.on_complete = None;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                if let Some(on_complete) = this.on_complete.take() {
                    tracing::debug!(reply_chars = this.reply.len(), "reply complete");
                    on_complete(std::mem::take(&mut this.reply));
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
